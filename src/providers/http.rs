//! Shared reqwest plumbing for REST/JSON-RPC adapters.

use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::providers::types::{ProviderError, ProviderResult};

/// Send a request and decode a JSON body, mapping non-success statuses.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ProviderResult<T> {
    let response = check_status(request.send().await?).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Send a request and return the body as text, mapping non-success statuses.
pub async fn send_text(request: RequestBuilder) -> ProviderResult<String> {
    let response = check_status(request.send().await?).await?;
    response
        .text()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(ProviderError::Http {
        status: status.as_u16(),
        body,
        retry_after,
    })
}
