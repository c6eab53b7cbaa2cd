//! Timeout enforcement for provider calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::providers::ProviderError;

/// Run `fut` with a deadline; elapsing maps to `ProviderError::Timeout`.
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(deadline)),
    }
}
