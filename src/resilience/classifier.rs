//! Failure classification.
//!
//! # Rules (first match wins)
//! ```text
//! cross-origin / security block   → CrossOriginBlocked  fatal
//! HTTP 429 / throttling keywords  → RateLimited         retry_after (default 60s)
//! HTTP 404 / "not found"          → NotFound            fatal
//! connect / timeout failures      → NetworkError
//! HTTP 5xx                        → ServerError
//! anything else                   → Unknown
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::providers::ProviderError;

/// Default wait after a throttling response that carried no hint.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const BLOCKED_KEYWORDS: &[&str] = &["cors", "cross-origin", "blocked by", "security policy"];
const THROTTLE_KEYWORDS: &[&str] = &["rate limit", "too many requests", "throttl", "quota exceeded"];
const NOT_FOUND_KEYWORDS: &[&str] = &["not found", "unknown address", "invalid address"];
const NETWORK_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "connect error",
    "network",
    "dns",
];

/// Typed failure kinds surfaced on `QueryResult::error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CrossOriginBlocked,
    RateLimited,
    NotFound,
    NetworkError,
    ServerError,
    Unknown,
    /// Produced only by queue cancellation, never by classification.
    Cancelled,
}

impl ErrorKind {
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::CrossOriginBlocked | ErrorKind::NotFound | ErrorKind::Cancelled
        )
    }

    /// Fixed, human-readable summary shown to the user.
    pub fn user_message(self, retry_after_secs: Option<u64>) -> String {
        match self {
            ErrorKind::CrossOriginBlocked => "Blocked by network security policy".to_string(),
            ErrorKind::RateLimited => format!(
                "Rate limited — retry after {}s",
                retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS)
            ),
            ErrorKind::NotFound => "Address not found".to_string(),
            ErrorKind::NetworkError => "Network unreachable — check your connection".to_string(),
            ErrorKind::ServerError => "Provider error — try again later".to_string(),
            ErrorKind::Unknown => "Balance lookup failed".to_string(),
            ErrorKind::Cancelled => "Request cancelled".to_string(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::CrossOriginBlocked => "cross_origin_blocked",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Classification of one raw failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retry_after_secs: Option<u64>,
    pub is_fatal: bool,
}

impl Classification {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            retry_after_secs: None,
            is_fatal: kind.is_fatal(),
        }
    }

    pub fn user_message(&self) -> String {
        self.kind.user_message(self.retry_after_secs)
    }
}

/// Map a raw provider failure to a typed classification.
pub fn classify(error: &ProviderError) -> Classification {
    let message = error.to_string().to_lowercase();
    let status = error.status();
    let contains_any = |words: &[&str]| words.iter().any(|w| message.contains(w));

    if matches!(error, ProviderError::Blocked(_)) || contains_any(BLOCKED_KEYWORDS) {
        return Classification::new(ErrorKind::CrossOriginBlocked);
    }

    if status == Some(429) || contains_any(THROTTLE_KEYWORDS) {
        let mut c = Classification::new(ErrorKind::RateLimited);
        c.retry_after_secs = Some(error.retry_after().unwrap_or(DEFAULT_RETRY_AFTER_SECS));
        return c;
    }

    if status == Some(404) || contains_any(NOT_FOUND_KEYWORDS) {
        return Classification::new(ErrorKind::NotFound);
    }

    if matches!(
        error,
        ProviderError::Connect(_) | ProviderError::Timeout(_) | ProviderError::TimedOut(_)
    )
        || contains_any(NETWORK_KEYWORDS)
    {
        return Classification::new(ErrorKind::NetworkError);
    }

    if status.is_some_and(|s| (500..600).contains(&s)) {
        return Classification::new(ErrorKind::ServerError);
    }

    Classification::new(ErrorKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn http(status: u16, body: &str) -> ProviderError {
        ProviderError::Http { status, body: body.to_string(), retry_after: None }
    }

    #[test]
    fn test_blocked_wins_over_everything() {
        let c = classify(&ProviderError::Blocked("origin not allowed".into()));
        assert_eq!(c.kind, ErrorKind::CrossOriginBlocked);
        assert!(c.is_fatal);

        // keyword beats a 429 status
        let c = classify(&http(429, "CORS request rejected"));
        assert_eq!(c.kind, ErrorKind::CrossOriginBlocked);
    }

    #[test]
    fn test_rate_limited() {
        let c = classify(&http(429, ""));
        assert_eq!(c.kind, ErrorKind::RateLimited);
        assert_eq!(c.retry_after_secs, Some(60));
        assert!(!c.is_fatal);

        let hinted = ProviderError::Http { status: 429, body: String::new(), retry_after: Some(7) };
        assert_eq!(classify(&hinted).retry_after_secs, Some(7));

        let c = classify(&ProviderError::Rpc("daily quota exceeded".into()));
        assert_eq!(c.kind, ErrorKind::RateLimited);
    }

    #[test]
    fn test_not_found_is_fatal() {
        let c = classify(&http(404, ""));
        assert_eq!(c.kind, ErrorKind::NotFound);
        assert!(c.is_fatal);
        assert_eq!(classify(&ProviderError::Rpc("Account not found".into())).kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_transport_failures() {
        assert_eq!(
            classify(&ProviderError::Connect("refused".into())).kind,
            ErrorKind::NetworkError
        );
        assert_eq!(
            classify(&ProviderError::Timeout(Duration::from_secs(10))).kind,
            ErrorKind::NetworkError
        );
        assert_eq!(
            classify(&ProviderError::TimedOut("deadline has elapsed".into())).kind,
            ErrorKind::NetworkError
        );
    }

    #[test]
    fn test_server_and_unknown() {
        assert_eq!(classify(&http(502, "bad gateway")).kind, ErrorKind::ServerError);
        assert_eq!(classify(&http(400, "bad request")).kind, ErrorKind::Unknown);
        assert_eq!(classify(&ProviderError::Decode("expected hex".into())).kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(ErrorKind::RateLimited.user_message(None), "Rate limited — retry after 60s");
        assert_eq!(ErrorKind::CrossOriginBlocked.user_message(None), "Blocked by network security policy");
        assert_eq!(ErrorKind::NotFound.user_message(None), "Address not found");
    }
}
