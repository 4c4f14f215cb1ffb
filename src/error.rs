//! Error types for the Hotboard gateway

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Hotboard gateway
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected upstream HTTP status
    #[error("unexpected HTTP status: {0}")]
    HttpStatus(u16),

    /// Upstream returned a successful but empty body
    #[error("upstream returned an empty body")]
    EmptyBody,

    /// Upstream payload failed to decode
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Upstream payload decoded but was missing expected data
    #[error("upstream payload malformed: {0}")]
    MalformedPayload(String),

    /// Data-source failure, surfaced to the caller with platform context
    #[error("fetching {platform} data failed: {source}")]
    DataSource {
        platform: String,
        #[source]
        source: Box<Error>,
    },

    /// All retry attempts exhausted
    #[error("request failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Caller canceled the request during a retry backoff wait
    #[error("request canceled during retry backoff")]
    Canceled,

    /// Redis error (L2 cache tier)
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Cache tier operation exceeded its deadline
    #[error("cache tier operation timed out after {0:?}")]
    TierTimeout(Duration),

    /// Cache initialization failure (fatal for L1)
    #[error("cache initialization failed: {0}")]
    CacheInit(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No handler registered for the requested route
    #[error("unknown route: {0}")]
    UnknownRoute(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code to report for this error at the serving layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnknownRoute(_) => 404,
            Error::Canceled | Error::TierTimeout(_) => 504,
            _ => 500,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_names_attempts_and_cause() {
        let err = Error::RetryExhausted {
            attempts: 3,
            source: Box::new(Error::HttpStatus(502)),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(format!("{:?}", err).contains("502"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::UnknownRoute("/nope".into()).status_code(), 404);
        assert_eq!(Error::Canceled.status_code(), 504);
        assert_eq!(Error::EmptyBody.status_code(), 500);
    }

    #[test]
    fn test_data_source_carries_platform() {
        let err = Error::DataSource {
            platform: "weibo".into(),
            source: Box::new(Error::EmptyBody),
        };
        assert!(err.to_string().contains("weibo"));
    }
}
