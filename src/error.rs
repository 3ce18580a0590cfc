//! Error types for mail-triage.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

impl LlmError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Mailbox fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// No usable credential, or the provider rejected it. Fatal to the run.
    #[error("Authentication failed for {provider}: {reason}")]
    Authentication { provider: String, reason: String },

    /// Rate limiting or provider-side outage. The caller may retry with backoff.
    #[error("{provider} temporarily unavailable: {reason}")]
    Transient {
        provider: String,
        reason: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid fetch window: {0}")]
    InvalidWindow(String),

    #[error("{provider} request failed: {reason}")]
    Request { provider: String, reason: String },
}

/// Classification could not produce a result even after fallbacks.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Unparseable classification response: {0}")]
    Unparseable(String),
}

/// Workflow store write errors. Non-fatal to a batch.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Workflow store rejected the record ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Permission denied by workflow store: {0}")]
    PermissionDenied(String),

    #[error("Workflow store request failed: {0}")]
    Request(String),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable() {
        let err = LlmError::RateLimited {
            provider: "openai".into(),
            retry_after: None,
        };
        assert!(err.is_retryable());

        let err = LlmError::AuthFailed {
            provider: "openai".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn pipeline_error_wraps_fetch_error() {
        let err: PipelineError = FetchError::Authentication {
            provider: "gmail".into(),
            reason: "no credential".into(),
        }
        .into();
        assert!(err.to_string().contains("Authentication failed for gmail"));
    }
}
