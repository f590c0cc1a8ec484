use thiserror::Error;

/// Application-wide error types for Talos.
#[derive(Error, Debug)]
pub enum AppError {
    /// The remote service is throttling us (HTTP 403/429/503-class).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The product page does not exist (HTTP 404).
    #[error("product not found: {0}")]
    NotFound(String),

    /// The response carried no parsable product payload.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Any other unexpected HTTP response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network/connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Retry budget consumed without a successful fetch.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    /// Raw document is structurally unusable (not a mapping at all).
    #[error("projection error: {0}")]
    ProjectionError(String),

    /// Checkpoint storage failed. Fatal: progress can no longer be tracked.
    #[error("checkpoint store error: {0}")]
    CheckpointError(String),

    /// Writing an output record failed.
    #[error("output sink error: {0}")]
    SinkError(String),

    /// Invalid run configuration.
    #[error("config error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying with backoff.
    ///
    /// Only the rate-limit class retries: throttling responses, timeouts, and
    /// connection failures. Everything else fails the unit immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited(_) | AppError::Timeout(_) | AppError::NetworkError(_)
        )
    }

    /// Returns true if this error must abort the whole run.
    ///
    /// Losing the checkpoint store means progress can no longer be recorded
    /// durably, which breaks the resume guarantee.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::CheckpointError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::RateLimited("HTTP 429".into()).is_retryable());
        assert!(AppError::Timeout(30).is_retryable());
        assert!(AppError::NetworkError("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_terminal_errors() {
        assert!(!AppError::NotFound("shop.example_123".into()).is_retryable());
        assert!(!AppError::Malformed("no payload".into()).is_retryable());
        assert!(!AppError::Http("HTTP 500".into()).is_retryable());
        assert!(!AppError::ProjectionError("not an object".into()).is_retryable());
        assert!(
            !AppError::ExhaustedRetries {
                attempts: 5,
                last_error: "rate limited".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(AppError::CheckpointError("disk full".into()).is_fatal());
        assert!(!AppError::RateLimited("HTTP 429".into()).is_fatal());
        assert!(!AppError::SinkError("permission denied".into()).is_fatal());
    }
}
