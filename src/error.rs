//! Muninn error types

use crate::inflight::RequestId;

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Input errors
    /// Request options could not be canonicalized for fingerprinting.
    ///
    /// Local to the caller and never retried.
    #[error("malformed options: {0}")]
    MalformedOptions(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Internal invariant violations
    /// An id was registered twice with the in-flight registry.
    ///
    /// Indicates a bug in id issuance; the offending call path is aborted
    /// and the registry is left untouched.
    #[error("duplicate in-flight request id: {0}")]
    DuplicateRequestId(RequestId),

    // Upstream outcomes
    /// The provider reported an error (error fragment, failed stream, or
    /// failed invocation). Never cached.
    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// The request was cancelled: superseded by a newer one in the same
    /// logical group, or aborted with `cancel_group`/`cancel_all`.
    #[error("request cancelled")]
    Cancelled,

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MuninnError {
    /// Whether this is the expected outcome of supersession rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MuninnError::Cancelled)
    }

    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Only upstream and transport failures qualify; input errors, invariant
    /// violations and supersession never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MuninnError::Provider { .. } | MuninnError::Stream(_))
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_not_retryable() {
        let err = MuninnError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[test]
    fn cancelled_display_covers_explicit_aborts() {
        assert_eq!(MuninnError::Cancelled.to_string(), "request cancelled");
    }

    #[test]
    fn provider_error_display_names_provider() {
        let err = MuninnError::Provider {
            provider: "claude".into(),
            message: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "provider 'claude' failed: overloaded");
        assert!(err.is_retryable());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn duplicate_id_display() {
        let err = MuninnError::DuplicateRequestId(RequestId::from_raw(7));
        assert_eq!(err.to_string(), "duplicate in-flight request id: #7");
        assert!(!err.is_retryable());
    }
}
