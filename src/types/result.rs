//! Normalized response type

use serde::{Deserialize, Serialize};

/// Provider-independent response shape.
///
/// Produced incrementally by the
/// [`ResponseNormalizer`](crate::normalize::ResponseNormalizer). Snapshots
/// taken while a stream is still running have `is_complete == false` and
/// no `error_message`; a failed result keeps whatever text had been
/// accumulated before the failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub text: String,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl NormalizedResult {
    /// A finished result with the given text.
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_complete: true,
            error_message: None,
        }
    }

    /// Whether the result ended in failure (provider error or cancellation).
    pub fn is_failed(&self) -> bool {
        self.error_message.is_some()
    }
}
