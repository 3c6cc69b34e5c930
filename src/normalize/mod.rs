//! Response normalization.
//!
//! Providers answer in different shapes: a single payload, or a stream of
//! deltas, block starts and error events. [`wire`] decodes those raw shapes
//! into [`Fragment`]s, and a [`ResponseNormalizer`] folds the fragments of
//! one call into a [`NormalizedResult`].
//!
//! ```text
//! Started ──text──▶ Accumulating ──StreamEnd──▶ Completed
//!    │                   │
//!    └──error/cancel─────┴──error/cancel──────▶ Failed
//! ```
//!
//! `Completed` and `Failed` are terminal. Fragments, end signals, errors and
//! cancellation arriving after a terminal transition are ignored.

pub mod wire;

use crate::types::NormalizedResult;

/// Error marker recorded when a call is cancelled, whether by a newer
/// request in its group or by an explicit abort.
pub const CANCELLED_MARKER: &str = "cancelled";

/// One incremental piece of a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Text to append.
    TextDelta(String),
    /// A new content block begins, possibly with initial text.
    BlockStart { text: Option<String> },
    /// The provider reported an error.
    ErrorEvent {
        message: String,
        kind: Option<String>,
    },
    /// Explicit end of the response.
    StreamEnd,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::TextDelta(text.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Fragment::ErrorEvent {
            message: message.into(),
            kind: None,
        }
    }

    /// The fragments of a non-streaming response: the full text, then end.
    pub fn complete(text: impl Into<String>) -> Vec<Fragment> {
        vec![Fragment::TextDelta(text.into()), Fragment::StreamEnd]
    }
}

/// Lifecycle state of a [`ResponseNormalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerState {
    Started,
    Accumulating,
    Completed,
    Failed,
}

impl NormalizerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NormalizerState::Completed | NormalizerState::Failed)
    }
}

/// Terminal outcome of a call.
///
/// Every variant carries the final result; cancelled and failed results
/// hold the text accumulated before the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(NormalizedResult),
    /// Superseded by a newer request.
    Cancelled(NormalizedResult),
    /// The provider reported an error.
    Failed(NormalizedResult),
}

impl Outcome {
    pub fn result(&self) -> &NormalizedResult {
        match self {
            Outcome::Completed(r) | Outcome::Cancelled(r) | Outcome::Failed(r) => r,
        }
    }

    pub fn into_result(self) -> NormalizedResult {
        match self {
            Outcome::Completed(r) | Outcome::Cancelled(r) | Outcome::Failed(r) => r,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// Metric label for this outcome.
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Completed(_) => "ok",
            Outcome::Cancelled(_) => "cancelled",
            Outcome::Failed(_) => "error",
        }
    }
}

/// Accumulates the fragments of one provider call.
#[derive(Debug)]
pub struct ResponseNormalizer {
    state: NormalizerState,
    text: String,
    error_message: Option<String>,
    cancelled: bool,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self {
            state: NormalizerState::Started,
            text: String::new(),
            error_message: None,
            cancelled: false,
        }
    }

    pub fn state(&self) -> NormalizerState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Feed one fragment.
    ///
    /// Returns `true` if the fragment was accepted, `false` if it was
    /// discarded because the normalizer is already terminal.
    pub fn apply(&mut self, fragment: Fragment) -> bool {
        if self.is_terminal() {
            return false;
        }

        match fragment {
            Fragment::TextDelta(text) => {
                self.text.push_str(&text);
                self.state = NormalizerState::Accumulating;
            }
            Fragment::BlockStart { text } => {
                if let Some(text) = text {
                    self.text.push_str(&text);
                }
                self.state = NormalizerState::Accumulating;
            }
            Fragment::ErrorEvent { message, kind } => {
                let message = match kind {
                    Some(kind) => format!("{kind}: {message}"),
                    None => message,
                };
                self.fail(message);
            }
            Fragment::StreamEnd => self.finish(),
        }
        true
    }

    /// Complete the result. Also used when a stream is exhausted without an
    /// explicit end signal.
    pub fn finish(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.state = NormalizerState::Completed;
    }

    /// Fail with a provider error.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.error_message = Some(message.into());
        self.state = NormalizerState::Failed;
    }

    /// Fail with the cancelled marker, whatever has been accumulated so far.
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.cancelled = true;
        self.fail(CANCELLED_MARKER);
    }

    /// Whether the normalizer failed because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Current view of the result.
    pub fn snapshot(&self) -> NormalizedResult {
        NormalizedResult {
            text: self.text.clone(),
            is_complete: self.state == NormalizerState::Completed,
            error_message: self.error_message.clone(),
        }
    }

    /// The terminal outcome, or `None` while the call is still running.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            NormalizerState::Completed => Some(Outcome::Completed(self.snapshot())),
            NormalizerState::Failed if self.cancelled => Some(Outcome::Cancelled(self.snapshot())),
            NormalizerState::Failed => Some(Outcome::Failed(self.snapshot())),
            _ => None,
        }
    }

    /// Consume the normalizer, completing it first if it is still running.
    pub fn into_outcome(mut self) -> Outcome {
        self.finish();
        let result = self.snapshot();
        match self.state {
            NormalizerState::Failed if self.cancelled => Outcome::Cancelled(result),
            NormalizerState::Failed => Outcome::Failed(result),
            _ => Outcome::Completed(result),
        }
    }
}
