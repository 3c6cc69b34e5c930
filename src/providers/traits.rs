//! Provider adapter trait.
//!
//! The gateway does not talk to AI vendors itself. Each vendor is reached
//! through a [`ProviderAdapter`] that owns transport, credentials, timeouts
//! and retries, and hands back the response as a stream of
//! [`Fragment`](crate::normalize::Fragment)s.
//!
//! # Example
//!
//! ```ignore
//! #[async_trait]
//! impl ProviderAdapter for ClaudeAdapter {
//!     fn name(&self) -> &str { "claude" }
//!
//!     async fn invoke(&self, prompt: &str, options: &Value, cancel: CancellationToken)
//!         -> Result<FragmentStream>
//!     {
//!         let body = self.client.post(prompt, options).await?;
//!         let fragments = WireFormat::Anthropic.decode(&body)?;
//!         Ok(until_cancelled(futures_util::stream::iter(fragments.into_iter().map(Ok)), cancel))
//!     }
//! }
//! ```

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::normalize::Fragment;

/// Lazy, finite sequence of response fragments.
///
/// Non-streaming adapters yield the whole text followed by
/// [`Fragment::StreamEnd`]. An `Err` item fails the call with that message.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// Adapter for one upstream AI text provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Start a call and return its fragments.
    ///
    /// The adapter must stop producing fragments promptly once `cancel` is
    /// triggered; [`until_cancelled`](super::until_cancelled) does this for
    /// any stream. The gateway also stops reading on cancellation and
    /// discards anything that arrives afterwards.
    async fn invoke(
        &self,
        prompt: &str,
        options: &Value,
        cancel: CancellationToken,
    ) -> Result<FragmentStream>;
}
