//! Muninn - caching, deduplicating gateway core for AI text providers
//!
//! Requests name a provider, a prompt and provider options. The gateway
//! fingerprints each request and serves it from a bounded TTL cache when it
//! can. Otherwise it joins an identical call already in flight, or calls the
//! provider through a [`ProviderAdapter`](providers::ProviderAdapter). A
//! newer request in the same *logical group* cancels older ones. Provider
//! output, streamed or not, is normalized into one [`NormalizedResult`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use muninn::normalize::Fragment;
//! use muninn::providers::{FragmentStream, ProviderAdapter, until_cancelled};
//! use muninn::{GatewayRequest, Muninn};
//! use serde_json::Value;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ProviderAdapter for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn invoke(
//!         &self,
//!         prompt: &str,
//!         _options: &Value,
//!         cancel: CancellationToken,
//!     ) -> muninn::Result<FragmentStream> {
//!         let fragments = Fragment::complete(prompt).into_iter().map(Ok);
//!         Ok(until_cancelled(futures_util::stream::iter(fragments), cancel))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let gateway = Muninn::builder().provider("echo", Arc::new(Echo)).build()?;
//!
//!     let request = GatewayRequest::new("echo", "hello").group("panel-1");
//!     let first = gateway.handle(&request).await?;
//!     let second = gateway.handle(&request).await?; // served from cache
//!
//!     assert_eq!(first, second);
//!     assert_eq!(gateway.metrics_snapshot().hits, 1);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod inflight;
pub mod normalize;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheMetrics};
pub use config::Config;
pub use error::{MuninnError, Result};
pub use fingerprint::{CacheKey, fingerprint};
pub use gateway::{Gateway, Muninn, MuninnBuilder};
pub use inflight::{InFlightRegistry, RequestId};
pub use normalize::{Fragment, Outcome, ResponseNormalizer};
pub use providers::{ProviderAdapter, ProviderSettings};

// Re-export all types
pub use types::{
    DEFAULT_GROUP, GatewayRequest, LatencyClass, ModelProfile, ModelProfiles, NormalizedResult,
};
