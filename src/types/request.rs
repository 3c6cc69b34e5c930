//! Gateway request type

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::fingerprint::{CacheKey, fingerprint};

/// Logical group used when the caller does not name one.
pub const DEFAULT_GROUP: &str = "default";

/// A single request routed through the gateway.
///
/// ```rust
/// # use muninn::GatewayRequest;
/// let request = GatewayRequest::new("claude", "Summarize this video")
///     .options(serde_json::json!({"max_tokens": 512}))
///     .group("summary-panel");
/// assert_eq!(request.group, "summary-panel");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Provider identifier, as registered with the gateway.
    pub provider: String,
    pub prompt: String,
    /// Provider options; part of the fingerprint.
    #[serde(default = "empty_options")]
    pub options: Value,
    /// Requests in the same group supersede each other.
    #[serde(default = "default_group")]
    pub group: String,
    /// Skip cache lookup and in-flight joining. The fresh result is still cached.
    #[serde(default)]
    pub force_refresh: bool,
}

fn empty_options() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

impl GatewayRequest {
    pub fn new(provider: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            prompt: prompt.into(),
            options: empty_options(),
            group: default_group(),
            force_refresh: false,
        }
    }

    /// Set provider options.
    pub fn options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Set the logical group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Bypass the cache and any identical in-flight call.
    pub fn force_refresh(mut self, enabled: bool) -> Self {
        self.force_refresh = enabled;
        self
    }

    /// Fingerprint of `(provider, prompt, options)`.
    pub fn fingerprint(&self) -> Result<CacheKey> {
        fingerprint(&self.provider, &self.prompt, &self.options)
    }
}
