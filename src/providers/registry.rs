//! Named provider lookup.
//!
//! Every request names its provider; the registry resolves the name to an
//! adapter and the per-provider settings the gateway needs (the cache TTL)
//! plus the ones it only forwards for the adapter's benefit (timeout,
//! retries, model).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::ProviderAdapter;
use crate::{MuninnError, Result};

/// Per-provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Cache TTL for this provider's results. `None` uses the cache default.
    pub cache_ttl: Option<Duration>,
    /// Upstream timeout. Enforced by the adapter, not the gateway.
    pub timeout: Duration,
    /// Retry budget. Enforced by the adapter, not the gateway.
    pub max_retries: u32,
    pub model: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            cache_ttl: None,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            model: None,
        }
    }
}

impl ProviderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A registered provider.
#[derive(Clone)]
pub struct ProviderEntry {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub settings: ProviderSettings,
}

/// Registry of provider adapters keyed on provider name.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `name`, replacing any previous one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        adapter: Arc<dyn ProviderAdapter>,
        settings: ProviderSettings,
    ) {
        self.providers
            .insert(name.into(), ProviderEntry { adapter, settings });
    }

    /// Look up a provider, failing with [`MuninnError::UnknownProvider`].
    pub fn resolve(&self, name: &str) -> Result<&ProviderEntry> {
        self.providers
            .get(name)
            .ok_or_else(|| MuninnError::UnknownProvider(name.to_string()))
    }

    pub fn settings(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.get(name).map(|e| &e.settings)
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::FragmentStream;
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    struct Silent;

    #[async_trait]
    impl ProviderAdapter for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn invoke(
            &self,
            _prompt: &str,
            _options: &Value,
            _cancel: CancellationToken,
        ) -> Result<FragmentStream> {
            Ok(Box::pin(futures_util::stream::empty()))
        }
    }

    #[test]
    fn resolve_unknown_provider() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve("nope").err().unwrap();
        assert!(matches!(err, MuninnError::UnknownProvider(name) if name == "nope"));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ProviderRegistry::new();
        registry.insert("grok", Arc::new(Silent), ProviderSettings::default());
        registry.insert("claude", Arc::new(Silent), ProviderSettings::default());
        assert_eq!(registry.names(), vec!["claude", "grok"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn settings_defaults() {
        let s = ProviderSettings::default();
        assert_eq!(s.cache_ttl, None);
        assert_eq!(s.timeout, Duration::from_secs(30));
        assert_eq!(s.max_retries, 2);
    }
}
