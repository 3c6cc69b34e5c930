//! Builder for configuring gateway instances

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{DEFAULT_STREAM_BUFFER, Gateway};
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::Config;
use crate::providers::{ProviderAdapter, ProviderRegistry, ProviderSettings};
use crate::types::{ModelProfile, ModelProfiles};
use crate::{MuninnError, Result};

/// Main entry point for creating gateway instances.
pub struct Muninn;

impl Muninn {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct MuninnBuilder {
    cache: CacheConfig,
    adapters: Vec<(String, Arc<dyn ProviderAdapter>)>,
    settings: HashMap<String, ProviderSettings>,
    stream_buffer: usize,
    profiles: ModelProfiles,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            cache: CacheConfig::default(),
            adapters: Vec::new(),
            settings: HashMap::new(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            profiles: ModelProfiles::with_builtin(),
        }
    }

    /// Configure the response cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Register a provider adapter under `name`.
    ///
    /// Requests select the provider by this name; registering the same name
    /// twice keeps the last adapter.
    pub fn provider(mut self, name: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push((name.into(), adapter));
        self
    }

    /// Set the settings of provider `name` (cache TTL, timeout, retries, model).
    pub fn provider_settings(mut self, name: impl Into<String>, settings: ProviderSettings) -> Self {
        self.settings.insert(name.into(), settings);
        self
    }

    /// Set how many progressive snapshots are buffered per streaming request.
    pub fn stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size;
        self
    }

    /// Add or replace a model profile.
    pub fn profile(mut self, model: impl Into<String>, profile: ModelProfile) -> Self {
        self.profiles.insert(model, profile);
        self
    }

    /// Apply a loaded [`Config`]: cache, stream buffer, provider settings
    /// and extra model profiles.
    pub fn config(mut self, config: &Config) -> Self {
        self.cache = config.cache_config();
        self.stream_buffer = config.stream.buffer;
        for (name, section) in &config.providers {
            self.settings.insert(name.clone(), section.to_settings());
        }
        for (model, profile) in &config.profiles {
            self.profiles.insert(model.clone(), profile.clone());
        }
        self
    }

    /// Build the gateway.
    pub fn build(mut self) -> Result<Gateway> {
        // Must have at least one provider
        if self.adapters.is_empty() {
            return Err(MuninnError::NoProvider);
        }
        if self.stream_buffer == 0 {
            return Err(MuninnError::Configuration(
                "stream buffer must be at least 1".to_string(),
            ));
        }

        let mut registry = ProviderRegistry::new();
        for (name, adapter) in self.adapters {
            if name.is_empty() {
                return Err(MuninnError::Configuration(
                    "provider name must not be empty".to_string(),
                ));
            }
            let settings = self.settings.remove(&name).unwrap_or_default();
            registry.insert(name, adapter, settings);
        }
        for name in self.settings.keys() {
            debug!(provider = %name, "settings for unregistered provider ignored");
        }

        Ok(Gateway::new(
            registry,
            ResponseCache::new(&self.cache),
            self.profiles,
            self.stream_buffer,
        ))
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
