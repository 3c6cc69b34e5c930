//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. An explicit path (e.g. the CLI's `--config`)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! Every section is optional. A few values can be overridden from the
//! environment with [`Config::apply_env`]:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `MUNINN_CACHE_TTL` | `cache.ttl_secs` |
//! | `MUNINN_CACHE_MAX_SIZE` | `cache.max_entries` |
//! | `MUNINN_STREAM_BUFFER` | `stream.buffer` |
//!
//! ```toml
//! [cache]
//! ttl_secs = 600
//! max_entries = 1000
//!
//! [providers.grok]
//! timeout_secs = 30
//! max_retries = 2
//! model = "grok-3-beta"
//!
//! [profiles.my-model]
//! latency = "fast"
//! token_limit = 32000
//! cost_per_input_token = 0.000001
//! cost_per_output_token = 0.000002
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::gateway::DEFAULT_STREAM_BUFFER;
use crate::providers::ProviderSettings;
use crate::types::ModelProfile;
use crate::{MuninnError, Result};

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub stream: StreamSection,
    /// Per-provider settings keyed on provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSection>,
    /// Extra model profiles, added to (or replacing) the built-in ones.
    #[serde(default)]
    pub profiles: BTreeMap<String, ModelProfile>,
}

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Default entry TTL in seconds (default: 600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum number of entries (default: 1000).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Expiry sweep interval in seconds (default: 300).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_max_entries() -> usize {
    1_000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

/// Progressive streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSection {
    /// Snapshots buffered between the upstream reader and the consumer (default: 64).
    #[serde(default = "default_stream_buffer")]
    pub buffer: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            buffer: default_stream_buffer(),
        }
    }
}

fn default_stream_buffer() -> usize {
    DEFAULT_STREAM_BUFFER
}

/// Settings for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Cache TTL override in seconds.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Upstream timeout in seconds, forwarded to the adapter (default: 30).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Retry budget, forwarded to the adapter (default: 2).
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ProviderSection {
    pub fn to_settings(&self) -> ProviderSettings {
        let defaults = ProviderSettings::default();
        ProviderSettings {
            cache_ttl: self.cache_ttl_secs.map(Duration::from_secs),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            model: self.model.clone(),
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.muninn/config.toml`
    /// 3. `/etc/muninn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but fall back to defaults when no file
    /// exists in the standard locations. An explicit path must still exist.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match explicit_path {
            Some(path) => Self::load(Some(path)),
            None => match Self::standard_path() {
                Some(path) => Self::load_from_file(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Parse a config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            MuninnError::Configuration(msg) => {
                MuninnError::Configuration(format!("Failed to parse config file {path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MuninnError::Configuration(e.to_string()))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Self::standard_path().ok_or_else(|| {
            MuninnError::Configuration(
                "No config file found. Create ~/.muninn/config.toml or /etc/muninn/config.toml"
                    .to_string(),
            )
        })
    }

    fn standard_path() -> Option<PathBuf> {
        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/muninn/config.toml");
        system_config.exists().then_some(system_config)
    }

    /// Override values from environment variables.
    ///
    /// `lookup` is usually `|name| std::env::var(name).ok()`; tests pass a
    /// map lookup instead. Unparseable values are rejected rather than
    /// silently ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(ttl) = parse_env(&lookup, "MUNINN_CACHE_TTL")? {
            self.cache.ttl_secs = ttl;
        }
        if let Some(max) = parse_env(&lookup, "MUNINN_CACHE_MAX_SIZE")? {
            self.cache.max_entries = max;
        }
        if let Some(buffer) = parse_env(&lookup, "MUNINN_STREAM_BUFFER")? {
            self.stream.buffer = buffer;
        }
        Ok(())
    }

    /// The cache section as a [`CacheConfig`].
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
            .sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs))
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            MuninnError::Configuration(format!("{name} is not a valid number: {raw:?}"))
        }),
    }
}
