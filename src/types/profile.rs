//! Static model profiles

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Expected response latency of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    Fast,
    Medium,
    Slow,
}

impl LatencyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyClass::Fast => "fast",
            LatencyClass::Medium => "medium",
            LatencyClass::Slow => "slow",
        }
    }
}

/// Descriptive metadata for a model. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    #[serde(default)]
    pub description: String,
    pub latency: LatencyClass,
    /// Context window in tokens.
    pub token_limit: u32,
    /// USD per input token.
    pub cost_per_input_token: f64,
    /// USD per output token.
    pub cost_per_output_token: f64,
}

impl ModelProfile {
    /// Estimated USD cost of a call with the given token counts.
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.cost_per_input_token
            + output_tokens as f64 * self.cost_per_output_token
    }

    /// Whether a prompt of `tokens` tokens fits in the context window.
    pub fn fits(&self, tokens: u64) -> bool {
        tokens <= u64::from(self.token_limit)
    }
}

fn profile(
    description: &str,
    latency: LatencyClass,
    token_limit: u32,
    per_million_in: f64,
    per_million_out: f64,
) -> ModelProfile {
    ModelProfile {
        description: description.to_string(),
        latency,
        token_limit,
        cost_per_input_token: per_million_in / 1_000_000.0,
        cost_per_output_token: per_million_out / 1_000_000.0,
    }
}

/// Lookup table of model profiles keyed on model id.
#[derive(Debug, Clone, Default)]
pub struct ModelProfiles {
    profiles: HashMap<String, ModelProfile>,
}

impl ModelProfiles {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table seeded with the built-in profiles.
    pub fn with_builtin() -> Self {
        use LatencyClass::*;

        let mut table = Self::new();
        table.insert(
            "claude-3-opus-20240229",
            profile("Claude 3 Opus", Slow, 200_000, 15.0, 75.0),
        );
        table.insert(
            "claude-3-5-sonnet-20240620",
            profile("Claude 3.5 Sonnet", Medium, 200_000, 3.0, 15.0),
        );
        table.insert(
            "claude-3-haiku-20240307",
            profile("Claude 3 Haiku", Fast, 200_000, 0.25, 1.25),
        );
        table.insert(
            "gpt-3.5-turbo",
            profile("GPT-3.5 Turbo", Fast, 16_385, 0.5, 1.5),
        );
        table.insert("gpt-4", profile("GPT-4", Slow, 8_192, 30.0, 60.0));
        table.insert(
            "grok-3-beta",
            profile("Grok 3", Medium, 131_072, 3.0, 15.0),
        );
        table.insert(
            "gemini-1.5-flash-8b",
            profile("Gemini 1.5 Flash 8B", Fast, 1_048_576, 0.0375, 0.15),
        );
        table
    }

    /// Insert or replace a profile.
    pub fn insert(&mut self, model: impl Into<String>, profile: ModelProfile) {
        self.profiles.insert(model.into(), profile);
    }

    pub fn get(&self, model: &str) -> Option<&ModelProfile> {
        self.profiles.get(model)
    }

    /// Profiles sorted by model id.
    pub fn iter_sorted(&self) -> Vec<(&str, &ModelProfile)> {
        let mut entries: Vec<_> = self
            .profiles
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
