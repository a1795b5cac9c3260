//! Engine configuration.
//!
//! Settings come from code, from environment variables, or (with the
//! `config` feature) from JSON/YAML documents.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Behavior switches for a [`ResolutionEngine`](crate::ResolutionEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Store per-injection-point shortcuts after scalar resolutions
    pub cache_shortcuts: bool,
    /// Disable the relaxed qualifier/generic fallback pass
    pub strict_qualifiers: bool,
    /// Allow an owner to satisfy its own scalar dependency as a last resort
    pub self_reference_fallback: bool,
    /// Sort array, list and stream elements by priority
    pub order_collections: bool,
    /// Check materialized instance types against the expected type
    pub verify_instance_types: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_shortcuts: true,
            strict_qualifiers: false,
            self_reference_fallback: true,
            order_collections: true,
            verify_instance_types: true,
        }
    }
}

const KEYS: [&str; 5] = [
    "CACHE_SHORTCUTS",
    "STRICT_QUALIFIERS",
    "SELF_REFERENCE_FALLBACK",
    "ORDER_COLLECTIONS",
    "VERIFY_INSTANCE_TYPES",
];

impl EngineConfig {
    /// Reads `{PREFIX}_CACHE_SHORTCUTS`-style booleans, keeping defaults for
    /// unset variables.
    ///
    /// Accepts `true/false`, `1/0`, `yes/no` and `on/off` (case-insensitive).
    pub fn from_env(prefix: &str) -> DiResult<Self> {
        Self::from_lookup(prefix, |key| env::var(key).ok())
    }

    fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> DiResult<Self> {
        let mut config = Self::default();
        let prefix = prefix.trim_end_matches('_').to_uppercase();
        for key in KEYS {
            let var = if prefix.is_empty() { key.to_string() } else { format!("{}_{}", prefix, key) };
            if let Some(raw) = lookup(&var) {
                let value = parse_bool(&raw)
                    .ok_or_else(|| DiError::Config(format!("{} is not a boolean: '{}'", var, raw)))?;
                config.set(key, value);
            }
        }
        Ok(config)
    }

    fn set(&mut self, key: &str, value: bool) {
        match key {
            "CACHE_SHORTCUTS" => self.cache_shortcuts = value,
            "STRICT_QUALIFIERS" => self.strict_qualifiers = value,
            "SELF_REFERENCE_FALLBACK" => self.self_reference_fallback = value,
            "ORDER_COLLECTIONS" => self.order_collections = value,
            "VERIFY_INSTANCE_TYPES" => self.verify_instance_types = value,
            _ => {}
        }
    }

    #[cfg(feature = "config")]
    pub fn from_json_str(input: &str) -> DiResult<Self> {
        serde_json::from_str(input).map_err(|e| DiError::Config(format!("invalid JSON configuration: {}", e)))
    }

    #[cfg(feature = "config")]
    pub fn from_yaml_str(input: &str) -> DiResult<Self> {
        serde_yaml::from_str(input).map_err(|e| DiError::Config(format!("invalid YAML configuration: {}", e)))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
