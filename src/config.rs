//! Adapter configuration.
//!
//! Recognized keys (all optional, unknown keys are rejected):
//! - `case_sensitive` (default `true`): when `false`, pattern operators (`like`,
//!   `contains`, `startsWith`, `endsWith`) compile to case-insensitive regexes.
//! - `coerce_foreign_keys` (default `true`): coerce foreign-key and to-one
//!   association values into native identifiers on the write path.
//! - `slow_call_ms` (default `500`): native calls at or above this duration are
//!   logged at warn level and counted as slow.
//! - `audit` (default `true`): emit audit lines for mutations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::AdapterError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    pub case_sensitive: bool,
    pub coerce_foreign_keys: bool,
    pub slow_call_ms: u64,
    pub audit: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self { case_sensitive: true, coerce_foreign_keys: true, slow_call_ms: 500, audit: true }
    }
}

impl AdapterConfig {
    /// # Errors
    /// Returns `AdapterError::Config` if the text is not valid TOML or names an unknown key.
    pub fn from_toml_str(text: &str) -> Result<Self, AdapterError> {
        Ok(toml::from_str(text)?)
    }

    /// # Errors
    /// Returns `AdapterError::Config` if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, AdapterError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AdapterError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Overlay values from the environment if present:
    /// - `NEXUS_ADAPTER_CASE_SENSITIVE`
    /// - `NEXUS_ADAPTER_COERCE_FOREIGN_KEYS`
    /// - `NEXUS_ADAPTER_SLOW_CALL_MS`
    /// - `NEXUS_ADAPTER_AUDIT`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(b) = env_bool("NEXUS_ADAPTER_CASE_SENSITIVE") {
            self.case_sensitive = b;
        }
        if let Some(b) = env_bool("NEXUS_ADAPTER_COERCE_FOREIGN_KEYS") {
            self.coerce_foreign_keys = b;
        }
        if let Some(ms) =
            std::env::var("NEXUS_ADAPTER_SLOW_CALL_MS").ok().and_then(|s| s.parse::<u64>().ok())
        {
            self.slow_call_ms = ms;
        }
        if let Some(b) = env_bool("NEXUS_ADAPTER_AUDIT") {
            self.audit = b;
        }
        self
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = std::env::var(key).ok()?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            log::warn!("ignoring unrecognized boolean in {key}: {raw}");
            None
        }
    }
}
