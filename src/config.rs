//! Configuration stored in `~/.dealdesk/config.json`.
//!
//! A missing file yields defaults so first runs work without setup; a file
//! that exists but fails to parse is an error (silently ignoring a typo'd
//! config is worse than refusing to start).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config at {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub gong: GongConfig,
}

/// Gong integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GongConfig {
    /// Directory holding the call index and transcript cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Provider API base URL. Overridable for tests and proxies.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Blocking wait between page requests, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Hard ceiling on pages per sync run. A provider whose cursor never
    /// terminates is a fault, not a workload.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Default historical window for `backfill`, in months.
    #[serde(default = "default_backfill_months")]
    pub backfill_months: u32,
    /// The seller's own brand names as they appear in call titles
    /// (e.g. the company name and product names). Excluded from extracted
    /// account names.
    #[serde(default)]
    pub seller_aliases: Vec<String>,
    /// Email domains belonging to the seller's own org, excluded from
    /// participant-domain matching.
    #[serde(default)]
    pub internal_domains: Vec<String>,
}

fn default_cache_dir() -> String {
    "data/gong-cache".to_string()
}

fn default_base_url() -> String {
    "https://api.gong.io".to_string()
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_max_pages() -> u32 {
    50
}

fn default_backfill_months() -> u32 {
    6
}

impl Default for GongConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            base_url: default_base_url(),
            delay_ms: default_delay_ms(),
            max_pages: default_max_pages(),
            backfill_months: default_backfill_months(),
            seller_aliases: Vec::new(),
            internal_domains: Vec::new(),
        }
    }
}

/// Path to the config file.
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".dealdesk")
        .join("config.json")
}

impl AppConfig {
    /// Load config from disk, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: path.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let path = PathBuf::from("/nonexistent/dealdesk-config.json");
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gong.delay_ms, 2000);
        assert_eq!(config.gong.max_pages, 50);
        assert_eq!(config.gong.cache_dir, "data/gong-cache");
        assert!(config.gong.seller_aliases.is_empty());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{
            "gong": {
                "sellerAliases": ["initech", "flux"],
                "internalDomains": ["initech.com"],
                "delayMs": 500
            }
        }"#;

        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.gong.seller_aliases, vec!["initech", "flux"]);
        assert_eq!(config.gong.delay_ms, 500);
        assert_eq!(config.gong.max_pages, 50);
        assert_eq!(config.gong.base_url, "https://api.gong.io");
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = AppConfig::load_from(&path);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
