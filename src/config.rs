use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Polling interval in seconds between snapshot cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Page fan-out parameters for one snapshot fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Number of pages covering the whole collection.
    #[serde(default = "default_page_count")]
    pub page_count: usize,
    /// Listings requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Maximum page requests in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Upper bound on one whole snapshot fetch.
    #[serde(default = "default_cycle_timeout")]
    pub cycle_timeout_secs: u64,
}

/// Backoff applied while in the recovering state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

/// Reference catalog location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_page_count() -> usize {
    256
}

fn default_page_size() -> usize {
    21
}

fn default_concurrency() -> usize {
    8
}

fn default_cycle_timeout() -> u64 {
    120
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_catalog_path() -> String {
    "punks_db.json".to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_count: default_page_count(),
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            cycle_timeout_secs: default_cycle_timeout(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path. A missing file yields the
    /// built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
