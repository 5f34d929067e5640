//! Configuration management for the swap engine
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Ticker inserted between the two ends of a hidden-hop swap
    pub hidden_intermediary: String,
    /// Issue minimum-amount lookups for all hops at once
    pub concurrent_lookups: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hidden_intermediary: "xmr".to_string(),
            concurrent_lookups: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("HOPSWAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` placeholders first
    pub fn from_toml(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            anyhow::bail!("provider.base_url must be set");
        }
        if self.provider.api_key.trim().is_empty() {
            anyhow::bail!("provider.api_key must be set (check CHANGENOW_API_KEY)");
        }
        if self.tracker.poll_interval_ms == 0 {
            anyhow::bail!("tracker.poll_interval_ms must be greater than zero");
        }
        if self.planner.hidden_intermediary.trim().is_empty() {
            anyhow::bail!("planner.hidden_intermediary must be set");
        }
        if self.provider.timeout_secs == 0 {
            tracing::warn!("provider.timeout_secs is 0 - requests will use no client timeout");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}
