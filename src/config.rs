//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The Fio access token is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`, so it never sits in the file.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::bank::fio::DEFAULT_BASE_URL;
use crate::engine::poller::DEFAULT_RETRY_BACKOFF;
use crate::engine::scheduler::DEFAULT_REFRESH;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub fio: FioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Items bound to bank accounts.
    #[serde(default)]
    pub items: Vec<ItemBinding>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FioConfig {
    /// Poll interval in milliseconds.
    #[serde(default = "default_refresh")]
    pub refresh: u64,
    /// Name of the environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Scheme and host of the statement feed.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Wait between attempts while the feed is rate limiting (ms).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for FioConfig {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            token_env: default_token_env(),
            base_url: default_base_url(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// JSON file holding the last published item states. No persistence if unset.
    #[serde(default)]
    pub state_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ItemBinding {
    pub name: String,
    pub account_id: String,
}

fn default_refresh() -> u64 {
    DEFAULT_REFRESH.as_millis() as u64
}

fn default_token_env() -> String {
    "FIO_TOKEN".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF.as_millis() as u64
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fio.refresh == 0 {
            anyhow::bail!("fio.refresh must be greater than zero");
        }
        if self.fio.retry_backoff_ms == 0 {
            anyhow::bail!("fio.retry_backoff_ms must be greater than zero");
        }
        if let Some(item) = self
            .items
            .iter()
            .find(|i| i.name.trim().is_empty() || i.account_id.trim().is_empty())
        {
            anyhow::bail!("Item binding needs a name and an account_id: {item:?}");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

impl FioConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// The access token, or `None` if the variable is unset or blank.
    pub fn resolve_token(&self) -> Option<SecretString> {
        AppConfig::resolve_env(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(SecretString::new)
    }
}
