//! Provider configuration
//!
//! Settings are layered, lowest precedence first:
//! 1. built-in defaults
//! 2. the config file (`DANUBEDATA_CONFIG_PATH`, else `~/.config/danubedata/config.yaml`)
//! 3. environment variables `DANUBEDATA_API_TOKEN`, `DANUBEDATA_BASE_URL`
//! 4. values passed by the host in its `configure` request

pub mod error;

pub use error::*;

use danubedata_core::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://danubedata.ro/api/v1";
pub const ENV_API_TOKEN: &str = "DANUBEDATA_API_TOKEN";
pub const ENV_BASE_URL: &str = "DANUBEDATA_BASE_URL";
pub const ENV_CONFIG_PATH: &str = "DANUBEDATA_CONFIG_PATH";

const CONFIG_DIR: &str = "danubedata";
const CONFIG_FILE: &str = "config.yaml";

/// DanubeData provider configuration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API token (secret)
    pub api_token: Option<String>,

    /// REST API base URL
    pub base_url: String,

    /// Timeout of a single HTTP request, in seconds
    pub request_timeout_secs: u64,

    /// How long create/update waits for a resource to become ready, in seconds
    pub ready_timeout_secs: u64,

    /// Interval between readiness polls, in seconds
    pub poll_interval_secs: u64,

    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            ready_timeout_secs: 600,
            poll_interval_secs: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("ready_timeout_secs", &self.ready_timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Values supplied by the host at configure time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Load defaults, then the config file if one exists, then the environment
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Override with `DANUBEDATA_API_TOKEN` / `DANUBEDATA_BASE_URL`
    pub fn apply_env(&mut self) {
        if let Some(token) = non_empty_env(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(url) = non_empty_env(ENV_BASE_URL) {
            self.base_url = url;
        }
    }

    /// Override with values from the host
    pub fn merge(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = overrides.api_token.filter(|t| !t.is_empty()) {
            self.api_token = Some(token);
        }
        if let Some(url) = overrides.base_url.filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        Ok(())
    }

    /// The API token, or an error explaining where to set it
    pub fn require_token(&self) -> Result<&str> {
        self.api_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingApiToken)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Directory holding the provider's config file
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Locate the config file
///
/// `DANUBEDATA_CONFIG_PATH` wins when it points at an existing file; otherwise
/// `~/.config/danubedata/config.yaml` is used if present.
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(path) = non_empty_env(ENV_CONFIG_PATH).map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points at a missing file: {}", ENV_CONFIG_PATH, path.display());
    }

    let global = config_dir().ok()?.join(CONFIG_FILE);
    global.exists().then_some(global)
}
