//! Configuration management for HASS Mixer Bridge
//!
//! Handles loading, parsing, validation and hot-reloading of the YAML
//! configuration file.

pub mod watcher;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Environment variable overriding `hass.token`
pub const TOKEN_ENV: &str = "HASS_TOKEN";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    pub hass: HassConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Home Assistant connection
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HassConfig {
    /// Host and port (`192.168.1.20:8123`) or full base URL
    pub host: String,
    /// Long-lived access token (may come from `HASS_TOKEN` instead)
    #[serde(default)]
    pub token: String,
    /// Poll interval in seconds, 0 disables polling
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Reconciliation engine tuning
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BridgeConfig {
    /// Minimum spacing between brightness writes of one fader
    #[serde(default = "default_volume_throttle")]
    pub volume_throttle_ms: u64,
    /// Light transition for brightness writes, in seconds
    #[serde(default = "default_transition")]
    pub transition_secs: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            volume_throttle_ms: default_volume_throttle(),
            transition_secs: default_transition(),
        }
    }
}

/// Optional file logging
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// File name inside the logs directory (rotated daily)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Write the log file as JSON lines
    #[serde(default)]
    pub json: bool,
}

impl HassConfig {
    /// Base URL of the REST API, `http://` is assumed without a scheme
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        }
    }

    /// Whether a reload of this section needs a new client
    pub fn connection_changed(&self, other: &HassConfig) -> bool {
        self.host != other.host
            || self.token != other.token
            || self.request_timeout_ms != other.request_timeout_ms
    }
}

impl AppConfig {
    /// Load configuration from file
    ///
    /// Applies the `HASS_TOKEN` override and validates the result.
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path))?;

        Ok(config)
    }

    /// Parse YAML without touching the environment
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Take the token from `HASS_TOKEN` when set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.hass.token = token.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hass.host.trim().is_empty() {
            bail!("hass.host must not be empty");
        }
        if self.hass.token.trim().is_empty() {
            bail!("hass.token is empty (set it in the config or via {})", TOKEN_ENV);
        }
        if self.bridge.volume_throttle_ms == 0 {
            bail!("bridge.volume_throttle_ms must be greater than 0");
        }
        if !self.bridge.transition_secs.is_finite() || self.bridge.transition_secs < 0.0 {
            bail!("bridge.transition_secs must be a non-negative number");
        }
        Ok(())
    }
}

// Default value functions
fn default_poll_interval() -> u64 { 5 }
fn default_request_timeout() -> u64 { 5000 }
fn default_volume_throttle() -> u64 { 350 }
fn default_transition() -> f32 { 0.35 }
