//! Application path resolution
//!
//! - **Dev mode**: `config.yaml` in the current directory wins, logs go to
//!   `./logs`.
//! - **Installed mode**: config in the user config dir
//!   (`~/.config/hass-mixer-bridge/config.yaml` on Linux), logs in the local
//!   data dir.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "hass-mixer-bridge";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config: PathBuf,
    pub logs_dir: PathBuf,
}

impl AppPaths {
    /// Resolve paths for the current process
    ///
    /// Runs before logging is up, so nothing is logged here.
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve(&cwd, dirs::config_dir(), dirs::data_local_dir())
    }

    fn resolve(cwd: &Path, config_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        let cwd_config = cwd.join(CONFIG_FILE);
        if cwd_config.exists() {
            return Self {
                config: cwd_config,
                logs_dir: cwd.join("logs"),
            };
        }

        let config_base = config_dir.unwrap_or_else(|| cwd.to_path_buf()).join(APP_DIR);
        let data_base = data_dir.unwrap_or_else(|| cwd.to_path_buf()).join(APP_DIR);
        Self {
            config: config_base.join(CONFIG_FILE),
            logs_dir: data_base.join("logs"),
        }
    }

    /// Create the logs directory if needed
    pub fn ensure_logs_dir(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir).with_context(|| {
                format!("Failed to create logs directory {}", self.logs_dir.display())
            })?;
        }
        Ok(())
    }
}
