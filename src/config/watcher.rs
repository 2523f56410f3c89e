//! Hot reload of the config file
//!
//! notify callbacks run on their own OS thread, so reloads are spawned on the
//! runtime handle captured at construction time.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Delay before re-reading, editors write in several steps
const RELOAD_SETTLE: Duration = Duration::from_millis(100);

/// Watches the config file and yields every valid new version
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load the config and start watching it
    ///
    /// A reload that fails to parse or validate is logged and dropped; the
    /// caller keeps running on the previous config.
    pub async fn new(config_path: impl Into<PathBuf>) -> Result<(Self, Arc<AppConfig>)> {
        let path: PathBuf = config_path.into();
        let path_str = path.to_string_lossy().to_string();

        let initial = AppConfig::load(&path_str)
            .await
            .context("Failed to load initial config")?;

        let (tx, rx) = mpsc::channel(10);
        let runtime = tokio::runtime::Handle::current();
        let reload_path = path_str.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("Config watch error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            debug!("Config file changed: {:?}", event.paths);

            let path = reload_path.clone();
            let tx = tx.clone();
            runtime.spawn(async move {
                tokio::time::sleep(RELOAD_SETTLE).await;
                reload(&path, &tx).await;
            });
        })?;

        watcher
            .watch(Path::new(&path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", path_str))?;

        info!("👀 Watching config file: {}", path_str);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            Arc::new(initial),
        ))
    }

    /// Next reloaded config, `None` once the watcher is gone
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

async fn reload(path: &str, tx: &mpsc::Sender<AppConfig>) {
    match AppConfig::load(path).await {
        Ok(config) => {
            info!("🔄 Configuration reloaded");
            if let Err(e) = tx.send(config).await {
                error!("Failed to forward config update: {}", e);
            }
        }
        Err(e) => {
            warn!("Config reload rejected (keeping current config): {:#}", e);
        }
    }
}
