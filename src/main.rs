//! HASS Mixer Bridge
//!
//! Drives Home Assistant lights and switches from a mixer-style control
//! surface. The bundled host is an interactive console.

use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use hass_mixer_bridge::config::{AppConfig, ConfigWatcher, LoggingConfig};
use hass_mixer_bridge::paths::AppPaths;
use hass_mixer_bridge::surface::console::{self, ConsoleCommand};
use hass_mixer_bridge::surface::{DisplayCallback, DisplayUpdate};
use hass_mixer_bridge::{Bridge, BridgeOptions, HassClient, RestHassClient};

/// HASS Mixer Bridge - Home Assistant lights and switches on a mixer surface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to ./config.yaml or the user config dir)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Poll interval in seconds, overrides the config (0 disables polling)
    #[arg(short, long)]
    poll_interval: Option<u64>,

    /// Print discovered entities with their classification and exit
    #[arg(long)]
    list_entities: bool,

    /// Run without the interactive console
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config.to_string_lossy().to_string());

    let (config_watcher, initial_config) = ConfigWatcher::new(config_path.clone()).await?;

    let _log_guard = init_logging(&args.log_level, initial_config.logging.as_ref(), &paths)?;

    info!("Starting HASS Mixer Bridge v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path);
    info!("Home Assistant: {}", initial_config.hass.base_url());

    let client: Arc<dyn HassClient> = Arc::new(
        RestHassClient::from_config(&initial_config.hass)
            .context("Failed to create Home Assistant client")?,
    );

    if args.list_entities {
        let entities = client.discover().await.context("Discovery failed")?;
        console::print_entities(&entities);
        return Ok(());
    }

    run_app(client, &args, (*initial_config).clone(), config_watcher, shutdown_signal()).await?;

    info!("HASS Mixer Bridge shutdown complete");
    Ok(())
}

async fn run_app(
    client: Arc<dyn HassClient>,
    args: &Args,
    config: AppConfig,
    mut config_watcher: ConfigWatcher,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut options = BridgeOptions::from_config(&config);
    if let Some(secs) = args.poll_interval {
        options.poll_interval_secs = secs;
    }

    let display = if args.no_console {
        log_display()
    } else {
        console::display_printer()
    };

    let bridge = match Bridge::start(client, options, Some(display)).await {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    };
    info!("✅ Bridge ready ({} controls)", bridge.registry().len());

    let mut console_rx = if args.no_console {
        None
    } else {
        console::print_controls(bridge.registry());
        console::print_help();
        Some(console::spawn_repl()?)
    };

    let events = bridge.event_sender();
    let mut hass_config = config.hass;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(command) = next_command(&mut console_rx) => {
                debug!("Console command: {:?}", command);
                match command {
                    ConsoleCommand::List => console::print_controls(bridge.registry()),
                    ConsoleCommand::Help => console::print_help(),
                    ConsoleCommand::Poll => {
                        let outcome = bridge.poll_now().await;
                        info!("Poll: {:?}", outcome);
                    }
                    ConsoleCommand::Gesture(event) => {
                        if events.send(event).is_err() {
                            warn!("Gesture dispatcher is gone");
                        }
                    }
                    ConsoleCommand::Quit => {
                        info!("Console closed, stopping");
                        break;
                    }
                }
            }

            Some(new_config) = config_watcher.next_config() => {
                info!("📝 Configuration file changed, applying...");

                if args.poll_interval.is_none()
                    && new_config.hass.poll_interval_secs != hass_config.poll_interval_secs
                {
                    bridge.set_poll_interval(new_config.hass.poll_interval_secs).await;
                }
                if new_config.hass.connection_changed(&hass_config) {
                    warn!("⚠️  Home Assistant connection settings changed, restart to apply them");
                }
                if new_config.bridge != config.bridge {
                    warn!("⚠️  Bridge tuning changed, restart to apply it");
                }
                hass_config = new_config.hass;
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping");
                break;
            }
        }
    }

    info!("Shutting down...");
    bridge.shutdown().await;
    Ok(())
}

async fn next_command(rx: &mut Option<mpsc::UnboundedReceiver<ConsoleCommand>>) -> Option<ConsoleCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Display sink for headless runs
fn log_display() -> DisplayCallback {
    Arc::new(|update: &DisplayUpdate| match update {
        DisplayUpdate::Muted { id, muted } => info!("🎚  {} muted={}", id, muted),
        DisplayUpdate::Volume { id, volume } => info!("🎚  {} volume={:.2}", id, volume),
        DisplayUpdate::Active { id, active } => info!("🔘 {} active={}", id, active),
    })
}

/// Install the tracing subscriber
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(
    level: &str,
    logging: Option<&LoggingConfig>,
    paths: &AppPaths,
) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let mut guard = None;
    let mut file_layer: Option<Box<dyn Layer<Registry> + Send + Sync>> = None;

    if let Some(LoggingConfig { file: Some(file), json }) = logging {
        paths.ensure_logs_dir()?;
        let appender = tracing_appender::rolling::daily(&paths.logs_dir, file);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        file_layer = Some(if *json { layer.json().boxed() } else { layer.boxed() });
    }

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(filter)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
