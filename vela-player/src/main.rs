//! Vela player (vela-player) - Main entry point
//!
//! Loads settings, starts the base layer and wires inputs, the AGD processor,
//! the player manager and the HTTP API through one event bus.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use vela_common::config::{resolve_settings_path, NetworkInputConfig, Settings};
use vela_common::events::EventBus;
use vela_player::agd::{AgdProcessor, SharedThresholds, ThresholdTable};
use vela_player::api::{self, AppContext};
use vela_player::inputs::NetworkInput;
use vela_player::logging;
use vela_player::playback::{MediaLibrary, OmxConfig, OmxSupervisor, PlayerManager};

/// Bus capacity before slow subscribers start lagging
const EVENT_BUS_CAPACITY: usize = 1024;

/// Command-line arguments for vela-player
#[derive(Parser, Debug)]
#[command(name = "vela-player")]
#[command(about = "Sensor driven layered media player")]
#[command(version)]
struct Args {
    /// Settings file (defaults to ~/.config/vela/settings.toml, then /etc/vela/settings.toml)
    #[arg(short, long, env = "VELA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP API port
    #[arg(long, env = "VELA_API_PORT")]
    api_port: Option<u16>,

    /// Override the network input port (enables the input when not configured)
    #[arg(long, env = "VELA_NETWORK_PORT")]
    network_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings_path = resolve_settings_path(args.config.as_deref())?;
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {:?}", settings_path))?;
    apply_overrides(&mut settings, &args);

    let log_control = logging::init(&settings.logging).context("Failed to initialize logging")?;

    info!("Starting Vela player");
    info!("Settings: {:?}", settings_path);
    info!("Foreground levels: {}", settings.foreground_levels());

    let bus = EventBus::new(EVENT_BUS_CAPACITY);
    let thresholds = SharedThresholds::new(ThresholdTable::new(settings.agd.thresholds.clone()));

    let processor = AgdProcessor::new(
        settings.agd.source.clone(),
        settings.agd.buffer_size,
        thresholds.clone(),
        bus.clone(),
    )?;
    tokio::spawn(processor.run(bus.subscribe()));

    let media = MediaLibrary::discover(&settings.levels);
    let supervisor = OmxSupervisor::new(OmxConfig::from(&settings.environment));
    let mut manager = PlayerManager::new(supervisor, media, settings.levels.clone(), bus.clone());
    manager.start().await.context("Failed to start base layer")?;
    let player = manager.spawn();

    if let Some(network) = settings.inputs.network.clone() {
        let input = NetworkInput::new(network, bus.clone());
        let listener = input.bind().await?;
        tokio::spawn(input.serve(listener));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = if settings.api.enabled {
        let ctx = AppContext {
            bus: bus.clone(),
            thresholds: thresholds.clone(),
            player_state: player.subscribe_state(),
            agd_source: settings.agd.source.clone(),
            log_control: Some(log_control),
        };
        let config = settings.api.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = api::serve(&config, ctx, shutdown).await {
                error!("HTTP API failed: {}", e);
            }
        }))
    } else {
        info!("HTTP API disabled");
        None
    };

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = player.done() => {
            info!("Player manager finished");
        }
    }

    player.stop().await;
    shutdown_tx.send_replace(true);
    if let Some(server) = server {
        let _ = server.await;
    }

    info!("Shutdown complete");
    Ok(())
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(port) = args.api_port {
        settings.api.port = port;
    }
    if let Some(port) = args.network_port {
        settings
            .inputs
            .network
            .get_or_insert_with(NetworkInputConfig::default)
            .port = port;
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
