//! djmx-ap - DJ radio player
//!
//! Plays the queue locally with crossfades, or drives a remote device when
//! one is connected, and injects generated DJ segments after a few plays.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use djmx_common::config::{load_toml, resolve_config_path};
use djmx_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use djmx_ap::audio::{AudioOutput, LocalVoiceFactory, Mixer, TARGET_SAMPLE_RATE};
use djmx_ap::config::TomlConfig;
use djmx_ap::controller::PlayerController;
use djmx_ap::injector::DjInjector;
use djmx_ap::playback::PlaybackEngine;
use djmx_ap::remote::{RemotePlaybackAdapter, TokenStore};
use djmx_ap::AppState;

/// Command-line arguments for djmx-ap
#[derive(Parser, Debug)]
#[command(name = "djmx-ap")]
#[command(about = "DJ radio player with crossfading playback")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "DJMX_AP_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(long, env = "DJMX_AP_BIND")]
    bind: Option<String>,

    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio output device name
    #[arg(long, env = "DJMX_AP_DEVICE")]
    device: Option<String>,

    /// Print available output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config: TomlConfig =
        load_toml(config_path.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("djmx_ap={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        for name in AudioOutput::list_devices().context("Failed to enumerate devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    info!("Starting djmx-ap v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let event_bus = EventBus::new(100);
    let shutdown = CancellationToken::new();

    // Local backend
    let mixer = Arc::new(Mixer::new());
    let output = if config.player.null_output {
        info!("Audio output disabled; rendering to null sink");
        AudioOutput::null(Arc::clone(&mixer), TARGET_SAMPLE_RATE)
    } else {
        AudioOutput::open_or_null(
            Arc::clone(&mixer),
            args.device.or_else(|| config.player.audio_device.clone()),
        )
    };
    info!(
        "Audio output: {} @ {} Hz",
        output.device_name(),
        output.sample_rate()
    );

    let factory = Arc::new(LocalVoiceFactory::new(
        http.clone(),
        Arc::clone(&mixer),
        output.sample_rate(),
    ));
    let engine = PlaybackEngine::new(factory, config.engine_config(), event_bus.clone());
    let driver = engine.spawn_driver();

    // Remote backend
    let tokens = Arc::new(TokenStore::new(http.clone(), config.refresh_credentials()));
    let remote = Arc::new(RemotePlaybackAdapter::new(
        http.clone(),
        config.remote.api_base.clone(),
        tokens.clone(),
    ));
    let ticker = remote.spawn_position_ticker(shutdown.clone());

    // DJ injection
    let injector = Arc::new(
        DjInjector::new(
            config.generation_service(http),
            config.injection.threshold,
            config.injection.mode,
        )
        .with_taste(config.injection.genres.clone(), config.injection.mood.clone()),
    );
    info!(
        threshold = config.injection.threshold,
        mode = config.injection.mode.as_str(),
        "DJ injection armed"
    );

    let controller = Arc::new(PlayerController::new(
        engine.clone(),
        remote,
        tokens,
        injector,
        event_bus.clone(),
    ));
    let listener_task = controller.spawn_auto_advance_listener(shutdown.clone());

    let state = AppState::new(controller, event_bus, output.device_name());
    let app = djmx_ap::build_router(state);

    let port = args.port.unwrap_or(config.player.port);
    let bind = args.bind.unwrap_or(config.player.bind_address);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    engine.shutdown().await;
    let _ = driver.await;
    let _ = ticker.await;
    let _ = listener_task.await;
    drop(output);

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
