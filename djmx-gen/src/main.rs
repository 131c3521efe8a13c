//! djmx-gen - DJ experience generation service
//!
//! Accepts listener preferences, drives the script/speech/music pipeline and
//! serves progress over HTTP polling and SSE.

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

use djmx_gen::catalog::SpotifyCatalog;
use djmx_gen::clients::{MiniMaxMusicClient, MiniMaxScriptClient, MiniMaxSpeechClient};
use djmx_gen::config::TomlConfig;
use djmx_gen::pipeline::{GenerationPipeline, PipelineClients};
use djmx_gen::store::ExperienceStore;
use djmx_gen::AppState;

/// Command-line arguments for djmx-gen
#[derive(Parser, Debug)]
#[command(name = "djmx-gen")]
#[command(about = "DJ experience generation service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "DJMX_GEN_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(long, env = "DJMX_GEN_BIND")]
    bind: Option<String>,

    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
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
                format!("djmx_gen={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting djmx-gen v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let minimax = config.minimax_config();
    let clients = PipelineClients {
        script: Arc::new(
            MiniMaxScriptClient::new(minimax.clone()).context("Failed to build script client")?,
        ),
        speech: Arc::new(
            MiniMaxSpeechClient::new(minimax.clone()).context("Failed to build speech client")?,
        ),
        music: Arc::new(
            MiniMaxMusicClient::new(minimax).context("Failed to build music client")?,
        ),
    };

    let catalog = match config.catalog_config() {
        Some(catalog_config) => Some(Arc::new(
            SpotifyCatalog::new(catalog_config).context("Failed to build catalog client")?,
        )),
        None => None,
    };

    let store = match config.store_ttl() {
        Some(ttl) => ExperienceStore::with_ttl(ttl),
        None => ExperienceStore::new(),
    };

    let shutdown = CancellationToken::new();
    let sweeper = store.spawn_eviction_task(config.sweep_interval(), shutdown.clone());

    let event_bus = EventBus::new(100);
    let pipeline = GenerationPipeline::new(store, clients, config.pipeline_config(), event_bus.clone());
    let state = AppState::new(pipeline, catalog, event_bus);
    let app = djmx_gen::build_router(state);

    let port = args.port.unwrap_or(config.port);
    let bind = args.bind.unwrap_or(config.bind_address);
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
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }

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
