//! Servitrack hub — tracking server binary
//!
//! Runs the two listening surfaces under one supervisor:
//! the channel TCP listener (drivers and observers) and the REST API
//! (dispatch glue and diagnostics).
//!
//! # Usage
//!
//! ```bash
//! # Run with built-in defaults
//! cargo run --release
//!
//! # Run with a config file and overridden bind addresses
//! cargo run --release -- --config servitrack.toml --api-addr 0.0.0.0:8081
//! ```
//!
//! # Environment Variables
//!
//! - `SERVITRACK_CONFIG`: Path to TOML config file
//! - `SERVITRACK_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use servitrack::api::{create_app, HubApiState};
use servitrack::hub::{run_channel_server, ServiceDirectory, SessionRegistry};
use servitrack::TrackerConfig;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "servitrack", about = "Servitrack — realtime service tracking hub")]
struct CliArgs {
    /// Path to a TOML config file (overrides the default search order)
    #[arg(long, env = "SERVITRACK_CONFIG")]
    config: Option<String>,

    /// Override the REST API bind address (default: "0.0.0.0:8080")
    #[arg(long)]
    api_addr: Option<String>,

    /// Override the channel listener bind address (default: "0.0.0.0:9400")
    #[arg(long)]
    channel_addr: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ChannelServer,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ChannelServer => write!(f, "ChannelServer"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => TrackerConfig::load_from_file(std::path::Path::new(path))
            .with_context(|| format!("failed to load config from {path}"))?,
        None => TrackerConfig::load(),
    };
    if let Some(addr) = args.api_addr {
        config.server.api_addr = addr;
    }
    if let Some(addr) = args.channel_addr {
        config.server.channel_addr = addr;
    }

    info!(
        api = %config.server.api_addr,
        channel = %config.server.channel_addr,
        "Starting Servitrack hub"
    );

    let registry = SessionRegistry::new();
    let directory = ServiceDirectory::new();

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Channel listener
    let channel_listener = tokio::net::TcpListener::bind(&config.server.channel_addr)
        .await
        .with_context(|| format!("failed to bind channel listener on {}", config.server.channel_addr))?;
    {
        let registry = registry.clone();
        let directory = directory.clone();
        let settings = config.hub.clone();
        let cancel = cancel_token.clone();
        task_set.spawn(async move {
            info!("[ChannelServer] Task starting");
            run_channel_server(channel_listener, registry, directory, settings, cancel)
                .await
                .context("channel server error")?;
            Ok(TaskName::ChannelServer)
        });
    }

    // REST API
    let api_listener = tokio::net::TcpListener::bind(&config.server.api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", config.server.api_addr))?;
    let app = create_app(HubApiState::new(registry, directory));
    {
        let cancel = cancel_token.clone();
        task_set.spawn(async move {
            info!("[HttpServer] Task starting");
            axum::serve(api_listener, app)
                .with_graceful_shutdown(async move {
                    cancel.cancelled().await;
                    info!("[HttpServer] Received shutdown signal");
                })
                .await
                .context("HTTP server error")?;
            info!("[HttpServer] Graceful shutdown complete");
            Ok(TaskName::HttpServer)
        });
    }

    run_supervisor(&mut task_set, cancel_token).await
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Give the remaining tasks a moment to wind down.
    while task_set.join_next().await.is_some() {}
    Ok(())
}
