//! Storybook server binary
//!
//! Runs the background task queue and serves the task API.

use anyhow::Context;
use clap::Parser;
use genai::DefaultPromptBuilder;
use orchestrator::api::create_router;
use orchestrator::config::ServerConfig;
use orchestrator::{ExecutionEngine, ExecutorRegistry, InMemoryTaskStore, TaskQueue, TaskStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use utils::ResilientClient;

#[derive(Parser)]
#[command(name = "storybook-server")]
#[command(about = "Background generation tasks for the storybook UI", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to storybook-server.toml
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Listen host, overrides config and HOST
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides config and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("Server name: {}", config.server.name);
    tracing::info!(
        "Task retention: {}s, sweep every {}s, concurrency limit: {:?}",
        config.queue.retention_secs,
        config.queue.sweep_interval_secs,
        config.queue.max_concurrent_tasks
    );

    let client = Arc::new(
        ResilientClient::reqwest(config.http.retry_policy(), config.http.user_agent.as_deref())
            .context("Failed to build HTTP client")?,
    );

    let store: Arc<dyn TaskStore> =
        Arc::new(InMemoryTaskStore::new().with_retention(config.queue.retention()));
    let registry = Arc::new(ExecutorRegistry::builtin(Arc::new(DefaultPromptBuilder::new())));
    tracing::info!("Registered task types: {:?}", registry.task_types());

    let mut engine = ExecutionEngine::new(store.clone(), registry, client);
    if let Some(limit) = config.queue.max_concurrent_tasks {
        engine = engine.with_max_concurrent_tasks(limit);
    }
    let queue = TaskQueue::new(store, Arc::new(engine));

    let shutdown = CancellationToken::new();
    let sweeper = queue.spawn_sweeper(config.queue.sweep_interval(), shutdown.clone());

    tracing::info!("Building API router");
    let app = create_router(queue);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Starting storybook server on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    sweeper.await.ok();

    tracing::info!("Storybook server shut down gracefully");
    Ok(())
}

/// Signal for graceful shutdown (Ctrl-C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received CTRL-C signal, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down");
        }
    }
}
