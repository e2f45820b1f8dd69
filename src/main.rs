use anyhow::{Context, Result};
use std::sync::Arc;
use swinglog::api::{start_api_server, AppState};
use swinglog::config::Config;
use swinglog::ingest::IngestionHandler;
use swinglog::parser::EntryParser;
use swinglog::watcher::FileWatcher;
use swinglog::worker::{PersistenceWorker, WorkItem};
use tokio::signal;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        mode = ?config.source.mode,
        path = %config.source.log_file_path,
        "Starting swinglog"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Connect the shot store and bootstrap its schema
    let store = swinglog::store::connect(&config.storage)
        .await
        .context("Failed to initialize shot store")?;

    // Ingestion queue: single producer, single consumer, shutdown sentinel
    let (tx, rx) = mpsc::channel::<WorkItem>(config.queue.capacity);

    // All store writes are serialized behind this lock; the query surface
    // shares the store concurrently on the read side.
    let write_lock = Arc::new(Mutex::new(()));

    let worker = PersistenceWorker::new(rx, store.clone(), write_lock);
    let worker_handle = tokio::spawn(worker.run());

    // Watcher task: poll the monitored file, feed the ingestion handler
    let parser = EntryParser::from_config(&config.source);
    let handler = Arc::new(IngestionHandler::new(parser, store.clone(), tx.clone()));
    let (watcher_shutdown_tx, watcher_shutdown_rx) = broadcast::channel(1);
    let watcher = FileWatcher::new(
        config.source.log_file_path.clone(),
        config.poll_interval(),
        handler,
    );
    let watcher_handle = tokio::spawn(watcher.run(watcher_shutdown_rx));

    // API server task
    let api_state = AppState {
        store: store.clone(),
    };
    let api_config = config.api.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(api_state, &api_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("Swinglog started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down swinglog");

    // Stop producing, then drain: the sentinel guarantees every queued
    // record is attempted before the worker terminates.
    let _ = watcher_shutdown_tx.send(());
    if let Err(e) = watcher_handle.await {
        warn!(error = %e, "File watcher task did not exit cleanly");
    }

    if tx.send(WorkItem::Shutdown).await.is_err() {
        warn!("Persistence queue already closed at shutdown");
    }
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "Persistence worker task did not exit cleanly");
    }

    api_handle.abort();

    info!("Swinglog stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
