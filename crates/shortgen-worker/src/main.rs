//! Video generation worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shortgen_pipeline::{mock::mock_collaborators, PipelineRunner};
use shortgen_queue::JobQueue;
use shortgen_store::MemoryVideoStore;
use shortgen_worker::{JobExecutor, Reaper, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("shortgen=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting shortgen-worker");

    // Expose Prometheus metrics when an address is configured
    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse::<std::net::SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
                    .with_http_listener(addr)
                    .install()
                {
                    warn!("Failed to install metrics exporter: {}", e);
                }
            }
            Err(e) => warn!("Invalid METRICS_ADDR '{}': {}", addr, e),
        }
    }

    // Load configuration
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Create queue client
    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    // Composition root. This binary runs against the in-memory store and
    // the deterministic mock providers; real provider wiring replaces these
    // two lines.
    let store = Arc::new(MemoryVideoStore::new());
    let runner = PipelineRunner::new(store.clone(), mock_collaborators());
    info!("Using in-memory store and mock providers");

    let executor = Arc::new(JobExecutor::new(config.clone(), queue, store.clone(), runner));

    // Background reaper shares the executor's shutdown signal via its own
    // channel so both stop on ctrl-c.
    let (reaper_shutdown_tx, reaper_shutdown_rx) = tokio::sync::watch::channel(false);
    let reaper_queue = match JobQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create reaper queue client: {}", e);
            std::process::exit(1);
        }
    };
    let reaper = Reaper::new(store, reaper_queue, &config);
    let reaper_task = tokio::spawn(async move {
        reaper.run(reaper_shutdown_rx).await;
    });

    // Signal handler triggers graceful shutdown
    let executor_for_signal = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        executor_for_signal.shutdown();
        let _ = reaper_shutdown_tx.send(true);
    });

    // Run executor
    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    reaper_task.abort();
    info!("Worker shutdown complete");
}
