//! orderflow Server Entry Point
//!
//! Boot order: config, tracing, Postgres (ping + migrations), Redis, then the
//! cache warm-up, the ingestion worker and the HTTP server run side by side.
//! Any failure before the server starts exits non-zero.
//!
//! Shutdown order: drain HTTP, stop the worker, close the cache, close the
//! pool. Each step is bounded by `SHUTDOWN_TIMEOUT` where it can block and
//! logs its completion.

use std::sync::Arc;
use std::time::Duration;

use orderflow_api::telemetry::{init_tracing, TelemetryConfig};
use orderflow_api::{
    create_api_router, run_migrations, shutdown, AppConfig, AppState, BootError, BootResult,
    IngestWorker, KafkaSource, PgOrderRepository, RedisOrderCache,
};
use orderflow_storage::{OrderCache, OrderRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> BootResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = AppConfig::from_env().map_err(|e| boot_error(BootError::from(e)))?;

    // ------------------------------------------------------------------
    // Store
    // ------------------------------------------------------------------
    let repo = PgOrderRepository::from_config(&config.db)
        .map_err(|e| boot_error(BootError::store("Failed to create Postgres pool", e)))?;
    repo.ping()
        .await
        .map_err(|e| boot_error(BootError::store("Postgres unreachable", e)))?;
    let applied = run_migrations(repo.pool())
        .await
        .map_err(|e| boot_error(BootError::store("Migrations failed", e)))?;
    tracing::info!(
        host = %config.db.host,
        dbname = %config.db.dbname,
        migrations_applied = applied.len(),
        "Connected to Postgres"
    );

    // ------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------
    let cache = RedisOrderCache::connect(&config.cache)
        .await
        .map_err(|e| boot_error(BootError::from(e)))?;
    let cache: Arc<dyn OrderCache> = Arc::new(cache);
    let repo = Arc::new(repo);

    let state = AppState::new(repo.clone(), cache.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------
    let warmer = state.cache_warmer();
    let warm_rx = shutdown_rx.clone();
    let warm_handle = tokio::spawn(async move {
        tokio::select! {
            result = warmer.execute() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Cache warm-up failed; serving with a cold cache");
                }
            }
            _ = shutdown::requested(warm_rx) => {
                tracing::info!("Cache warm-up cancelled");
            }
        }
    });

    let source = KafkaSource::new(&config.kafka)
        .map_err(|e| boot_error(BootError::from(e)))?;
    let worker = IngestWorker::new(Arc::new(source), state.save_order.clone());
    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    // ------------------------------------------------------------------
    // HTTP server
    // ------------------------------------------------------------------
    let app = create_api_router(state, &config.http);
    let addr = config.http.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| boot_error(BootError::Bind { addr, source }))?;
    tracing::info!(%addr, "Starting orderflow HTTP server");

    let server_rx = shutdown_rx.clone();
    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::requested(server_rx))
            .await
    });

    let server_exited = tokio::select! {
        result = shutdown::listen() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            None
        }
        result = &mut server => Some(result),
    };
    let _ = shutdown_tx.send(true);

    // 1. Drain HTTP
    let grace = config.http.shutdown_timeout;
    let server_result = match server_exited {
        Some(result) => Some(result),
        None => match tokio::time::timeout(grace, &mut server).await {
            Ok(result) => Some(result),
            Err(_) => {
                server.abort();
                None
            }
        },
    };
    match server_result {
        Some(Ok(Ok(()))) => tracing::info!("HTTP server drained"),
        Some(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server failed"),
        Some(Err(e)) => tracing::error!(error = %e, "HTTP server task panicked"),
        None => tracing::error!(grace_secs = grace.as_secs(), "HTTP drain timed out"),
    }

    // 2. Stop ingestion and warm-up
    join_bounded(worker_handle, grace, "Ingestion worker").await;
    join_bounded(warm_handle, Duration::from_secs(1), "Cache warm-up").await;

    // 3. Cache, then 4. store
    cache.close().await;
    repo.close();
    tracing::info!("Postgres pool closed");

    tracing::info!("Shutdown complete");
    Ok(())
}

fn boot_error(err: BootError) -> BootError {
    tracing::error!(error = %err, "Startup failed");
    err
}

/// Wait for a task up to `limit`, aborting it if it overruns.
async fn join_bounded<T>(mut handle: JoinHandle<T>, limit: Duration, name: &str) {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(_)) => tracing::info!(task = name, "Task stopped"),
        Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task failed"),
        Err(_) => {
            handle.abort();
            tracing::error!(task = name, limit_secs = limit.as_secs(), "Task did not stop in time");
        }
    }
}
