#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use orderflow_api::jobs::{IngestConfig, IngestMetrics, IngestSnapshot, InMemorySource};
use orderflow_api::{create_api_router, AppState, HttpConfig, IngestWorker, MessageSource};
use orderflow_storage::{InMemoryOrderCache, InMemoryOrderRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Upper bound for any wait on the worker in tests.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// In-memory wiring of the whole service: store, cache, broker, router.
pub struct Harness {
    pub repo: Arc<InMemoryOrderRepository>,
    pub cache: Arc<InMemoryOrderCache>,
    pub source: Arc<InMemorySource>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let cache = Arc::new(InMemoryOrderCache::new());
        let state = AppState::new(repo.clone(), cache.clone());
        Self {
            repo,
            cache,
            source: Arc::new(InMemorySource::new("orders")),
            state,
        }
    }

    pub fn router(&self) -> Router {
        create_api_router(self.state.clone(), &HttpConfig::default())
    }

    /// Start an ingestion worker with millisecond back-offs.
    pub fn spawn_worker(&self) -> RunningWorker {
        self.spawn_worker_on(self.source.clone())
    }

    /// Same as `spawn_worker`, reading from `source` instead of the harness broker.
    pub fn spawn_worker_on(&self, source: Arc<dyn MessageSource>) -> RunningWorker {
        let config = IngestConfig {
            fetch_error_backoff: Duration::from_millis(10),
            retry_backoff_initial: Duration::from_millis(10),
            retry_backoff_max: Duration::from_millis(40),
        };
        let worker =
            IngestWorker::with_config(source, self.state.save_order.clone(), config);
        let metrics = worker.metrics();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));
        RunningWorker {
            shutdown_tx,
            handle,
            metrics,
        }
    }

    pub async fn publish(&self, key: &str, payload: &[u8]) -> i64 {
        self.source.publish(Some(key), payload).await
    }
}

pub struct RunningWorker {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<IngestSnapshot>,
    metrics: Arc<IngestMetrics>,
}

impl RunningWorker {
    pub fn snapshot(&self) -> IngestSnapshot {
        self.metrics.snapshot()
    }

    /// Wait until `predicate` holds for the worker's counters.
    pub async fn wait_until(&self, predicate: impl Fn(&IngestSnapshot) -> bool) {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        loop {
            let snapshot = self.metrics.snapshot();
            if predicate(&snapshot) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("worker did not reach the expected state: {:?}", snapshot);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn wait_committed(&self, count: u64) {
        self.wait_until(|s| s.committed() >= count).await;
    }

    pub async fn stop(self) -> IngestSnapshot {
        self.shutdown_tx.send(true).expect("worker dropped its receiver");
        tokio::time::timeout(WAIT_LIMIT, self.handle)
            .await
            .expect("worker did not stop")
            .expect("worker panicked")
    }
}
