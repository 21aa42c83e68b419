//! Ingestion Worker
//!
//! Drains the order topic into the save use case and decides, per record,
//! whether to commit the offset or see the record again.
//!
//! Commit policy:
//!
//! - saved, duplicate: commit
//! - invalid or undecodable (poison): commit, log the payload
//! - rejected by the store for good (e.g. a column overflow): commit as poison
//! - retryable store or cache failure: rewind to the same offset, back off,
//!   fetch it again. If the rewind itself fails, the worker keeps the record
//!   it holds and retries it in place; it never fetches past an uncommitted
//!   record.
//!
//! Together with `order_uid` as the idempotency key and the store's unique
//! key, this gives exactly-once effective writes over at-least-once delivery.
//!
//! Shutdown is only observed while waiting for a record or backing off. A
//! record already fetched always reaches its commit-or-rewind decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use orderflow_core::{Order, OrderError, OrderResult};
use tokio::sync::watch;

use super::source::{IncomingMessage, MessageSource};
use crate::constants::{FETCH_ERROR_BACKOFF, RETRY_BACKOFF_INITIAL, RETRY_BACKOFF_MAX};
use crate::services::{SaveOrderService, SaveOutcome};
use crate::telemetry::with_metrics;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Pause after a failed fetch (default: 1 second)
    pub fetch_error_backoff: Duration,
    /// First pause before refetching a retryable record (default: 500ms)
    pub retry_backoff_initial: Duration,
    /// Cap for the doubling retry pause (default: 30 seconds)
    pub retry_backoff_max: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_error_backoff: FETCH_ERROR_BACKOFF,
            retry_backoff_initial: RETRY_BACKOFF_INITIAL,
            retry_backoff_max: RETRY_BACKOFF_MAX,
        }
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Why a record was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Saved,
    Duplicate,
    Invalid,
    Poison,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Saved => "saved",
            Outcome::Duplicate => "duplicate",
            Outcome::Invalid => "invalid",
            Outcome::Poison => "poison",
        }
    }
}

/// What to do with a processed record's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Commit(Outcome),
    Retry,
}

/// Map a save result onto the commit policy.
pub fn classify(result: &OrderResult<SaveOutcome>) -> Disposition {
    match result {
        Ok(_) => Disposition::Commit(Outcome::Saved),
        Err(OrderError::DuplicateOrder { .. }) => Disposition::Commit(Outcome::Duplicate),
        Err(OrderError::InvalidOrder(_)) => Disposition::Commit(Outcome::Invalid),
        Err(e) if e.is_retryable() => Disposition::Retry,
        Err(_) => Disposition::Commit(Outcome::Poison),
    }
}

// ============================================================================
// BACK-OFF
// ============================================================================

/// Doubling delay, capped, reset after every committed record.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl RetryBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the worker's lifetime.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    pub saved: AtomicU64,
    pub duplicate: AtomicU64,
    pub invalid: AtomicU64,
    pub poison: AtomicU64,
    /// Records rewound for another attempt
    pub retried: AtomicU64,
    pub fetch_errors: AtomicU64,
    pub commit_errors: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, disposition: Disposition) {
        let (counter, label) = match disposition {
            Disposition::Commit(outcome) => {
                let counter = match outcome {
                    Outcome::Saved => &self.saved,
                    Outcome::Duplicate => &self.duplicate,
                    Outcome::Invalid => &self.invalid,
                    Outcome::Poison => &self.poison,
                };
                (counter, outcome.as_str())
            }
            Disposition::Retry => (&self.retried, "retry"),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        with_metrics(|m| m.record_ingest(label));
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            saved: self.saved.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            poison: self.poison.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            commit_errors: self.commit_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub saved: u64,
    pub duplicate: u64,
    pub invalid: u64,
    pub poison: u64,
    pub retried: u64,
    pub fetch_errors: u64,
    pub commit_errors: u64,
}

impl IngestSnapshot {
    /// Records committed, whatever the outcome.
    pub fn committed(&self) -> u64 {
        self.saved + self.duplicate + self.invalid + self.poison
    }
}

// ============================================================================
// WORKER
// ============================================================================

pub struct IngestWorker {
    source: Arc<dyn MessageSource>,
    save: SaveOrderService,
    config: IngestConfig,
    metrics: Arc<IngestMetrics>,
}

impl IngestWorker {
    pub fn new(source: Arc<dyn MessageSource>, save: SaveOrderService) -> Self {
        Self::with_config(source, save, IngestConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn MessageSource>,
        save: SaveOrderService,
        config: IngestConfig,
    ) -> Self {
        Self {
            source,
            save,
            config,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Shared handle to the worker's counters.
    pub fn metrics(&self) -> Arc<IngestMetrics> {
        self.metrics.clone()
    }

    /// Consume until `shutdown_rx` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> IngestSnapshot {
        let mut backoff =
            RetryBackoff::new(self.config.retry_backoff_initial, self.config.retry_backoff_max);

        tracing::info!("Ingestion worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let fetched = tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
                fetched = self.source.fetch() => fetched,
            };

            let message = match fetched {
                Ok(message) => message,
                Err(e) => {
                    self.metrics.fetch_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(error = %e, "Failed to fetch message");
                    if pause(self.config.fetch_error_backoff, &mut shutdown_rx).await {
                        break;
                    }
                    continue;
                }
            };

            let disposition = self.process(&message).await;
            self.metrics.record(disposition);

            if disposition == Disposition::Retry {
                match self.source.rewind(&message).await {
                    Ok(()) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            partition = message.partition,
                            offset = message.offset,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying message after back-off"
                        );
                        if pause(delay, &mut shutdown_rx).await {
                            break;
                        }
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(
                            partition = message.partition,
                            offset = message.offset,
                            error = %e,
                            "Failed to rewind; retrying held message in place"
                        );
                        // Uncommitted on shutdown: a restarted consumer resumes
                        // from the last committed offset and sees it again.
                        if self
                            .retry_in_place(&message, &mut backoff, &mut shutdown_rx)
                            .await
                            .is_none()
                        {
                            break;
                        }
                    }
                }
            }

            backoff.reset();
            if let Err(e) = self.source.commit(&message).await {
                self.metrics.commit_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "Failed to commit offset");
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            saved = snapshot.saved,
            duplicate = snapshot.duplicate,
            invalid = snapshot.invalid,
            poison = snapshot.poison,
            retried = snapshot.retried,
            fetch_errors = snapshot.fetch_errors,
            "Ingestion worker stopped"
        );
        snapshot
    }

    /// Re-process `message` with back-off until it can be committed.
    ///
    /// Returns `None` if shutdown was requested first.
    async fn retry_in_place(
        &self,
        message: &IncomingMessage,
        backoff: &mut RetryBackoff,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Option<Outcome> {
        loop {
            let delay = backoff.next_delay();
            tracing::warn!(
                partition = message.partition,
                offset = message.offset,
                delay_ms = delay.as_millis() as u64,
                "Retrying held message after back-off"
            );
            if pause(delay, shutdown_rx).await {
                return None;
            }

            let disposition = self.process(message).await;
            self.metrics.record(disposition);
            if let Disposition::Commit(outcome) = disposition {
                return Some(outcome);
            }
        }
    }

    /// Decode and save one record, returning what to do with its offset.
    async fn process(&self, message: &IncomingMessage) -> Disposition {
        let order = match Order::from_json(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    partition = message.partition,
                    offset = message.offset,
                    key = ?message.key_str(),
                    payload = %String::from_utf8_lossy(&message.payload),
                    error = %e,
                    "Undecodable message; committing as poison"
                );
                return Disposition::Commit(Outcome::Poison);
            }
        };

        let result = self.save.execute(&order).await;
        let disposition = classify(&result);

        if let Err(e) = &result {
            match disposition {
                Disposition::Commit(Outcome::Duplicate) => {
                    tracing::info!(order_uid = %order.order_uid, offset = message.offset, "Duplicate order; committing");
                }
                Disposition::Commit(Outcome::Invalid) => {
                    tracing::warn!(
                        order_uid = %order.order_uid,
                        offset = message.offset,
                        error = %e,
                        "Invalid order; committing as poison"
                    );
                }
                Disposition::Commit(_) => {
                    tracing::error!(
                        order_uid = %order.order_uid,
                        offset = message.offset,
                        error = %e,
                        "Order rejected by store; committing as poison"
                    );
                }
                Disposition::Retry => {
                    tracing::warn!(
                        order_uid = %order.order_uid,
                        offset = message.offset,
                        error = %e,
                        "Retryable failure; offset not committed"
                    );
                }
            }
        }

        disposition
    }
}

/// Sleep for `delay`. Returns true if shutdown was requested meanwhile.
async fn pause(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown_rx.wait_for(|stop| *stop) => true,
    }
}
