//! Cache Warmer
//!
//! Loads every stored order into the cache at boot so the first lookups after
//! a restart are served without touching the store.

use std::sync::Arc;

use orderflow_core::{OrderError, OrderResult};
use orderflow_storage::{OrderCache, OrderRepository};

use crate::telemetry::with_metrics;

/// Counts from one warm-up run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmReport {
    pub success_count: usize,
    pub total_count: usize,
}

#[derive(Clone)]
pub struct CacheWarmer {
    repo: Arc<dyn OrderRepository>,
    cache: Arc<dyn OrderCache>,
}

impl CacheWarmer {
    pub fn new(repo: Arc<dyn OrderRepository>, cache: Arc<dyn OrderCache>) -> Self {
        Self { repo, cache }
    }

    /// Copy every stored order into the cache.
    ///
    /// A failed `set` is logged and skipped. Only a failure to read the store
    /// is an error, and callers treat that as non-fatal.
    pub async fn execute(&self) -> OrderResult<WarmReport> {
        let orders = self.repo.get_all().await.map_err(OrderError::from)?;
        let total_count = orders.len();

        let mut success_count = 0;
        for order in &orders {
            match self.cache.set(&order.order_uid, order).await {
                Ok(()) => success_count += 1,
                Err(e) => {
                    tracing::warn!(order_uid = %order.order_uid, error = %e, "Failed to warm order");
                }
            }
        }

        with_metrics(|m| m.set_warmed_orders(success_count));
        tracing::info!(success_count, total_count, "Cache warmed");
        Ok(WarmReport {
            success_count,
            total_count,
        })
    }
}
