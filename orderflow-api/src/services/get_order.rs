//! Get Order Service
//!
//! Read-through lookup: cache first, store on a miss, then refill.

use std::sync::Arc;

use orderflow_core::{CacheError, Order, OrderResult};
use orderflow_storage::{OrderCache, OrderRepository};

use crate::telemetry::with_metrics;

#[derive(Clone)]
pub struct GetOrderService {
    repo: Arc<dyn OrderRepository>,
    cache: Arc<dyn OrderCache>,
}

impl GetOrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, cache: Arc<dyn OrderCache>) -> Self {
        Self { repo, cache }
    }

    /// Look up one order.
    ///
    /// Cache failures and corrupt entries count as misses. A failed refill is
    /// logged and the order is still returned.
    ///
    /// # Errors
    /// - `NotFound` when the store has no such UID
    /// - `Store` for any other repository failure
    pub async fn execute(&self, order_uid: &str) -> OrderResult<Order> {
        match self.cache.get(order_uid).await {
            Ok(Some(order)) => {
                with_metrics(|m| m.record_cache_lookup("hit"));
                tracing::debug!(order_uid, "Cache hit");
                return Ok(order);
            }
            Ok(None) => {
                with_metrics(|m| m.record_cache_lookup("miss"));
            }
            Err(CacheError::Corrupt { reason, .. }) => {
                with_metrics(|m| m.record_cache_lookup("error"));
                tracing::warn!(order_uid, reason = %reason, "Corrupt cache entry; reading store");
            }
            Err(e) => {
                with_metrics(|m| m.record_cache_lookup("error"));
                tracing::warn!(order_uid, error = %e, "Cache lookup failed; reading store");
            }
        }

        let order = self.repo.get_by_uid(order_uid).await?;

        if let Err(e) = self.cache.set(order_uid, &order).await {
            tracing::warn!(order_uid, error = %e, "Cache refill failed");
        }
        Ok(order)
    }
}
