//! Save Order Service
//!
//! Validate, skip known UIDs, persist atomically, then refresh the cache on a
//! best-effort basis.

use std::sync::Arc;

use orderflow_core::{Order, OrderError, OrderResult, StoreError};
use orderflow_storage::{OrderCache, OrderRepository};

use crate::validation::Validate;

/// Result of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Whether the cache accepted the new order. A `false` here leaves the
    /// read path to backfill on the next lookup.
    pub cached: bool,
}

#[derive(Clone)]
pub struct SaveOrderService {
    repo: Arc<dyn OrderRepository>,
    cache: Arc<dyn OrderCache>,
}

impl SaveOrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, cache: Arc<dyn OrderCache>) -> Self {
        Self { repo, cache }
    }

    /// Persist a new order.
    ///
    /// # Errors
    /// - `InvalidOrder` when validation fails (nothing is written)
    /// - `DuplicateOrder` when the UID is already stored
    /// - `Store` for any other repository failure
    pub async fn execute(&self, order: &Order) -> OrderResult<SaveOutcome> {
        order.validate()?;

        if self.repo.exists(&order.order_uid).await? {
            tracing::debug!(order_uid = %order.order_uid, "Order already stored");
            return Err(OrderError::DuplicateOrder {
                order_uid: order.order_uid.clone(),
            });
        }

        // A concurrent writer can still win between exists and save; the
        // unique key turns that into DuplicateKey.
        self.repo.save(order).await.map_err(|e| match e {
            StoreError::DuplicateKey { order_uid } => OrderError::DuplicateOrder { order_uid },
            other => OrderError::Store(other),
        })?;

        let cached = match self.cache.set(&order.order_uid, order).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    order_uid = %order.order_uid,
                    error = %e,
                    "Order saved but cache write failed"
                );
                false
            }
        };

        tracing::info!(
            order_uid = %order.order_uid,
            items = order.items.len(),
            cached,
            "Order saved"
        );
        Ok(SaveOutcome { cached })
    }
}
