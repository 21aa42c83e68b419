//! Order repository contract.

use async_trait::async_trait;
use orderflow_core::{Order, StoreResult};

/// Transactional access to the five-table order aggregate.
///
/// Implementations must be safe for concurrent use from many tasks.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the whole aggregate atomically.
    ///
    /// Fails with `StoreError::DuplicateKey` when the UID already exists and
    /// with `StoreError::ConstraintViolation` when a field is rejected by the
    /// store. On any failure nothing for this UID is left behind.
    async fn save(&self, order: &Order) -> StoreResult<()>;

    /// Fetch one fully hydrated aggregate, read within a single snapshot.
    ///
    /// Fails with `StoreError::NotFound` when the UID is absent.
    async fn get_by_uid(&self, order_uid: &str) -> StoreResult<Order>;

    /// Fetch every order, hydrated, sorted by `order_uid` ascending.
    async fn get_all(&self) -> StoreResult<Vec<Order>>;

    /// Cheap existence check.
    async fn exists(&self, order_uid: &str) -> StoreResult<bool>;

    /// Round-trip to the store, used by readiness checks.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
