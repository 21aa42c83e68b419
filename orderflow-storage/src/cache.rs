//! Order cache contract and blob codec.
//!
//! Blobs are the JSON wire form of the order, so a cache entry is
//! byte-identical to the HTTP response body for the same order.

use async_trait::async_trait;
use orderflow_core::{CacheError, CacheResult, Order};

/// Key-value cache of serialized orders keyed by `order_uid`.
///
/// A miss is `Ok(None)`. A blob that cannot be decoded is
/// `CacheError::Corrupt`, which callers treat like a miss and go to the store.
#[async_trait]
pub trait OrderCache: Send + Sync {
    async fn get(&self, order_uid: &str) -> CacheResult<Option<Order>>;

    /// Idempotent overwrite, no expiry.
    async fn set(&self, order_uid: &str, order: &Order) -> CacheResult<()>;

    /// Best-effort removal.
    async fn delete(&self, order_uid: &str) -> CacheResult<()>;

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    /// Release connections. Later calls fail with `CacheError::Unavailable`.
    async fn close(&self) {}
}

/// Encode an order into its cache blob.
pub fn encode_order(order: &Order) -> CacheResult<Vec<u8>> {
    order.to_json().map_err(|e| CacheError::Serialization {
        reason: e.to_string(),
    })
}

/// Decode a cache blob stored under `key`.
pub fn decode_order(key: &str, blob: &[u8]) -> CacheResult<Order> {
    Order::from_json(blob).map_err(|e| CacheError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
