//! In-memory repository and cache.
//!
//! Both keep call counters and an availability switch so tests can observe
//! which tier served a request and simulate an outage of either tier.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use orderflow_core::{
    CacheError, CacheResult, Order, StoreError, StoreResult, MAX_ORDER_UID_LEN, MAX_TEXT_LEN,
};

use crate::cache::{decode_order, encode_order, OrderCache};
use crate::repository::OrderRepository;

// ============================================================================
// REPOSITORY
// ============================================================================

#[derive(Debug, Default)]
struct RepoCounters {
    save: AtomicUsize,
    get_by_uid: AtomicUsize,
    get_all: AtomicUsize,
    exists: AtomicUsize,
}

/// Repository backed by an ordered map.
///
/// Enforces the same column bounds as the relational schema so constraint
/// violations surface the way they do against Postgres.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<BTreeMap<String, Order>>>,
    unavailable: Arc<AtomicBool>,
    stale_exists: Arc<AtomicBool>,
    counters: Arc<RepoCounters>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `exists` answer false for every UID, as if another writer
    /// committed between the check and the insert. `save` still enforces
    /// the unique key.
    pub fn set_stale_exists(&self, stale: bool) {
        self.stale_exists.store(stale, Ordering::SeqCst);
    }

    /// Insert without validation or bounds checks.
    pub fn seed(&self, order: Order) -> StoreResult<()> {
        self.write()?.insert(order.order_uid.clone(), order);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of item rows stored for `order_uid`.
    pub fn item_count(&self, order_uid: &str) -> usize {
        self.orders
            .read()
            .ok()
            .and_then(|m| m.get(order_uid).map(|o| o.items.len()))
            .unwrap_or(0)
    }

    pub fn save_calls(&self) -> usize {
        self.counters.save.load(Ordering::SeqCst)
    }

    pub fn get_by_uid_calls(&self) -> usize {
        self.counters.get_by_uid.load(Ordering::SeqCst)
    }

    pub fn get_all_calls(&self) -> usize {
        self.counters.get_all.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> usize {
        self.counters.exists.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "in-memory store switched off".to_string(),
            });
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, Order>>> {
        self.orders.read().map_err(|_| StoreError::Unavailable {
            reason: "lock poisoned".to_string(),
        })
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Order>>> {
        self.orders.write().map_err(|_| StoreError::Unavailable {
            reason: "lock poisoned".to_string(),
        })
    }
}

/// Reject values the relational schema would reject.
fn check_column_bounds(order: &Order) -> StoreResult<()> {
    let too_long = |column: &str, value: &str, max: usize| -> StoreResult<()> {
        if value.chars().count() > max {
            return Err(StoreError::ConstraintViolation {
                reason: format!("value too long for column {}", column),
            });
        }
        Ok(())
    };

    too_long("orders.order_uid", &order.order_uid, MAX_ORDER_UID_LEN)?;
    for (column, value) in [
        ("orders.track_number", &order.track_number),
        ("orders.entry", &order.entry),
        ("orders.locale", &order.locale),
        ("orders.internal_signature", &order.internal_signature),
        ("orders.customer_id", &order.customer_id),
        ("orders.delivery_service", &order.delivery_service),
        ("orders.shardkey", &order.shardkey),
        ("orders.oof_shard", &order.oof_shard),
        ("delivery.name", &order.delivery.name),
        ("delivery.phone", &order.delivery.phone),
        ("delivery.zip", &order.delivery.zip),
        ("delivery.city", &order.delivery.city),
        ("delivery.address", &order.delivery.address),
        ("delivery.region", &order.delivery.region),
        ("delivery.email", &order.delivery.email),
        ("payment.transaction", &order.payment.transaction),
        ("payment.request_id", &order.payment.request_id),
        ("payment.currency", &order.payment.currency),
        ("payment.provider", &order.payment.provider),
        ("payment.bank", &order.payment.bank),
    ] {
        too_long(column, value, MAX_TEXT_LEN)?;
    }
    for item in &order.items {
        for (column, value) in [
            ("items.track_number", &item.track_number),
            ("items.rid", &item.rid),
            ("items.name", &item.name),
            ("items.size", &item.size),
            ("items.brand", &item.brand),
        ] {
            too_long(column, value, MAX_TEXT_LEN)?;
        }
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> StoreResult<()> {
        self.counters.save.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        check_column_bounds(order)?;

        let mut orders = self.write()?;
        if orders.contains_key(&order.order_uid) {
            return Err(StoreError::DuplicateKey {
                order_uid: order.order_uid.clone(),
            });
        }
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn get_by_uid(&self, order_uid: &str) -> StoreResult<Order> {
        self.counters.get_by_uid.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.read()?
            .get(order_uid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                order_uid: order_uid.to_string(),
            })
    }

    async fn get_all(&self) -> StoreResult<Vec<Order>> {
        self.counters.get_all.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.read()?.values().cloned().collect())
    }

    async fn exists(&self, order_uid: &str) -> StoreResult<bool> {
        self.counters.exists.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self.stale_exists.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self.read()?.contains_key(order_uid))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

// ============================================================================
// CACHE
// ============================================================================

#[derive(Debug, Default)]
struct CacheCounters {
    get: AtomicUsize,
    set: AtomicUsize,
}

/// Cache holding serialized blobs, exactly as a remote key-value tier would.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderCache {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    unavailable: Arc<AtomicBool>,
    counters: Arc<CacheCounters>,
}

impl InMemoryOrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `CacheError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store raw bytes under `key`, bypassing the codec.
    pub fn insert_raw(&self, key: &str, blob: &[u8]) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), blob.to_vec());
        }
    }

    /// Raw bytes stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().ok().and_then(|e| e.get(key).cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn get_calls(&self) -> usize {
        self.counters.get.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.counters.set.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                reason: "in-memory cache switched off".to_string(),
            });
        }
        Ok(())
    }

    fn poisoned() -> CacheError {
        CacheError::Unavailable {
            reason: "lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl OrderCache for InMemoryOrderCache {
    async fn get(&self, order_uid: &str) -> CacheResult<Option<Order>> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        match entries.get(order_uid) {
            Some(blob) => decode_order(order_uid, blob).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, order_uid: &str, order: &Order) -> CacheResult<()> {
        self.counters.set.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let blob = encode_order(order)?;
        self.entries
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(order_uid.to_string(), blob);
        Ok(())
    }

    async fn delete(&self, order_uid: &str) -> CacheResult<()> {
        self.check_available()?;
        self.entries
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(order_uid);
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check_available()
    }

    async fn close(&self) {
        self.set_unavailable(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_test_utils::{arb_order, order_with_items, sample_order};
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_save_then_get() {
        let repo = InMemoryOrderRepository::new();
        let order = order_with_items("A1", 3);

        repo.save(&order).await.unwrap();
        let fetched = repo.get_by_uid("A1").await.unwrap();

        assert!(order.same_aggregate(&fetched));
        assert!(repo.exists("A1").await.unwrap());
        assert_eq!(repo.item_count("A1"), 3);
    }

    #[tokio::test]
    async fn test_save_duplicate_is_rejected() {
        let repo = InMemoryOrderRepository::new();
        let order = sample_order("A1");

        repo.save(&order).await.unwrap();
        let err = repo.save(&order).await.unwrap_err();

        assert_eq!(
            err,
            StoreError::DuplicateKey {
                order_uid: "A1".to_string()
            }
        );
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_overlong_field_leaves_nothing_behind() {
        let repo = InMemoryOrderRepository::new();
        let mut order = order_with_items("A1", 2);
        order.items[1].brand = "x".repeat(MAX_TEXT_LEN + 1);

        let err = repo.save(&order).await.unwrap_err();

        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert!(!repo.exists("A1").await.unwrap());
        assert_eq!(repo.item_count("A1"), 0);
    }

    #[tokio::test]
    async fn test_failed_save_on_later_item_keeps_store_unchanged() {
        let repo = InMemoryOrderRepository::new();
        let existing = order_with_items("A0", 2);
        repo.save(&existing).await.unwrap();

        let mut order = order_with_items("A1", 4);
        order.items[3].name = "n".repeat(MAX_TEXT_LEN + 1);
        let err = repo.save(&order).await.unwrap_err();

        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert!(!err.is_retryable());
        assert_eq!(repo.len(), 1);
        assert!(!repo.exists("A1").await.unwrap());
        assert!(matches!(
            repo.get_by_uid("A1").await,
            Err(StoreError::NotFound { .. })
        ));

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].same_aggregate(&existing));
        assert_eq!(all[0].items.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_exists_still_hits_unique_key() {
        let repo = InMemoryOrderRepository::new();
        let order = sample_order("A1");
        repo.save(&order).await.unwrap();
        repo.set_stale_exists(true);

        assert!(!repo.exists("A1").await.unwrap());
        assert!(matches!(
            repo.save(&order).await,
            Err(StoreError::DuplicateKey { .. })
        ));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = InMemoryOrderRepository::new();
        let err = repo.get_by_uid("ZZZ").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_all_is_sorted_by_uid() {
        let repo = InMemoryOrderRepository::new();
        for uid in ["c", "a", "b"] {
            repo.save(&sample_order(uid)).await.unwrap();
        }
        let uids: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.order_uid)
            .collect();
        assert_eq!(uids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unavailable_repository() {
        let repo = InMemoryOrderRepository::new();
        repo.set_unavailable(true);
        let err = repo.exists("A1").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(repo.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_cache_miss_is_not_an_error() {
        let cache = InMemoryOrderCache::new();
        assert_eq!(cache.get("A1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_set_overwrites() {
        let cache = InMemoryOrderCache::new();
        let mut order = sample_order("A1");
        cache.set("A1", &order).await.unwrap();
        order.locale = "ru".to_string();
        cache.set("A1", &order).await.unwrap();

        assert_eq!(cache.get("A1").await.unwrap(), Some(order.clone()));
        assert_eq!(cache.raw("A1").unwrap(), order.to_json().unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_corrupt_blob() {
        let cache = InMemoryOrderCache::new();
        cache.insert_raw("A1", b"garbage");
        let err = cache.get("A1").await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_cache_delete_and_close() {
        let cache = InMemoryOrderCache::new();
        cache.set("A1", &sample_order("A1")).await.unwrap();
        cache.delete("A1").await.unwrap();
        assert!(!cache.contains("A1"));

        cache.close().await;
        assert!(matches!(
            cache.set("A1", &sample_order("A1")).await,
            Err(CacheError::Unavailable { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_save_then_get_is_deep_equal(order in arb_order()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let repo = InMemoryOrderRepository::new();
                repo.save(&order).await.unwrap();
                let fetched = repo.get_by_uid(&order.order_uid).await.unwrap();
                prop_assert!(order.same_aggregate(&fetched));
                Ok(())
            })?;
        }

        #[test]
        fn prop_rejected_save_writes_nothing(order in arb_order()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let repo = InMemoryOrderRepository::new();
                let mut broken = order.clone();
                if let Some(last) = broken.items.last_mut() {
                    last.brand = "b".repeat(MAX_TEXT_LEN + 1);
                }
                prop_assert!(repo.save(&broken).await.is_err());
                prop_assert!(repo.is_empty());
                prop_assert!(!repo.exists(&order.order_uid).await.unwrap());
                prop_assert!(repo.get_all().await.unwrap().is_empty());
                Ok(())
            })?;
        }
    }
}
