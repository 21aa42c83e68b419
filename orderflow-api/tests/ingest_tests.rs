//! Ingestion pipeline tests
//!
//! Drive the worker over the in-memory broker, store and cache, and check
//! the commit policy end to end: what lands in the store, what lands in the
//! cache, and where the committed offset ends up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderflow_api::jobs::{BrokerError, BrokerResult, IncomingMessage, InMemorySource};
use orderflow_api::MessageSource;
use orderflow_core::Order;
use orderflow_storage::OrderRepository;
use orderflow_test_utils::{order_with_items, sample_order};

#[path = "support/harness.rs"]
mod test_harness;
use test_harness::Harness;

fn payload(order: &Order) -> Vec<u8> {
    order.to_json().unwrap()
}

#[tokio::test]
async fn test_happy_path_through_broker() {
    let h = Harness::new();
    let mut order = sample_order("A1");
    order.items[0].price = 100;
    h.publish("A1", &payload(&order)).await;

    let worker = h.spawn_worker();
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.saved, 1);
    assert!(h.repo.get_by_uid("A1").await.unwrap().same_aggregate(&order));
    assert_eq!(h.cache.raw("A1"), Some(payload(&order)));
    assert_eq!(h.source.committed().await, Some(1));
}

#[tokio::test]
async fn test_poison_message_is_committed() {
    let h = Harness::new();
    h.publish("X", br#"{"uid: "X", broken"#).await;

    let worker = h.spawn_worker();
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.poison, 1);
    assert_eq!(snapshot.committed(), 1);
    assert!(h.repo.is_empty());
    assert_eq!(h.repo.save_calls(), 0);
    assert_eq!(h.source.committed().await, Some(1));
}

#[tokio::test]
async fn test_duplicate_replay_writes_once() {
    let h = Harness::new();
    let order = order_with_items("A1", 3);
    h.publish("A1", &payload(&order)).await;
    h.publish("A1", &payload(&order)).await;

    let worker = h.spawn_worker();
    worker.wait_committed(2).await;
    let snapshot = worker.stop().await;

    assert_eq!((snapshot.saved, snapshot.duplicate), (1, 1));
    assert_eq!(h.repo.len(), 1);
    assert_eq!(h.repo.item_count("A1"), 3);
    assert_eq!(h.source.commit_log().await, vec![0, 1]);
    assert_eq!(h.source.committed().await, Some(2));
}

#[tokio::test]
async fn test_replays_leave_exactly_one_aggregate() {
    for replays in 1..=4u64 {
        let h = Harness::new();
        let order = order_with_items("R1", 2);
        for _ in 0..replays {
            h.publish("R1", &payload(&order)).await;
        }

        let worker = h.spawn_worker();
        worker.wait_committed(replays).await;
        let snapshot = worker.stop().await;

        assert_eq!(snapshot.saved, 1, "replays = {}", replays);
        assert_eq!(snapshot.duplicate, replays - 1, "replays = {}", replays);
        assert_eq!(h.repo.len(), 1);
        assert_eq!(h.repo.item_count("R1"), 2);
    }
}

#[tokio::test]
async fn test_invalid_order_is_committed_without_rows() {
    let h = Harness::new();
    h.publish("", br#"{"order_uid":"","items":[]}"#).await;

    let worker = h.spawn_worker();
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.invalid, 1);
    assert!(h.repo.is_empty());
    assert!(h.cache.is_empty());
    assert_eq!(h.source.committed().await, Some(1));
}

#[tokio::test]
async fn test_column_overflow_is_committed_as_poison() {
    let h = Harness::new();
    let mut order = sample_order("A1");
    order.delivery.address = "a".repeat(300);
    h.publish("A1", &payload(&order)).await;

    let worker = h.spawn_worker();
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.poison, 1);
    assert_eq!(snapshot.retried, 0);
    assert!(h.repo.is_empty());
}

#[tokio::test]
async fn test_store_outage_retries_same_offset() {
    let h = Harness::new();
    let order = sample_order("A1");
    h.repo.set_unavailable(true);
    h.publish("A1", &payload(&order)).await;

    let worker = h.spawn_worker();
    worker.wait_until(|s| s.retried >= 2).await;
    assert_eq!(h.source.committed().await, None);
    assert!(h.source.commit_log().await.is_empty());

    h.repo.set_unavailable(false);
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.saved, 1);
    assert_eq!(h.repo.len(), 1);
    assert_eq!(h.source.commit_log().await, vec![0]);
}

#[tokio::test]
async fn test_cache_outage_does_not_block_ingestion() {
    let h = Harness::new();
    h.cache.set_unavailable(true);
    h.publish("A1", &payload(&sample_order("A1"))).await;

    let worker = h.spawn_worker();
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.saved, 1);
    assert_eq!(snapshot.retried, 0);
    assert_eq!(h.repo.len(), 1);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_fetch_error_is_survived() {
    let h = Harness::new();
    h.source.fail_next_fetch("broker connection reset").await;
    h.publish("A1", &payload(&sample_order("A1"))).await;

    let worker = h.spawn_worker();
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.fetch_errors, 1);
    assert_eq!(snapshot.saved, 1);
}

#[tokio::test]
async fn test_commits_follow_offset_order() {
    let h = Harness::new();
    for i in 0..5 {
        let uid = format!("ORD{}", i);
        h.publish(&uid, &payload(&sample_order(&uid))).await;
    }

    let worker = h.spawn_worker();
    worker.wait_committed(5).await;
    worker.stop().await;

    assert_eq!(h.source.commit_log().await, vec![0, 1, 2, 3, 4]);
    assert_eq!(h.repo.len(), 5);
}

#[tokio::test]
async fn test_shutdown_while_idle_commits_nothing() {
    let h = Harness::new();

    let worker = h.spawn_worker();
    tokio::task::yield_now().await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.committed(), 0);
    assert_eq!(h.source.committed().await, None);
}

#[tokio::test]
async fn test_shutdown_during_retry_leaves_offset_uncommitted() {
    let h = Harness::new();
    h.repo.set_unavailable(true);
    h.publish("A1", &payload(&sample_order("A1"))).await;

    let worker = h.spawn_worker();
    worker.wait_until(|s| s.retried >= 1).await;
    worker.stop().await;

    assert_eq!(h.source.committed().await, None);
    assert_eq!(h.source.pending().await, 1, "record must be fetched again after restart");
}

/// Broker whose seeks always fail; everything else is delegated.
struct SeeklessSource(Arc<InMemorySource>);

#[async_trait]
impl MessageSource for SeeklessSource {
    async fn fetch(&self) -> BrokerResult<IncomingMessage> {
        self.0.fetch().await
    }

    async fn commit(&self, message: &IncomingMessage) -> BrokerResult<()> {
        self.0.commit(message).await
    }

    async fn rewind(&self, message: &IncomingMessage) -> BrokerResult<()> {
        Err(BrokerError::Seek {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason: "partition not assigned".to_string(),
        })
    }
}

#[tokio::test]
async fn test_failed_rewind_retries_held_record() {
    let h = Harness::new();
    let first = sample_order("A1");
    let second = sample_order("A2");
    h.publish("A1", &payload(&first)).await;
    h.publish("A2", &payload(&second)).await;
    h.repo.set_unavailable(true);

    let worker = h.spawn_worker_on(Arc::new(SeeklessSource(h.source.clone())));
    worker.wait_until(|s| s.retried >= 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.source.committed().await, None);

    h.repo.set_unavailable(false);
    worker.wait_committed(2).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.saved, 2);
    assert!(h.repo.get_by_uid("A1").await.unwrap().same_aggregate(&first));
    assert!(h.repo.get_by_uid("A2").await.unwrap().same_aggregate(&second));
    assert_eq!(h.source.commit_log().await, vec![0, 1]);
    assert_eq!(h.source.committed().await, Some(2));
}

#[tokio::test]
async fn test_failed_rewind_then_shutdown_leaves_offset_uncommitted() {
    let h = Harness::new();
    h.publish("A1", &payload(&sample_order("A1"))).await;
    h.repo.set_unavailable(true);

    let worker = h.spawn_worker_on(Arc::new(SeeklessSource(h.source.clone())));
    worker.wait_until(|s| s.retried >= 2).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.committed(), 0);
    assert_eq!(h.source.committed().await, None);
    assert!(h.repo.is_empty());
}

#[tokio::test]
async fn test_unique_key_race_is_committed_as_duplicate() {
    let h = Harness::new();
    let order = sample_order("A1");
    h.repo.seed(order.clone()).unwrap();
    h.repo.set_stale_exists(true);
    h.publish("A1", &payload(&order)).await;

    let worker = h.spawn_worker();
    worker.wait_committed(1).await;
    let snapshot = worker.stop().await;

    assert_eq!(snapshot.duplicate, 1);
    assert_eq!(snapshot.retried, 0);
    assert_eq!(h.repo.save_calls(), 1);
    assert_eq!(h.repo.len(), 1);
    assert_eq!(h.source.committed().await, Some(1));
}
