//! Broker message source abstraction.
//!
//! The ingestion worker only needs three things from a broker: the next
//! record, a way to mark it done, and a way to see it again. `KafkaSource`
//! provides them over a consumer group; `InMemorySource` provides them over
//! a single in-process partition for tests and local runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

/// A record fetched from the broker, detached from the consumer's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// Raw record value. A tombstone arrives as an empty payload.
    pub payload: Vec<u8>,
}

impl IncomingMessage {
    /// Key as text, for log fields.
    pub fn key_str(&self) -> Option<String> {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Consumer setup failed: {reason}")]
    Setup { reason: String },

    #[error("Fetch failed: {reason}")]
    Fetch { reason: String },

    #[error("Commit of {topic}[{partition}]@{offset} failed: {reason}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },

    #[error("Seek to {topic}[{partition}]@{offset} failed: {reason}")]
    Seek {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Source of order records with manual offset management.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next record.
    async fn fetch(&self) -> BrokerResult<IncomingMessage>;

    /// Mark `message` and everything before it on its partition as consumed.
    async fn commit(&self, message: &IncomingMessage) -> BrokerResult<()>;

    /// Make `message` the next record fetched from its partition.
    async fn rewind(&self, message: &IncomingMessage) -> BrokerResult<()>;
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

#[derive(Default)]
struct PartitionLog {
    records: Vec<(Option<Vec<u8>>, Vec<u8>)>,
    /// Offset handed out by the next fetch.
    position: usize,
    /// Next offset to consume after a restart, Kafka-style.
    committed: Option<i64>,
    commit_log: Vec<i64>,
    fetch_failures: VecDeque<String>,
}

/// Single-partition broker held in memory.
pub struct InMemorySource {
    topic: String,
    log: Mutex<PartitionLog>,
    appended: Notify,
}

impl InMemorySource {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            log: Mutex::new(PartitionLog::default()),
            appended: Notify::new(),
        }
    }

    /// Append a record keyed by `key`. Returns its offset.
    pub async fn publish(&self, key: Option<&str>, payload: &[u8]) -> i64 {
        let mut log = self.log.lock().await;
        log.records
            .push((key.map(|k| k.as_bytes().to_vec()), payload.to_vec()));
        let offset = (log.records.len() - 1) as i64;
        drop(log);
        self.appended.notify_waiters();
        offset
    }

    /// Make the next fetch fail once with `reason`.
    pub async fn fail_next_fetch(&self, reason: &str) {
        self.log
            .lock()
            .await
            .fetch_failures
            .push_back(reason.to_string());
        self.appended.notify_waiters();
    }

    /// Committed position: the offset a restarted consumer would read next.
    pub async fn committed(&self) -> Option<i64> {
        self.log.lock().await.committed
    }

    /// Offsets of every committed record, in commit order.
    pub async fn commit_log(&self) -> Vec<i64> {
        self.log.lock().await.commit_log.clone()
    }

    /// Records appended but not yet fetched.
    pub async fn pending(&self) -> usize {
        let log = self.log.lock().await;
        log.records.len().saturating_sub(log.position)
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn fetch(&self) -> BrokerResult<IncomingMessage> {
        loop {
            // Registered before the check so an append in between still wakes us.
            let appended = self.appended.notified();
            {
                let mut log = self.log.lock().await;
                if let Some(reason) = log.fetch_failures.pop_front() {
                    return Err(BrokerError::Fetch { reason });
                }
                let position = log.position;
                if let Some((key, payload)) = log.records.get(position).cloned() {
                    log.position += 1;
                    return Ok(IncomingMessage {
                        topic: self.topic.clone(),
                        partition: 0,
                        offset: position as i64,
                        key,
                        payload,
                    });
                }
            }
            appended.await;
        }
    }

    async fn commit(&self, message: &IncomingMessage) -> BrokerResult<()> {
        let mut log = self.log.lock().await;
        let next = message.offset + 1;
        if log.committed.map_or(true, |c| next > c) {
            log.committed = Some(next);
        }
        log.commit_log.push(message.offset);
        Ok(())
    }

    async fn rewind(&self, message: &IncomingMessage) -> BrokerResult<()> {
        let mut log = self.log.lock().await;
        if message.offset < 0 || message.offset as usize > log.records.len() {
            return Err(BrokerError::Seek {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                reason: "offset out of range".to_string(),
            });
        }
        log.position = message.offset as usize;
        Ok(())
    }
}
