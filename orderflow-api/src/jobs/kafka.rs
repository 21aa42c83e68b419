//! Kafka consumer-group source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};

use super::source::{BrokerError, BrokerResult, IncomingMessage, MessageSource};
use crate::config::{env_lookup, parse_or, var_or};
use crate::constants::{
    DEFAULT_KAFKA_BROKER, DEFAULT_KAFKA_GROUP_ID, DEFAULT_KAFKA_MAX_BYTES,
    DEFAULT_KAFKA_MAX_WAIT_MS, DEFAULT_KAFKA_MIN_BYTES, DEFAULT_KAFKA_TOPIC,
};

/// Upper bound for a blocking seek on the consumer.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// Bytes the broker accumulates before answering a fetch
    pub min_bytes: usize,
    /// Upper bound for one fetch response
    pub max_bytes: usize,
    /// How long the broker may wait for `min_bytes`
    pub max_wait: Duration,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: DEFAULT_KAFKA_BROKER.to_string(),
            topic: DEFAULT_KAFKA_TOPIC.to_string(),
            group_id: DEFAULT_KAFKA_GROUP_ID.to_string(),
            min_bytes: DEFAULT_KAFKA_MIN_BYTES,
            max_bytes: DEFAULT_KAFKA_MAX_BYTES,
            max_wait: Duration::from_millis(DEFAULT_KAFKA_MAX_WAIT_MS),
        }
    }
}

impl KafkaConfig {
    /// Environment variables:
    /// - `KAFKA_BROKER` (default: localhost:9092)
    /// - `KAFKA_TOPIC` (default: orders)
    /// - `KAFKA_GROUP_ID` (default: orders_group)
    /// - `KAFKA_MIN_BYTES`, `KAFKA_MAX_BYTES`, `KAFKA_MAX_WAIT_MS`
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            brokers: var_or(lookup, "KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            topic: var_or(lookup, "KAFKA_TOPIC", DEFAULT_KAFKA_TOPIC),
            group_id: var_or(lookup, "KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            min_bytes: parse_or(lookup, "KAFKA_MIN_BYTES", DEFAULT_KAFKA_MIN_BYTES),
            max_bytes: parse_or(lookup, "KAFKA_MAX_BYTES", DEFAULT_KAFKA_MAX_BYTES),
            max_wait: Duration::from_millis(parse_or(
                lookup,
                "KAFKA_MAX_WAIT_MS",
                DEFAULT_KAFKA_MAX_WAIT_MS,
            )),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    /// librdkafka properties for a manually committed consumer.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("fetch.min.bytes", self.min_bytes.to_string())
            .set("fetch.max.bytes", self.max_bytes.to_string())
            .set("max.partition.fetch.bytes", self.max_bytes.to_string())
            .set("fetch.wait.max.ms", self.max_wait.as_millis().to_string());
        config
    }
}

// ============================================================================
// KAFKA SOURCE
// ============================================================================

pub struct KafkaSource {
    consumer: Arc<StreamConsumer>,
}

impl KafkaSource {
    /// Create the consumer and subscribe to the configured topic.
    ///
    /// Connection happens lazily on the first fetch, so an unreachable broker
    /// shows up as fetch errors rather than a boot failure.
    pub fn new(config: &KafkaConfig) -> BrokerResult<Self> {
        let consumer: StreamConsumer =
            config
                .client_config()
                .create()
                .map_err(|e| BrokerError::Setup {
                    reason: e.to_string(),
                })?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| BrokerError::Setup {
                reason: e.to_string(),
            })?;

        tracing::info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Kafka consumer subscribed"
        );
        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn fetch(&self) -> BrokerResult<IncomingMessage> {
        let msg = self.consumer.recv().await.map_err(|e| BrokerError::Fetch {
            reason: e.to_string(),
        })?;
        Ok(IncomingMessage {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(<[u8]>::to_vec),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn commit(&self, message: &IncomingMessage) -> BrokerResult<()> {
        let consumer = self.consumer.clone();
        let (topic, partition, offset) = (message.topic.clone(), message.partition, message.offset);
        let commit_error = |reason: String| BrokerError::Commit {
            topic: message.topic.clone(),
            partition,
            offset,
            reason,
        };

        // Synchronous commits block on the broker round-trip.
        let result = tokio::task::spawn_blocking(move || {
            let mut tpl = TopicPartitionList::new();
            tpl.add_partition_offset(&topic, partition, Offset::Offset(offset + 1))?;
            consumer.commit(&tpl, CommitMode::Sync)
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(commit_error(e.to_string())),
            Err(e) => Err(commit_error(e.to_string())),
        }
    }

    async fn rewind(&self, message: &IncomingMessage) -> BrokerResult<()> {
        let consumer = self.consumer.clone();
        let (topic, partition, offset) = (message.topic.clone(), message.partition, message.offset);
        let seek_error = |reason: String| BrokerError::Seek {
            topic: message.topic.clone(),
            partition,
            offset,
            reason,
        };

        let result = tokio::task::spawn_blocking(move || {
            consumer.seek(&topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(seek_error(e.to_string())),
            Err(e) => Err(seek_error(e.to_string())),
        }
    }
}
