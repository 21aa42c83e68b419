//! Constants for the orderflow service
//!
//! Defaults for every tunable read from the environment, plus the fixed
//! protocol strings the HTTP surface returns.

use std::time::Duration;

// ============================================================================
// HTTP
// ============================================================================

/// Default HTTP listen port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default grace period for draining in-flight requests on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default directory served for the browser UI
pub const DEFAULT_WEB_DIR: &str = "./web";

/// Maximum accepted body size for `POST /orders` (1 MiB)
pub const MAX_ORDER_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// POSTGRES
// ============================================================================

pub const DEFAULT_POSTGRES_HOST: &str = "postgres";
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_POSTGRES_DB: &str = "orders_db";
pub const DEFAULT_POSTGRES_POOL_SIZE: usize = 16;

/// Connection wait/create timeout in seconds
pub const DEFAULT_POSTGRES_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// KAFKA
// ============================================================================

pub const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";
pub const DEFAULT_KAFKA_TOPIC: &str = "orders";
pub const DEFAULT_KAFKA_GROUP_ID: &str = "orders_group";

/// Minimum bytes the broker accumulates before answering a fetch (10 KB)
pub const DEFAULT_KAFKA_MIN_BYTES: usize = 10_000;

/// Maximum bytes per fetch response (10 MB)
pub const DEFAULT_KAFKA_MAX_BYTES: usize = 10_000_000;

/// Maximum time the broker waits for `min_bytes` to accumulate
pub const DEFAULT_KAFKA_MAX_WAIT_MS: u64 = 1000;

// ============================================================================
// REDIS
// ============================================================================

pub const DEFAULT_REDIS_ADDR: &str = "localhost:6379";

/// Boot-time ping attempts before the cache is marked unavailable
pub const DEFAULT_REDIS_CONNECT_ATTEMPTS: u32 = 3;

/// Delay between boot-time pings, also the minimum gap between lazy reconnects
pub const DEFAULT_REDIS_RETRY_DELAY_MS: u64 = 2000;

/// Upper bound for a single cache command, including connection setup
pub const REDIS_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// INGESTION
// ============================================================================

/// Pause after a failed broker fetch
pub const FETCH_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// First pause after a retryable processing failure
pub const RETRY_BACKOFF_INITIAL: Duration = Duration::from_millis(500);

/// Upper bound for the retry pause
pub const RETRY_BACKOFF_MAX: Duration = Duration::from_secs(30);

// ============================================================================
// ERROR MESSAGES
// ============================================================================

pub const MSG_ORDER_UID_REQUIRED: &str = "order_uid is required";
pub const MSG_ORDER_NOT_FOUND: &str = "order not found";
pub const MSG_GET_FAILED: &str = "failed to get order";
pub const MSG_INVALID_BODY: &str = "invalid request body";
pub const MSG_INVALID_ORDER: &str = "invalid order data";
pub const MSG_ORDER_EXISTS: &str = "order already exists";
pub const MSG_INTERNAL: &str = "internal server error";
