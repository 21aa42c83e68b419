//! Redis-backed order cache.
//!
//! The cache is never required for the service to run. If Redis cannot be
//! reached at boot the cache starts disconnected, every call fails fast with
//! `CacheError::Unavailable`, and a reconnect is attempted at most once per
//! retry delay. Once connected, the `ConnectionManager` reconnects on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use orderflow_core::{CacheError, CacheResult, Order};
use orderflow_storage::{decode_order, encode_order, OrderCache};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::config::{env_lookup, parse_or, var_or};
use crate::constants::{
    DEFAULT_REDIS_ADDR, DEFAULT_REDIS_CONNECT_ATTEMPTS, DEFAULT_REDIS_RETRY_DELAY_MS,
    REDIS_COMMAND_TIMEOUT,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// `host:port` or a full `redis://` URL
    pub addr: String,
    /// Boot-time connection attempts
    pub connect_attempts: u32,
    /// Pause between attempts; also the minimum gap between lazy reconnects
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_REDIS_ADDR.to_string(),
            connect_attempts: DEFAULT_REDIS_CONNECT_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_REDIS_RETRY_DELAY_MS),
        }
    }
}

impl CacheConfig {
    /// Environment variables:
    /// - `REDIS_ADDR` (default: localhost:6379)
    /// - `REDIS_CONNECT_ATTEMPTS` (default: 3)
    /// - `REDIS_RETRY_DELAY_MS` (default: 2000)
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            addr: var_or(lookup, "REDIS_ADDR", DEFAULT_REDIS_ADDR),
            connect_attempts: parse_or(
                lookup,
                "REDIS_CONNECT_ATTEMPTS",
                DEFAULT_REDIS_CONNECT_ATTEMPTS,
            ),
            retry_delay: Duration::from_millis(parse_or(
                lookup,
                "REDIS_RETRY_DELAY_MS",
                DEFAULT_REDIS_RETRY_DELAY_MS,
            )),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    pub fn url(&self) -> String {
        if self.addr.starts_with("redis://") || self.addr.starts_with("rediss://") {
            self.addr.clone()
        } else {
            format!("redis://{}/", self.addr)
        }
    }
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

pub fn cache_error(err: redis::RedisError) -> CacheError {
    match err.kind() {
        redis::ErrorKind::TypeError => CacheError::Serialization {
            reason: err.to_string(),
        },
        _ => CacheError::Unavailable {
            reason: err.to_string(),
        },
    }
}

fn timed_out() -> CacheError {
    CacheError::Unavailable {
        reason: format!("no reply within {:?}", REDIS_COMMAND_TIMEOUT),
    }
}

// ============================================================================
// REDIS CACHE
// ============================================================================

struct ConnState {
    manager: Option<ConnectionManager>,
    last_attempt: Option<Instant>,
}

/// `OrderCache` over Redis. Keys are the raw `order_uid`; values never expire.
pub struct RedisOrderCache {
    client: redis::Client,
    retry_delay: Duration,
    state: Mutex<ConnState>,
    closed: AtomicBool,
}

impl RedisOrderCache {
    /// Connect with up to `connect_attempts` pings, `retry_delay` apart.
    ///
    /// Only an unparsable address is an error. An unreachable server yields a
    /// disconnected cache.
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url()).map_err(cache_error)?;
        let cache = Self {
            client,
            retry_delay: config.retry_delay,
            state: Mutex::new(ConnState {
                manager: None,
                last_attempt: None,
            }),
            closed: AtomicBool::new(false),
        };

        let attempts = config.connect_attempts.max(1);
        for attempt in 1..=attempts {
            match cache.establish().await {
                Ok(manager) => {
                    let mut state = cache.state.lock().await;
                    state.manager = Some(manager);
                    state.last_attempt = Some(Instant::now());
                    drop(state);
                    tracing::info!(addr = %config.addr, attempt, "Connected to Redis");
                    return Ok(cache);
                }
                Err(e) => {
                    tracing::warn!(
                        addr = %config.addr,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Redis not reachable"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(config.retry_delay).await;
                    }
                }
            }
        }

        cache.state.lock().await.last_attempt = Some(Instant::now());
        tracing::warn!(addr = %config.addr, "Starting without cache; will reconnect lazily");
        Ok(cache)
    }

    /// Whether a live connection manager is held.
    pub async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.state.lock().await.manager.is_some()
    }

    async fn establish(&self) -> CacheResult<ConnectionManager> {
        let mut manager = tokio::time::timeout(
            REDIS_COMMAND_TIMEOUT,
            ConnectionManager::new(self.client.clone()),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(cache_error)?;

        let _: String = tokio::time::timeout(
            REDIS_COMMAND_TIMEOUT,
            redis::cmd("PING").query_async(&mut manager),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(cache_error)?;

        Ok(manager)
    }

    /// A handle to the shared connection, reconnecting if allowed.
    async fn connection(&self) -> CacheResult<ConnectionManager> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                reason: "cache client closed".to_string(),
            });
        }

        {
            let mut state = self.state.lock().await;
            if let Some(manager) = &state.manager {
                return Ok(manager.clone());
            }

            let recently_tried = state
                .last_attempt
                .map(|at| at.elapsed() < self.retry_delay)
                .unwrap_or(false);
            if recently_tried {
                return Err(CacheError::Unavailable {
                    reason: "not connected".to_string(),
                });
            }
            // Claim this reconnect window; concurrent callers fail fast.
            state.last_attempt = Some(Instant::now());
        }

        let manager = self.establish().await?;
        let mut state = self.state.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                reason: "cache client closed".to_string(),
            });
        }
        tracing::info!("Reconnected to Redis");
        state.manager = Some(manager.clone());
        Ok(manager)
    }
}

#[async_trait]
impl OrderCache for RedisOrderCache {
    async fn get(&self, order_uid: &str) -> CacheResult<Option<Order>> {
        let mut conn = self.connection().await?;
        let blob: Option<Vec<u8>> = tokio::time::timeout(REDIS_COMMAND_TIMEOUT, conn.get(order_uid))
            .await
            .map_err(|_| timed_out())?
            .map_err(cache_error)?;

        match blob {
            Some(bytes) => decode_order(order_uid, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, order_uid: &str, order: &Order) -> CacheResult<()> {
        let blob = encode_order(order)?;
        let mut conn = self.connection().await?;
        let _: () = tokio::time::timeout(REDIS_COMMAND_TIMEOUT, conn.set(order_uid, blob))
            .await
            .map_err(|_| timed_out())?
            .map_err(cache_error)?;
        Ok(())
    }

    async fn delete(&self, order_uid: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: () = tokio::time::timeout(REDIS_COMMAND_TIMEOUT, conn.del(order_uid))
            .await
            .map_err(|_| timed_out())?
            .map_err(cache_error)?;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: String = tokio::time::timeout(
            REDIS_COMMAND_TIMEOUT,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(cache_error)?;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.state.lock().await.manager = None;
        tracing::info!("Cache client closed");
    }
}
