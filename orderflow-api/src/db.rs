//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres and the
//! `OrderRepository` implementation over the five-table order schema.
//!
//! Writes run in one transaction per aggregate. Reads run in a
//! `REPEATABLE READ READ ONLY` transaction so a header is never observed
//! without its delivery, payment and items.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use orderflow_core::{ConfigError, Delivery, Item, Order, Payment, StoreError, StoreResult};
use orderflow_storage::OrderRepository;
use tokio_postgres::error::SqlState;
use tokio_postgres::{IsolationLevel, NoTls, Row};

use crate::config::{env_lookup, parse_or, required, var_or};
use crate::constants::{
    DEFAULT_POSTGRES_DB, DEFAULT_POSTGRES_HOST, DEFAULT_POSTGRES_POOL_SIZE,
    DEFAULT_POSTGRES_PORT, DEFAULT_POSTGRES_TIMEOUT_SECS,
};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create/recycle timeout for pooled connections
    pub timeout: Duration,
}

impl DbConfig {
    /// Environment variables:
    /// - `POSTGRES_USER`, `POSTGRES_PASSWORD`: required
    /// - `POSTGRES_HOST` (default: postgres), `POSTGRES_PORT` (default: 5432)
    /// - `POSTGRES_DB` (default: orders_db)
    /// - `POSTGRES_POOL_SIZE` (default: 16), `POSTGRES_TIMEOUT` seconds (default: 30)
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: var_or(lookup, "POSTGRES_HOST", DEFAULT_POSTGRES_HOST),
            port: parse_or(lookup, "POSTGRES_PORT", DEFAULT_POSTGRES_PORT),
            dbname: var_or(lookup, "POSTGRES_DB", DEFAULT_POSTGRES_DB),
            user: required(lookup, "POSTGRES_USER")?,
            password: required(lookup, "POSTGRES_PASSWORD")?,
            max_size: parse_or(lookup, "POSTGRES_POOL_SIZE", DEFAULT_POSTGRES_POOL_SIZE),
            timeout: Duration::from_secs(parse_or(
                lookup,
                "POSTGRES_TIMEOUT",
                DEFAULT_POSTGRES_TIMEOUT_SECS,
            )),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened here; the first checkout connects.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size.max(1));
        pool_cfg.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

// ============================================================================
// ERROR CLASSIFICATION
// ============================================================================

/// Classify a driver error. `order_uid` names the aggregate being touched.
pub fn store_error(err: tokio_postgres::Error, order_uid: &str) -> StoreError {
    if let Some(db) = err.as_db_error() {
        let code = db.code();
        if *code == SqlState::UNIQUE_VIOLATION {
            return StoreError::DuplicateKey {
                order_uid: order_uid.to_string(),
            };
        }
        // Class 23 (integrity) and class 22 (data exception, e.g. 22001
        // string_data_right_truncation) fail identically on every replay.
        let class = &code.code()[..2];
        if class == "23" || class == "22" {
            return StoreError::ConstraintViolation {
                reason: format!("{} ({})", db.message(), code.code()),
            };
        }
        // 08 connection exception, 53 insufficient resources, 57 operator
        // intervention (shutdown, cancel).
        if class == "08" || class == "53" || class == "57" {
            return StoreError::Unavailable {
                reason: format!("{} ({})", db.message(), code.code()),
            };
        }
        return StoreError::Query {
            reason: format!("{} ({})", db.message(), code.code()),
        };
    }

    if err.is_closed() {
        return StoreError::Unavailable {
            reason: "connection closed".to_string(),
        };
    }

    StoreError::Unavailable {
        reason: err.to_string(),
    }
}

/// Classify a pool checkout failure.
pub fn pool_error(err: PoolError) -> StoreError {
    match err {
        PoolError::Backend(e) => store_error(e, ""),
        PoolError::Timeout(kind) => StoreError::Unavailable {
            reason: format!("connection pool timeout ({:?})", kind),
        },
        PoolError::Closed => StoreError::Unavailable {
            reason: "connection pool is closed".to_string(),
        },
        other => StoreError::Unavailable {
            reason: other.to_string(),
        },
    }
}

// ============================================================================
// SQL
// ============================================================================

const INSERT_ORDER: &str = "\
    INSERT INTO orders (
        order_uid, track_number, entry, locale, internal_signature,
        customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_DELIVERY: &str = "\
    INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const INSERT_PAYMENT: &str = "\
    INSERT INTO payment (
        order_uid, transaction, request_id, currency, provider, amount,
        payment_dt, bank, delivery_cost, goods_total, custom_fee
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_ITEM: &str = "\
    INSERT INTO items (
        order_uid, chrt_id, track_number, price, rid, name, sale,
        size, total_price, nm_id, brand, status
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

const SELECT_ORDER_COLUMNS: &str = "\
    SELECT o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
           o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
           d.name, d.phone, d.zip, d.city, d.address, d.region, d.email,
           p.transaction, p.request_id, p.currency, p.provider, p.amount, p.payment_dt,
           p.bank, p.delivery_cost, p.goods_total, p.custom_fee
    FROM orders o
    JOIN delivery d ON d.order_uid = o.order_uid
    JOIN payment p ON p.order_uid = o.order_uid";

const SELECT_ITEM_COLUMNS: &str = "\
    SELECT order_uid, chrt_id, track_number, price, rid, name, sale,
           size, total_price, nm_id, brand, status
    FROM items";

const SELECT_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM orders WHERE order_uid = $1)";

// ============================================================================
// ROW MAPPING
// ============================================================================

fn column<'a, T>(row: &'a Row, idx: usize) -> StoreResult<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(idx).map_err(|e| StoreError::Query {
        reason: format!("column {}: {}", idx, e),
    })
}

fn order_from_row(row: &Row) -> StoreResult<Order> {
    Ok(Order {
        order_uid: column(row, 0)?,
        track_number: column(row, 1)?,
        entry: column(row, 2)?,
        locale: column(row, 3)?,
        internal_signature: column(row, 4)?,
        customer_id: column(row, 5)?,
        delivery_service: column(row, 6)?,
        shardkey: column(row, 7)?,
        sm_id: column(row, 8)?,
        date_created: column(row, 9)?,
        oof_shard: column(row, 10)?,
        delivery: Delivery {
            name: column(row, 11)?,
            phone: column(row, 12)?,
            zip: column(row, 13)?,
            city: column(row, 14)?,
            address: column(row, 15)?,
            region: column(row, 16)?,
            email: column(row, 17)?,
        },
        payment: Payment {
            transaction: column(row, 18)?,
            request_id: column(row, 19)?,
            currency: column(row, 20)?,
            provider: column(row, 21)?,
            amount: column(row, 22)?,
            payment_dt: column(row, 23)?,
            bank: column(row, 24)?,
            delivery_cost: column(row, 25)?,
            goods_total: column(row, 26)?,
            custom_fee: column(row, 27)?,
        },
        items: Vec::new(),
    })
}

/// Item row preceded by its `order_uid`.
fn item_from_row(row: &Row) -> StoreResult<(String, Item)> {
    Ok((
        column(row, 0)?,
        Item {
            chrt_id: column(row, 1)?,
            track_number: column(row, 2)?,
            price: column(row, 3)?,
            rid: column(row, 4)?,
            name: column(row, 5)?,
            sale: column(row, 6)?,
            size: column(row, 7)?,
            total_price: column(row, 8)?,
            nm_id: column(row, 9)?,
            brand: column(row, 10)?,
            status: column(row, 11)?,
        },
    ))
}

// ============================================================================
// POSTGRES REPOSITORY
// ============================================================================

/// `OrderRepository` backed by a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: Pool,
}

impl PgOrderRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> StoreResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Close the pool. Checked-out connections are dropped on return.
    pub fn close(&self) {
        self.pool.close();
    }

    async fn get_conn(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn save(&self, order: &Order) -> StoreResult<()> {
        let uid = order.order_uid.as_str();
        let err = |e| store_error(e, uid);

        let mut conn = self.get_conn().await?;
        // Dropping `tx` before commit (error or cancellation) rolls back.
        let tx = conn.transaction().await.map_err(err)?;

        let stmt = tx.prepare_cached(INSERT_ORDER).await.map_err(err)?;
        tx.execute(
            &stmt,
            &[
                &order.order_uid,
                &order.track_number,
                &order.entry,
                &order.locale,
                &order.internal_signature,
                &order.customer_id,
                &order.delivery_service,
                &order.shardkey,
                &order.sm_id,
                &order.date_created,
                &order.oof_shard,
            ],
        )
        .await
        .map_err(err)?;

        let d = &order.delivery;
        let stmt = tx.prepare_cached(INSERT_DELIVERY).await.map_err(err)?;
        tx.execute(
            &stmt,
            &[
                &order.order_uid,
                &d.name,
                &d.phone,
                &d.zip,
                &d.city,
                &d.address,
                &d.region,
                &d.email,
            ],
        )
        .await
        .map_err(err)?;

        let p = &order.payment;
        let stmt = tx.prepare_cached(INSERT_PAYMENT).await.map_err(err)?;
        tx.execute(
            &stmt,
            &[
                &order.order_uid,
                &p.transaction,
                &p.request_id,
                &p.currency,
                &p.provider,
                &p.amount,
                &p.payment_dt,
                &p.bank,
                &p.delivery_cost,
                &p.goods_total,
                &p.custom_fee,
            ],
        )
        .await
        .map_err(err)?;

        let stmt = tx.prepare_cached(INSERT_ITEM).await.map_err(err)?;
        for item in &order.items {
            tx.execute(
                &stmt,
                &[
                    &order.order_uid,
                    &item.chrt_id,
                    &item.track_number,
                    &item.price,
                    &item.rid,
                    &item.name,
                    &item.sale,
                    &item.size,
                    &item.total_price,
                    &item.nm_id,
                    &item.brand,
                    &item.status,
                ],
            )
            .await
            .map_err(err)?;
        }

        tx.commit().await.map_err(err)?;
        tracing::debug!(order_uid = %uid, items = order.items.len(), "Order persisted");
        Ok(())
    }

    async fn get_by_uid(&self, order_uid: &str) -> StoreResult<Order> {
        let err = |e| store_error(e, order_uid);

        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(err)?;

        let header_sql = format!("{} WHERE o.order_uid = $1", SELECT_ORDER_COLUMNS);
        let row = tx
            .query_opt(header_sql.as_str(), &[&order_uid])
            .await
            .map_err(err)?
            .ok_or_else(|| StoreError::NotFound {
                order_uid: order_uid.to_string(),
            })?;
        let mut order = order_from_row(&row)?;

        let items_sql = format!("{} WHERE order_uid = $1 ORDER BY id", SELECT_ITEM_COLUMNS);
        let rows = tx
            .query(items_sql.as_str(), &[&order_uid])
            .await
            .map_err(err)?;
        order.items = rows
            .iter()
            .map(|r| item_from_row(r).map(|(_, item)| item))
            .collect::<StoreResult<Vec<_>>>()?;

        tx.commit().await.map_err(err)?;
        Ok(order)
    }

    async fn get_all(&self) -> StoreResult<Vec<Order>> {
        let err = |e| store_error(e, "");

        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(err)?;

        let header_sql = format!("{} ORDER BY o.order_uid", SELECT_ORDER_COLUMNS);
        let rows = tx.query(header_sql.as_str(), &[]).await.map_err(err)?;
        let mut orders = rows
            .iter()
            .map(order_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        if !orders.is_empty() {
            let uids: Vec<String> = orders.iter().map(|o| o.order_uid.clone()).collect();
            let index: HashMap<String, usize> = uids
                .iter()
                .enumerate()
                .map(|(i, uid)| (uid.clone(), i))
                .collect();

            let items_sql = format!(
                "{} WHERE order_uid = ANY($1) ORDER BY order_uid, id",
                SELECT_ITEM_COLUMNS
            );
            let rows = tx.query(items_sql.as_str(), &[&uids]).await.map_err(err)?;
            for row in &rows {
                let (uid, item) = item_from_row(row)?;
                if let Some(&i) = index.get(&uid) {
                    orders[i].items.push(item);
                }
            }
        }

        tx.commit().await.map_err(err)?;
        Ok(orders)
    }

    async fn exists(&self, order_uid: &str) -> StoreResult<bool> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(SELECT_EXISTS, &[&order_uid])
            .await
            .map_err(|e| store_error(e, order_uid))?;
        column(&row, 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.execute("SELECT 1", &[])
            .await
            .map_err(|e| store_error(e, ""))?;
        Ok(())
    }
}
