//! Embedded schema migrations.
//!
//! Applied at boot in one transaction under an advisory lock, so concurrent
//! replicas starting together do not race. Every statement is idempotent and
//! each version is recorded in `schema_migrations`.

use deadpool_postgres::Pool;
use orderflow_core::{StoreError, StoreResult};

use crate::db::{pool_error, store_error};

/// A single embedded migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_order_tables",
    sql: include_str!("../migrations/0001_create_order_tables.sql"),
}];

/// Arbitrary constant shared by every replica of this service.
const MIGRATION_LOCK_KEY: i64 = 0x6f72_6465_7266_6c6f;

const CREATE_MIGRATIONS_TABLE: &str = "\
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version    BIGINT PRIMARY KEY,
        name       TEXT NOT NULL,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )";

/// Apply every pending migration. Returns the versions applied by this call.
pub async fn run_migrations(pool: &Pool) -> StoreResult<Vec<i64>> {
    let mut conn = pool.get().await.map_err(pool_error)?;
    let tx = conn.transaction().await.map_err(|e| store_error(e, ""))?;

    tx.execute("SELECT pg_advisory_xact_lock($1)", &[&MIGRATION_LOCK_KEY])
        .await
        .map_err(|e| store_error(e, ""))?;
    tx.batch_execute(CREATE_MIGRATIONS_TABLE)
        .await
        .map_err(|e| store_error(e, ""))?;

    let rows = tx
        .query("SELECT version FROM schema_migrations", &[])
        .await
        .map_err(|e| store_error(e, ""))?;
    let applied = rows
        .iter()
        .map(|r| r.try_get::<_, i64>(0))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| store_error(e, ""))?;

    let mut newly_applied = Vec::new();
    for migration in pending(MIGRATIONS, &applied) {
        tx.batch_execute(migration.sql)
            .await
            .map_err(|e| StoreError::Query {
                reason: format!("migration {} ({}) failed: {}", migration.version, migration.name, e),
            })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)",
            &[&migration.version, &migration.name],
        )
        .await
        .map_err(|e| store_error(e, ""))?;

        tracing::info!(version = migration.version, name = migration.name, "Applied migration");
        newly_applied.push(migration.version);
    }

    tx.commit().await.map_err(|e| store_error(e, ""))?;
    Ok(newly_applied)
}

/// Migrations not yet recorded, in version order.
fn pending<'a>(all: &'a [Migration], applied: &[i64]) -> Vec<&'a Migration> {
    let mut pending: Vec<&Migration> = all
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();
    pending.sort_by_key(|m| m.version);
    pending
}
