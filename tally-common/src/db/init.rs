//! Database initialization
//!
//! Creates the `ratings` table (and the `schema_version` bookkeeping table)
//! on first run for either backend. All statements are idempotent, so every
//! process may run them at startup.
//!
//! Both layouts enforce the same invariants:
//! - one row per (item_id, user_identifier)
//! - value restricted to -1 or 1 (clearing a rating deletes the row)

use crate::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Connection pool sizing shared by both backends
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Upper bound on concurrently open connections
    pub max_connections: u32,
    /// How long to wait for a free connection (and, for SQLite, a file lock)
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Open (creating if needed) the embedded SQLite store
pub async fn init_embedded_database(db_path: &Path, settings: &PoolSettings) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL lets readers proceed while the single writer commits; the busy
    // timeout applies to every pooled connection, not only the first.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(settings.acquire_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_embedded_schema(&pool).await?;

    Ok(pool)
}

async fn create_embedded_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id TEXT NOT NULL,
            user_identifier TEXT NOT NULL,
            value INTEGER NOT NULL CHECK (value IN (-1, 1)),
            item_meta TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (item_id, user_identifier)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ratings_item_id ON ratings(item_id)")
        .execute(pool)
        .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

/// Connect to the relational PostgreSQL store and ensure its schema
pub async fn init_relational_database(database_url: &str, settings: &PoolSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(database_url)
        .await?;

    info!(
        "Connected to relational database (max {} connections)",
        settings.max_connections
    );

    create_relational_schema(&pool).await?;

    Ok(pool)
}

/// Advisory lock key serializing schema creation across processes
const SCHEMA_LOCK_KEY: i64 = 0x7461_6c6c_79;

async fn create_relational_schema(pool: &PgPool) -> Result<()> {
    // Concurrent CREATE ... IF NOT EXISTS can still collide in the catalog
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version BIGINT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ratings (
            id UUID PRIMARY KEY,
            item_id TEXT NOT NULL,
            user_identifier TEXT NOT NULL,
            value SMALLINT NOT NULL CHECK (value IN (-1, 1)),
            item_meta JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            CONSTRAINT ratings_item_user_key UNIQUE (item_id, user_identifier)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ratings_item_id ON ratings(item_id)")
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO schema_version (version) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
