//! Embedded (single-file SQLite) rating store
//!
//! Writers are serialized through an in-process async mutex, so concurrent
//! callers in one process never interleave their read-modify-write. Each
//! write and the aggregate it returns share one transaction. Readers go
//! straight to the pool; WAL mode lets them see every committed write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};
use sqlx::Row;
use std::path::Path;
use tally_common::db::{init_embedded_database, PoolSettings};
use tally_common::{Aggregate, Error, ItemMeta, Rating, RatingValue, Result, StorageBackend};
use tokio::sync::Mutex;
use tracing::debug;

use super::RatingStore;

pub struct EmbeddedRatingStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl EmbeddedRatingStore {
    /// Wrap an already-initialized pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Open (creating if needed) the database file and its schema
    pub async fn open(db_path: &Path, settings: &PoolSettings) -> Result<Self> {
        let pool = init_embedded_database(db_path, settings).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RatingStore for EmbeddedRatingStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Embedded
    }

    async fn upsert_rating(
        &self,
        item_id: &str,
        user_id: &str,
        value: RatingValue,
        meta: Option<&ItemMeta>,
    ) -> Result<Aggregate> {
        let meta_json = meta
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::Validation(format!("item metadata not serializable: {}", e)))?;
        let now = Utc::now();

        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        match insert_or_update(&mut *tx, item_id, user_id, value, meta_json.as_deref(), now).await {
            Ok(()) => {}
            Err(Error::ConflictIgnored(reason)) => {
                debug!(item_id, user_id, %reason, "Insert raced an existing row, updating in place");
                update_existing(&mut *tx, item_id, user_id, value, now).await?;
            }
            Err(err) => return Err(err),
        }

        let aggregate = aggregate_of(&mut *tx, item_id).await?;
        tx.commit().await?;

        Ok(aggregate)
    }

    async fn remove_rating(&self, item_id: &str, user_id: &str) -> Result<Aggregate> {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM ratings WHERE item_id = ? AND user_identifier = ?")
            .bind(item_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            debug!(item_id, user_id, "No rating to remove");
        }

        let aggregate = aggregate_of(&mut *tx, item_id).await?;
        tx.commit().await?;

        Ok(aggregate)
    }

    async fn get_aggregate(&self, item_id: &str) -> Result<Aggregate> {
        aggregate_of(&self.pool, item_id).await
    }

    async fn fetch_rating(&self, item_id: &str, user_id: &str) -> Result<Option<Rating>> {
        let row = sqlx::query(
            r#"
            SELECT item_id, user_identifier, value, item_meta, created_at, updated_at
            FROM ratings
            WHERE item_id = ? AND user_identifier = ?
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let meta_json: Option<String> = row.try_get("item_meta")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(Rating {
            item_id: row.try_get("item_id")?,
            user_identifier: row.try_get("user_identifier")?,
            value: RatingValue::from_stored(row.try_get("value")?)?,
            item_meta: meta_json.and_then(|json| serde_json::from_str(&json).ok()),
            created_at,
            updated_at,
        }))
    }
}

/// Single-statement upsert; a same-value resubmission matches the WHERE
/// clause of no row and changes nothing.
async fn insert_or_update(
    conn: &mut SqliteConnection,
    item_id: &str,
    user_id: &str,
    value: RatingValue,
    meta_json: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ratings (item_id, user_identifier, value, item_meta, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(item_id, user_identifier) DO UPDATE SET
            value = excluded.value,
            item_meta = COALESCE(excluded.item_meta, ratings.item_meta),
            updated_at = excluded.updated_at
        WHERE ratings.value != excluded.value
        "#,
    )
    .bind(item_id)
    .bind(user_id)
    .bind(value.as_i64())
    .bind(meta_json)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

async fn update_existing(
    conn: &mut SqliteConnection,
    item_id: &str,
    user_id: &str,
    value: RatingValue,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE ratings SET value = ?, updated_at = ? WHERE item_id = ? AND user_identifier = ? AND value != ?",
    )
    .bind(value.as_i64())
    .bind(now)
    .bind(item_id)
    .bind(user_id)
    .bind(value.as_i64())
    .execute(conn)
    .await?;

    Ok(())
}

async fn aggregate_of<'e, E>(executor: E, item_id: &str) -> Result<Aggregate>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (up, down): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN value = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN value = -1 THEN 1 ELSE 0 END), 0)
        FROM ratings
        WHERE item_id = ?
        "#,
    )
    .bind(item_id)
    .fetch_one(executor)
    .await?;

    Ok(Aggregate::new(up, down))
}
