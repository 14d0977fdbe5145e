//! Relational (PostgreSQL) rating store
//!
//! Multi-writer: any number of processes may share the database. Race
//! safety for first-time raters comes from the `ratings_item_user_key`
//! unique constraint together with a single `INSERT ... ON CONFLICT DO
//! UPDATE` statement, which takes the row lock instead of failing. The pool
//! is bounded; an exhausted pool surfaces as `PersistenceUnavailable`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::types::Json;
use sqlx::Row;
use tally_common::db::{init_relational_database, PoolSettings};
use tally_common::{Aggregate, Error, ItemMeta, Rating, RatingValue, Result, StorageBackend};
use tracing::debug;
use uuid::Uuid;

use super::RatingStore;

pub struct RelationalRatingStore {
    pool: PgPool,
}

impl RelationalRatingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a bounded pool and ensure the schema exists
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<Self> {
        let pool = init_relational_database(database_url, settings).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn update_existing(
        &self,
        item_id: &str,
        user_id: &str,
        value: RatingValue,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ratings SET value = $3, updated_at = $4
            WHERE item_id = $1 AND user_identifier = $2 AND value <> $3
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .bind(stored_value(value))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn stored_value(value: RatingValue) -> i16 {
    value.as_i64() as i16
}

#[async_trait]
impl RatingStore for RelationalRatingStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Relational
    }

    async fn upsert_rating(
        &self,
        item_id: &str,
        user_id: &str,
        value: RatingValue,
        meta: Option<&ItemMeta>,
    ) -> Result<Aggregate> {
        let now = Utc::now();

        // The generated id is only used when this statement inserts.
        let result = sqlx::query(
            r#"
            INSERT INTO ratings (id, item_id, user_identifier, value, item_meta, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (item_id, user_identifier) DO UPDATE SET
                value = EXCLUDED.value,
                item_meta = COALESCE(EXCLUDED.item_meta, ratings.item_meta),
                updated_at = EXCLUDED.updated_at
            WHERE ratings.value <> EXCLUDED.value
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item_id)
        .bind(user_id)
        .bind(stored_value(value))
        .bind(meta.map(Json))
        .bind(now)
        .execute(&self.pool)
        .await;

        match result.map_err(Error::from) {
            Ok(_) => {}
            Err(Error::ConflictIgnored(reason)) => {
                debug!(item_id, user_id, %reason, "Insert raced an existing row, updating in place");
                self.update_existing(item_id, user_id, value, now).await?;
            }
            Err(err) => return Err(err),
        }

        // Read committed: this sees our write plus every other committed one.
        aggregate_of(&self.pool, item_id).await
    }

    async fn remove_rating(&self, item_id: &str, user_id: &str) -> Result<Aggregate> {
        let removed = sqlx::query("DELETE FROM ratings WHERE item_id = $1 AND user_identifier = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if removed == 0 {
            debug!(item_id, user_id, "No rating to remove");
        }

        aggregate_of(&self.pool, item_id).await
    }

    async fn get_aggregate(&self, item_id: &str) -> Result<Aggregate> {
        aggregate_of(&self.pool, item_id).await
    }

    async fn fetch_rating(&self, item_id: &str, user_id: &str) -> Result<Option<Rating>> {
        let row = sqlx::query(
            r#"
            SELECT item_id, user_identifier, value, item_meta, created_at, updated_at
            FROM ratings
            WHERE item_id = $1 AND user_identifier = $2
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: i16 = row.try_get("value")?;
        let meta: Option<Json<ItemMeta>> = row.try_get("item_meta")?;

        Ok(Some(Rating {
            item_id: row.try_get("item_id")?,
            user_identifier: row.try_get("user_identifier")?,
            value: RatingValue::from_stored(i64::from(value))?,
            item_meta: meta.map(|Json(meta)| meta),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

async fn aggregate_of<'e, E>(executor: E, item_id: &str) -> Result<Aggregate>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let (up, down): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE value = 1),
            COUNT(*) FILTER (WHERE value = -1)
        FROM ratings
        WHERE item_id = $1
        "#,
    )
    .bind(item_id)
    .fetch_one(executor)
    .await?;

    Ok(Aggregate::new(up, down))
}
