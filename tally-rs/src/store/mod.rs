//! Rating persistence
//!
//! One trait, two adapters. The backend is chosen once at startup from
//! configuration; nothing outside this module knows which one is running.
//!
//! Contract shared by both adapters:
//! - at most one row per (item_id, user_identifier), never a stored zero
//! - the aggregate returned by a write reflects that write
//! - every failure is either `PersistenceUnavailable` or, internally,
//!   `ConflictIgnored` (resolved by an in-place update before returning)

pub mod embedded;
pub mod relational;

use async_trait::async_trait;
use std::sync::Arc;
use tally_common::{Aggregate, ItemMeta, Rating, RatingValue, Result, StorageBackend};
use tracing::info;

use crate::config::{StorageConfig, StorageTarget};

pub use embedded::EmbeddedRatingStore;
pub use relational::RelationalRatingStore;

/// Durable per-(item, user) rating storage
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Which backend this adapter talks to (logging only)
    fn backend(&self) -> StorageBackend;

    /// Create or replace the user's rating and return the fresh aggregate
    ///
    /// Resubmitting the current value leaves the row untouched.
    async fn upsert_rating(
        &self,
        item_id: &str,
        user_id: &str,
        value: RatingValue,
        meta: Option<&ItemMeta>,
    ) -> Result<Aggregate>;

    /// Delete the user's rating if present and return the fresh aggregate
    async fn remove_rating(&self, item_id: &str, user_id: &str) -> Result<Aggregate>;

    /// Count up and down ratings for an item
    async fn get_aggregate(&self, item_id: &str) -> Result<Aggregate>;

    /// Read the full stored row, if any
    async fn fetch_rating(&self, item_id: &str, user_id: &str) -> Result<Option<Rating>>;

    async fn get_user_rating(&self, item_id: &str, user_id: &str) -> Result<Option<RatingValue>> {
        Ok(self.fetch_rating(item_id, user_id).await?.map(|rating| rating.value))
    }
}

/// Open the configured backend
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn RatingStore>> {
    let store: Arc<dyn RatingStore> = match &config.target {
        StorageTarget::Embedded(path) => {
            info!("Opening embedded rating store at {}", path.display());
            Arc::new(EmbeddedRatingStore::open(path, &config.pool).await?)
        }
        StorageTarget::Relational(url) => {
            info!("Connecting relational rating store");
            Arc::new(RelationalRatingStore::connect(url, &config.pool).await?)
        }
    };

    Ok(store)
}
