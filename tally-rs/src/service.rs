//! Rating aggregator
//!
//! Validates a rating request, turns it into the matching store operation
//! and hands back the aggregate that write produced. The server contract is
//! literal set-or-clear: `+1`/`-1` set the user's rating, `0` clears it.
//! Toggling is the client's job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tally_common::{Aggregate, Error, ItemMeta, RatingSnapshot, RatingValue, Result, StorageBackend};
use tracing::{debug, warn};

use crate::store::RatingStore;

pub struct RatingService {
    store: Arc<dyn RatingStore>,
    timeout: Duration,
}

impl RatingService {
    /// `timeout` bounds each store call; expiry is `PersistenceUnavailable`
    pub fn new(store: Arc<dyn RatingStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn backend(&self) -> StorageBackend {
        self.store.backend()
    }

    /// Apply a rating request and return the fresh aggregate
    ///
    /// Resubmitting the current value is a no-op that returns the same
    /// aggregate. Clearing a rating that does not exist is also a no-op.
    pub async fn rate(
        &self,
        item_id: &str,
        item_meta: &ItemMeta,
        user_id: &str,
        requested_value: i64,
    ) -> Result<Aggregate> {
        require_id("itemId", item_id)?;
        require_id("userId", user_id)?;
        let value = RatingValue::from_requested(requested_value)?;

        debug!(item_id, user_id, value = requested_value, "Rating request");

        let meta = (!item_meta.artist.is_empty() || !item_meta.title.is_empty()).then_some(item_meta);

        let result = match value {
            Some(value) => {
                self.bounded("upsert_rating", self.store.upsert_rating(item_id, user_id, value, meta))
                    .await
            }
            None => {
                self.bounded("remove_rating", self.store.remove_rating(item_id, user_id))
                    .await
            }
        };

        match result {
            Ok(aggregate) => {
                debug!(item_id, up = aggregate.up, down = aggregate.down, "Rating stored");
                Ok(aggregate)
            }
            Err(err) => {
                warn!(item_id, user_id, value = requested_value, error = %err, "Rating request failed");
                Err(err)
            }
        }
    }

    /// Current aggregate plus the user's own rating (when a user is given)
    pub async fn read(&self, item_id: &str, user_id: Option<&str>) -> Result<RatingSnapshot> {
        require_id("itemId", item_id)?;
        let user_id = user_id.filter(|id| !id.trim().is_empty());

        let result = async {
            let aggregate = self
                .bounded("get_aggregate", self.store.get_aggregate(item_id))
                .await?;
            let user_rating = match user_id {
                Some(user_id) => {
                    self.bounded("get_user_rating", self.store.get_user_rating(item_id, user_id))
                        .await?
                }
                None => None,
            };
            Ok::<_, Error>(RatingSnapshot {
                aggregate,
                user_rating,
            })
        }
        .await;

        if let Err(err) = &result {
            warn!(item_id, user_id, error = %err, "Rating read failed");
        }
        result
    }

    /// Run one store call under the configured timeout
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            // Adapters resolve uniqueness races themselves; one that escapes
            // is treated like any other store failure.
            Ok(Err(Error::ConflictIgnored(reason))) => {
                warn!(operation, %reason, "Unresolved rating conflict");
                Err(Error::PersistenceUnavailable(format!(
                    "{} conflicted with a concurrent write",
                    operation
                )))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(Error::PersistenceUnavailable(format!(
                "{} timed out after {} ms",
                operation,
                self.timeout.as_millis()
            ))),
        }
    }
}

fn require_id(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tally_common::Rating;

    /// In-memory store that counts every call
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<(String, String), RatingValue>>,
        calls: AtomicUsize,
        last_meta: Mutex<Option<ItemMeta>>,
    }

    impl MemoryStore {
        fn aggregate(&self, item_id: &str) -> Aggregate {
            let rows = self.rows.lock().unwrap();
            let mut aggregate = Aggregate::default();
            for ((item, _), value) in rows.iter() {
                if item == item_id {
                    match value {
                        RatingValue::Up => aggregate.up += 1,
                        RatingValue::Down => aggregate.down += 1,
                    }
                }
            }
            aggregate
        }
    }

    #[async_trait]
    impl RatingStore for MemoryStore {
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
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_meta.lock().unwrap() = meta.cloned();
            self.rows
                .lock()
                .unwrap()
                .insert((item_id.to_string(), user_id.to_string()), value);
            Ok(self.aggregate(item_id))
        }

        async fn remove_rating(&self, item_id: &str, user_id: &str) -> Result<Aggregate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rows
                .lock()
                .unwrap()
                .remove(&(item_id.to_string(), user_id.to_string()));
            Ok(self.aggregate(item_id))
        }

        async fn get_aggregate(&self, item_id: &str) -> Result<Aggregate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.aggregate(item_id))
        }

        async fn fetch_rating(&self, item_id: &str, user_id: &str) -> Result<Option<Rating>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .get(&(item_id.to_string(), user_id.to_string()))
                .map(|value| Rating {
                    item_id: item_id.to_string(),
                    user_identifier: user_id.to_string(),
                    value: *value,
                    item_meta: None,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                }))
        }
    }

    /// Store whose calls never finish in time
    struct StalledStore;

    #[async_trait]
    impl RatingStore for StalledStore {
        fn backend(&self) -> StorageBackend {
            StorageBackend::Relational
        }

        async fn upsert_rating(
            &self,
            _item_id: &str,
            _user_id: &str,
            _value: RatingValue,
            _meta: Option<&ItemMeta>,
        ) -> Result<Aggregate> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Aggregate::default())
        }

        async fn remove_rating(&self, _item_id: &str, _user_id: &str) -> Result<Aggregate> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Aggregate::default())
        }

        async fn get_aggregate(&self, _item_id: &str) -> Result<Aggregate> {
            Err(Error::ConflictIgnored("duplicate key".into()))
        }

        async fn fetch_rating(&self, _item_id: &str, _user_id: &str) -> Result<Option<Rating>> {
            Ok(None)
        }
    }

    fn service(store: Arc<MemoryStore>) -> RatingService {
        RatingService::new(store, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_invalid_value_never_reaches_store() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        for bad in [2, -2, 7] {
            let err = service
                .rate("song-1", &ItemMeta::default(), "u1", bad)
                .await
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_ids_rejected() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        assert!(service
            .rate("  ", &ItemMeta::default(), "u1", 1)
            .await
            .unwrap_err()
            .is_validation());
        assert!(service
            .rate("song-1", &ItemMeta::default(), "", 1)
            .await
            .unwrap_err()
            .is_validation());
        assert!(service.read("", Some("u1")).await.unwrap_err().is_validation());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_clears_and_nonzero_sets() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store);

        let agg = service.rate("song-1", &ItemMeta::default(), "u1", 1).await.unwrap();
        assert_eq!(agg, Aggregate::new(1, 0));

        let agg = service.rate("song-1", &ItemMeta::default(), "u1", -1).await.unwrap();
        assert_eq!(agg, Aggregate::new(0, 1));

        let agg = service.rate("song-1", &ItemMeta::default(), "u1", 0).await.unwrap();
        assert_eq!(agg, Aggregate::new(0, 0));
    }

    #[tokio::test]
    async fn test_empty_meta_not_forwarded() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());

        service.rate("song-1", &ItemMeta::default(), "u1", 1).await.unwrap();
        assert_eq!(*store.last_meta.lock().unwrap(), None);

        let meta = ItemMeta {
            artist: "Artist".into(),
            title: String::new(),
        };
        service.rate("song-1", &meta, "u1", -1).await.unwrap();
        assert_eq!(*store.last_meta.lock().unwrap(), Some(meta));
    }

    #[tokio::test]
    async fn test_read_without_user_skips_user_lookup() {
        let store = Arc::new(MemoryStore::default());
        let service = service(store.clone());
        service.rate("song-1", &ItemMeta::default(), "u1", 1).await.unwrap();
        let before = store.calls.load(Ordering::SeqCst);

        let snapshot = service.read("song-1", None).await.unwrap();
        assert_eq!(snapshot.aggregate, Aggregate::new(1, 0));
        assert_eq!(snapshot.user_rating, None);
        assert_eq!(store.calls.load(Ordering::SeqCst), before + 1);

        let snapshot = service.read("song-1", Some("u1")).await.unwrap();
        assert_eq!(snapshot.user_rating, Some(RatingValue::Up));
    }

    #[tokio::test]
    async fn test_store_timeout_is_persistence_unavailable() {
        let service = RatingService::new(Arc::new(StalledStore), Duration::from_millis(50));

        let err = service
            .rate("song-1", &ItemMeta::default(), "u1", 1)
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "expected PersistenceUnavailable, got {:?}", err);

        let err = service
            .rate("song-1", &ItemMeta::default(), "u1", 0)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_escaped_conflict_reported_as_unavailable() {
        let service = RatingService::new(Arc::new(StalledStore), Duration::from_millis(50));

        let err = service.read("song-1", None).await.unwrap_err();
        assert!(matches!(err, Error::PersistenceUnavailable(_)));
    }
}
