//! Shared fixtures for tally-rs integration tests
//!
//! Every test runs against a fresh embedded store in a temporary directory.
//! When `TALLY_TEST_POSTGRES_URL` points at a reachable PostgreSQL database
//! the same test also runs against the relational store; item ids are unique
//! per call so runs never see each other's rows.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tally_common::db::PoolSettings;
use tally_rs::store::{EmbeddedRatingStore, RatingStore, RelationalRatingStore};
use tally_rs::RatingService;
use tempfile::TempDir;
use uuid::Uuid;

pub const POSTGRES_URL_ENV: &str = "TALLY_TEST_POSTGRES_URL";

/// A store under test plus whatever keeps it alive
pub struct TestStore {
    pub name: &'static str,
    pub store: Arc<dyn RatingStore>,
    _dir: Option<TempDir>,
}

impl TestStore {
    pub fn service(&self) -> RatingService {
        RatingService::new(Arc::clone(&self.store), Duration::from_secs(5))
    }
}

pub async fn embedded_store() -> TestStore {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = EmbeddedRatingStore::open(&dir.path().join("tally.db"), &PoolSettings::default())
        .await
        .expect("Failed to open embedded store");

    TestStore {
        name: "embedded",
        store: Arc::new(store),
        _dir: Some(dir),
    }
}

/// Relational store, when a test database is configured
pub async fn relational_store() -> Option<TestStore> {
    let url = std::env::var(POSTGRES_URL_ENV).ok()?;
    let store = RelationalRatingStore::connect(&url, &PoolSettings::default())
        .await
        .expect("TALLY_TEST_POSTGRES_URL is set but the database is unreachable");

    Some(TestStore {
        name: "relational",
        store: Arc::new(store),
        _dir: None,
    })
}

/// Embedded store always, relational store when configured
pub async fn all_stores() -> Vec<TestStore> {
    let mut stores = vec![embedded_store().await];
    if let Some(relational) = relational_store().await {
        stores.push(relational);
    }
    stores
}

/// Item id no other test (or earlier run) has used
pub fn unique_item(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}
