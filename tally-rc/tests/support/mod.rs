//! Scripted rating API for controller tests
//!
//! Keeps ratings in memory with the server's set-or-clear semantics, counts
//! every call, and can be told to fail submissions or to hold submissions
//! and fetches until the test releases them.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tally_common::api::RateRequest;
use tally_common::{Aggregate, RatingSnapshot, RatingValue};
use tally_rc::{ClientError, RatingApi, Result};
use tokio::sync::Notify;

#[derive(Default)]
pub struct ScriptedApi {
    ratings: Mutex<HashMap<(String, String), RatingValue>>,
    pub submits: AtomicUsize,
    pub fetches: AtomicUsize,
    pub fail_submits: AtomicBool,
    /// When set, submissions wait for `release` before answering
    pub hold_submits: AtomicBool,
    pub submit_started: Notify,
    pub release: Notify,
    /// When set, fetches read the ratings first and then wait for
    /// `release_fetch` before answering
    pub hold_fetches: AtomicBool,
    pub fetch_started: Notify,
    pub release_fetch: Notify,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a rating as if another client had submitted it
    pub fn seed(&self, item_id: &str, user_id: &str, value: RatingValue) {
        self.ratings
            .lock()
            .unwrap()
            .insert((item_id.to_string(), user_id.to_string()), value);
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn aggregate(&self, item_id: &str) -> Aggregate {
        let ratings = self.ratings.lock().unwrap();
        let mut aggregate = Aggregate::default();
        for ((item, _), value) in ratings.iter() {
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
impl RatingApi for ScriptedApi {
    async fn submit_rating(&self, request: &RateRequest) -> Result<Aggregate> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submit_started.notify_one();

        if self.hold_submits.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("HTTP 503: Persistence unavailable".into()));
        }

        let key = (request.item_id.clone(), request.user_id.clone());
        match RatingValue::from_requested(request.value)? {
            Some(value) => {
                self.ratings.lock().unwrap().insert(key, value);
            }
            None => {
                self.ratings.lock().unwrap().remove(&key);
            }
        }
        Ok(self.aggregate(&request.item_id))
    }

    async fn fetch_rating(&self, item_id: &str, user_id: &str) -> Result<RatingSnapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let user_rating = self
            .ratings
            .lock()
            .unwrap()
            .get(&(item_id.to_string(), user_id.to_string()))
            .copied();

        let snapshot = RatingSnapshot {
            aggregate: self.aggregate(item_id),
            user_rating,
        };

        self.fetch_started.notify_one();
        if self.hold_fetches.load(Ordering::SeqCst) {
            self.release_fetch.notified().await;
        }
        Ok(snapshot)
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
