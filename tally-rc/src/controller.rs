//! Client optimistic rating controller
//!
//! A like/dislike tap is applied to the local view immediately, then sent to
//! the server. The server aggregate overwrites the prediction on success; on
//! failure the view returns to the last snapshot the server confirmed and an
//! authoritative fetch follows.
//!
//! ```text
//! Idle ──rate──▶ Predicting ──send──▶ Reconciling ──ok──▶ Committed
//!                                          │
//!                                          └──err──▶ RolledBack ──refetch──▶ Idle
//! ```
//!
//! Tapping the current value again clears it (toggle). Taps within the
//! cooldown of the last accepted one, or while a submission is in flight,
//! are dropped. Responses for an item that is no longer current are
//! discarded without touching state, and so is a fetch that was requested
//! before the latest local rating change.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tally_common::api::RateRequest;
use tally_common::events::{EventBus, TallyEvent};
use tally_common::{Aggregate, ItemMeta, NowPlaying, RatingSnapshot, RatingValue};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api_client::RatingApi;
use crate::error::{ClientError, Result};
use crate::state_store::{paths, StateStore};

/// Controller timing options
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Minimum spacing between accepted submissions for one item
    pub cooldown: Duration,
    /// How long a failure message stays visible
    pub error_ttl: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(1),
            error_ttl: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingIntent {
    Like,
    Dislike,
}

impl RatingIntent {
    pub fn value(self) -> RatingValue {
        match self {
            RatingIntent::Like => RatingValue::Up,
            RatingIntent::Dislike => RatingValue::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Predicting,
    Reconciling,
    Committed,
    RolledBack,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Predicting => "predicting",
            Phase::Reconciling => "reconciling",
            Phase::Committed => "committed",
            Phase::RolledBack => "rolledBack",
        }
    }
}

/// What became of one `rate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateOutcome {
    /// The server accepted it; the view shows this aggregate
    Committed(Aggregate),
    /// The server call failed; the view was restored and re-fetched
    RolledBack,
    /// Dropped by the cooldown or an in-flight submission
    Throttled,
    /// The item changed before the response arrived
    Stale,
    /// Refused before any local change
    Rejected(String),
    /// Nothing is playing
    NoItem,
}

/// Client-side shadow of one item's rating
#[derive(Debug, Clone)]
pub struct ClientRatingView {
    pub item_id: String,
    pub item_meta: ItemMeta,
    pub user_rating: Option<RatingValue>,
    pub aggregate: Aggregate,
    pub phase: Phase,
    pub last_rating_time: Option<Instant>,
    /// Last state the server confirmed; rollback target
    pub last_known_good: RatingSnapshot,
}

impl ClientRatingView {
    fn new(item: NowPlaying) -> Self {
        Self {
            item_id: item.item_id,
            item_meta: item.meta,
            user_rating: None,
            aggregate: Aggregate::default(),
            phase: Phase::Idle,
            last_rating_time: None,
            last_known_good: RatingSnapshot::default(),
        }
    }

    fn apply_snapshot(&mut self, snapshot: RatingSnapshot) {
        self.aggregate = snapshot.aggregate;
        self.user_rating = snapshot.user_rating;
        self.last_known_good = snapshot;
    }
}

struct Inner {
    view: Option<ClientRatingView>,
    /// Bumped on every item change; responses carry the epoch they were
    /// requested under
    epoch: u64,
    /// Bumped on every prediction, commit and rollback; a fetch answered
    /// under an older revision predates the view and is dropped
    revision: u64,
}

pub struct RatingController {
    api: Arc<dyn RatingApi>,
    state: StateStore,
    user_id: String,
    config: ControllerConfig,
    events: Option<EventBus>,
    inner: Mutex<Inner>,
    error_generation: Arc<AtomicU64>,
}

impl RatingController {
    pub fn new(
        api: Arc<dyn RatingApi>,
        state: StateStore,
        user_id: impl Into<String>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            api,
            state,
            user_id: user_id.into(),
            config,
            events: None,
            inner: Mutex::new(Inner {
                view: None,
                epoch: 0,
                revision: 0,
            }),
            error_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Announce committed ratings on `bus`
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Copy of the current view, if an item is set
    pub fn view(&self) -> Option<ClientRatingView> {
        self.lock().view.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switch to a new current item (or none)
    ///
    /// Re-announcing the current item keeps its view. A new item gets a fresh
    /// view followed by an authoritative fetch.
    pub async fn set_current_item(&self, item: Option<NowPlaying>) {
        let view = {
            let mut inner = self.lock();
            let current_id = inner.view.as_ref().map(|view| view.item_id.as_str());
            if current_id == item.as_ref().map(|item| item.item_id.as_str()) {
                return;
            }
            inner.epoch += 1;
            inner.view = item.map(ClientRatingView::new);
            inner.view.clone()
        };

        match &view {
            Some(view) => info!(item_id = %view.item_id, "Current item changed"),
            None => info!("Current item cleared"),
        }
        self.publish(view.as_ref());

        if view.is_some() {
            if let Err(err) = self.refresh().await {
                warn!(error = %err, "Rating fetch for new item failed");
            }
        }
    }

    /// Fetch the authoritative rating for the current item
    ///
    /// A response for an item that is no longer current is dropped, as is
    /// one that raced a local rating change for the same item.
    pub async fn refresh(&self) -> Result<()> {
        let (item_id, epoch, revision) = {
            let inner = self.lock();
            match &inner.view {
                Some(view) => (view.item_id.clone(), inner.epoch, inner.revision),
                None => return Ok(()),
            }
        };
        if self.user_id.trim().is_empty() {
            return Err(ClientError::Validation("userId must not be empty".into()));
        }

        let snapshot = self.api.fetch_rating(&item_id, &self.user_id).await?;

        let view = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                debug!(item_id = %item_id, "Discarding rating fetch for previous item");
                return Ok(());
            }
            if inner.revision != revision {
                debug!(item_id = %item_id, "Discarding rating fetch older than local change");
                return Ok(());
            }
            let Some(view) = inner.view.as_mut() else {
                return Ok(());
            };
            view.apply_snapshot(snapshot);
            if view.phase == Phase::RolledBack {
                view.phase = Phase::Idle;
            }
            view.clone()
        };

        self.publish(Some(&view));
        Ok(())
    }

    /// Handle a like/dislike tap
    pub async fn rate(&self, intent: RatingIntent) -> RateOutcome {
        if self.user_id.trim().is_empty() {
            return RateOutcome::Rejected("userId must not be empty".into());
        }

        // Predict
        let (request, epoch, predicted) = {
            let mut inner = self.lock();
            let epoch = inner.epoch;
            let Some(view) = inner.view.as_mut() else {
                return RateOutcome::NoItem;
            };
            if view.item_id.trim().is_empty() {
                return RateOutcome::Rejected("itemId must not be empty".into());
            }
            if matches!(view.phase, Phase::Predicting | Phase::Reconciling) {
                debug!(item_id = %view.item_id, "Rating submission already in flight");
                return RateOutcome::Throttled;
            }
            if let Some(last) = view.last_rating_time {
                if last.elapsed() < self.config.cooldown {
                    debug!(item_id = %view.item_id, "Rating tap inside cooldown dropped");
                    return RateOutcome::Throttled;
                }
            }

            let target = match view.user_rating {
                Some(current) if current == intent.value() => None,
                _ => Some(intent.value()),
            };

            view.aggregate = view.aggregate.apply_change(view.user_rating, target);
            view.user_rating = target;
            view.last_rating_time = Some(Instant::now());
            view.phase = Phase::Predicting;
            let view = view.clone();
            inner.revision += 1;

            let request = RateRequest {
                item_id: view.item_id.clone(),
                item_meta: view.item_meta.clone(),
                value: target.map_or(0, RatingValue::as_i64),
                user_id: self.user_id.clone(),
            };
            (request, epoch, view)
        };

        self.publish(Some(&predicted));

        // Reconcile
        if !self.set_phase(epoch, Phase::Reconciling) {
            return RateOutcome::Stale;
        }

        let result = self.api.submit_rating(&request).await;

        let settled = {
            let mut inner = self.lock();
            let current = inner.epoch == epoch;
            if current {
                inner.revision += 1;
            }
            match inner.view.as_mut() {
                Some(view) if current => {
                    match &result {
                        Ok(aggregate) => {
                            view.apply_snapshot(RatingSnapshot {
                                aggregate: *aggregate,
                                user_rating: predicted.user_rating,
                            });
                            view.phase = Phase::Committed;
                        }
                        Err(_) => {
                            let last_known_good = view.last_known_good;
                            view.aggregate = last_known_good.aggregate;
                            view.user_rating = last_known_good.user_rating;
                            view.phase = Phase::RolledBack;
                        }
                    }
                    Some(view.clone())
                }
                _ => None,
            }
        };

        let Some(view) = settled else {
            debug!(item_id = %request.item_id, "Discarding rating response for previous item");
            return RateOutcome::Stale;
        };
        self.publish(Some(&view));

        match result {
            Ok(aggregate) => {
                debug!(
                    item_id = %request.item_id,
                    up = aggregate.up,
                    down = aggregate.down,
                    "Rating committed"
                );
                if let Some(bus) = &self.events {
                    bus.emit_lossy(TallyEvent::rating_committed(request.item_id, aggregate));
                }
                RateOutcome::Committed(aggregate)
            }
            Err(err) => {
                warn!(item_id = %request.item_id, error = %err, "Rating submission failed, rolling back");
                self.show_error(&err);

                if let Err(fetch_err) = self.refresh().await {
                    warn!(error = %fetch_err, "Re-fetch after rollback failed");
                    self.set_phase(epoch, Phase::Idle);
                }
                RateOutcome::RolledBack
            }
        }
    }

    /// Follow current-item announcements on `bus` until it closes
    pub fn run_item_listener(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(TallyEvent::CurrentItemChanged { item, .. }) => {
                        self.set_current_item(item).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Item listener lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Item listener stopped");
        })
    }

    /// Update the phase if the item is still current; false when stale
    fn set_phase(&self, epoch: u64, phase: Phase) -> bool {
        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return false;
            }
            match inner.view.as_mut() {
                Some(view) => view.phase = phase,
                None => return false,
            }
        }
        self.write(paths::RATING_PHASE, phase.as_str());
        true
    }

    /// Show a failure message that clears itself after `error_ttl`
    fn show_error(&self, err: &ClientError) {
        let generation = self.error_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.write(paths::RATING_ERROR, err.to_string());

        let state = self.state.clone();
        let current = Arc::clone(&self.error_generation);
        let ttl = self.config.error_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            // A newer message owns the slot now
            if current.load(Ordering::SeqCst) == generation {
                let _ = state.set(paths::RATING_ERROR, Value::Null);
            }
        });
    }

    fn publish(&self, view: Option<&ClientRatingView>) {
        match view {
            Some(view) => {
                self.write(paths::RATING_ITEM_ID, view.item_id.as_str());
                self.write(
                    paths::RATING_USER_RATING,
                    view.user_rating.map_or(Value::Null, |v| v.as_i64().into()),
                );
                self.write(paths::RATING_THUMBS_UP, view.aggregate.up);
                self.write(paths::RATING_THUMBS_DOWN, view.aggregate.down);
                self.write(paths::RATING_PHASE, view.phase.as_str());
            }
            None => {
                self.write(paths::RATING_ITEM_ID, Value::Null);
                self.write(paths::RATING_USER_RATING, Value::Null);
                self.write(paths::RATING_THUMBS_UP, 0);
                self.write(paths::RATING_THUMBS_DOWN, 0);
                self.write(paths::RATING_PHASE, Phase::Idle.as_str());
            }
        }
    }

    fn write(&self, path: &str, value: impl Into<Value>) {
        if let Err(err) = self.state.set(path, value) {
            warn!(path, error = %err, "State write rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::RolledBack.as_str(), "rolledBack");
        assert_eq!(Phase::Idle.as_str(), "idle");
    }

    #[test]
    fn test_intent_values() {
        assert_eq!(RatingIntent::Like.value(), RatingValue::Up);
        assert_eq!(RatingIntent::Dislike.value(), RatingValue::Down);
    }

    #[test]
    fn test_default_timings() {
        let config = ControllerConfig::default();
        assert_eq!(config.cooldown, Duration::from_secs(1));
        assert_eq!(config.error_ttl, Duration::from_secs(3));
    }
}
