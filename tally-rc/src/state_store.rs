//! Reactive state store
//!
//! Keyed pub/sub over JSON values. Subscribers are notified only when a
//! value actually changes, and always outside the internal lock so a
//! callback may read or write the store itself. Per-key guards can veto a
//! write before it lands.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::{ClientError, Result};

/// Well-known state paths
pub mod paths {
    pub const RATING_ITEM_ID: &str = "rating.itemId";
    pub const RATING_USER_RATING: &str = "rating.userRating";
    pub const RATING_THUMBS_UP: &str = "rating.thumbsUp";
    pub const RATING_THUMBS_DOWN: &str = "rating.thumbsDown";
    pub const RATING_ERROR: &str = "rating.error";
    pub const RATING_PHASE: &str = "rating.phase";
    pub const PLAYBACK_ELAPSED: &str = "playback.elapsed";
    pub const PLAYBACK_PLAYING: &str = "playback.playing";
}

/// Change callback; receives the new value
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Write guard; receives the proposed value and a view of the current state
pub type Guard = Arc<dyn Fn(&Value, &StateView<'_>) -> std::result::Result<(), String> + Send + Sync>;

/// Read-only view of the store handed to guards
pub struct StateView<'a> {
    values: &'a HashMap<String, Value>,
}

impl StateView<'_> {
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<(u64, Callback)>>,
    guards: HashMap<String, Vec<Guard>>,
    next_subscription: u64,
}

/// Shared, cloneable handle to one store
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking callback never runs under the lock, so the map is
        // still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write a value
    ///
    /// Returns `Ok(true)` if the value changed (subscribers were notified),
    /// `Ok(false)` if it was already equal, and `GuardRejected` if a guard
    /// refused it, in which case the stored value is untouched.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();

        let callbacks: Vec<Callback> = {
            let mut inner = self.lock();

            if let Some(guards) = inner.guards.get(path) {
                let view = StateView {
                    values: &inner.values,
                };
                for guard in guards {
                    guard(&value, &view).map_err(|reason| ClientError::GuardRejected {
                        path: path.to_string(),
                        reason,
                    })?;
                }
            }

            if inner.values.get(path) == Some(&value) {
                return Ok(false);
            }
            inner.values.insert(path.to_string(), value.clone());

            inner
                .subscribers
                .get(path)
                .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        for callback in callbacks {
            callback(&value);
        }
        Ok(true)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.lock().values.get(path).cloned()
    }

    /// Read and deserialize; `None` if absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path).and_then(|value| serde_json::from_value(value).ok())
    }

    /// Register a change callback for one path
    pub fn subscribe<F>(&self, path: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let mut inner = self.lock();
        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner
            .subscribers
            .entry(path.to_string())
            .or_default()
            .push((id, callback));

        Subscription {
            store: Arc::downgrade(&self.inner),
            path: path.to_string(),
            id,
        }
    }

    /// Register a write guard for one path
    pub fn add_guard(&self, path: &str, guard: Guard) {
        self.lock()
            .guards
            .entry(path.to_string())
            .or_default()
            .push(guard);
    }

    pub fn subscriber_count(&self, path: &str) -> usize {
        self.lock().subscribers.get(path).map_or(0, Vec::len)
    }
}

/// Handle returned by [`StateStore::subscribe`]
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    store: Weak<Mutex<Inner>>,
    path: String,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(subs) = inner.subscribers.get_mut(&self.path) {
            subs.retain(|(id, _)| *id != self.id);
            if subs.is_empty() {
                inner.subscribers.remove(&self.path);
            }
        }
    }
}

/// Guard for a monotonic elapsed counter: it may only become non-zero while
/// the flag at `active_path` is `true`
pub fn elapsed_requires_activity(active_path: &str) -> Guard {
    let active_path = active_path.to_string();
    Arc::new(move |value: &Value, view: &StateView<'_>| {
        let is_zero = value.as_f64().map_or(true, |elapsed| elapsed == 0.0);
        let active = view
            .get(&active_path)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if is_zero || active {
            Ok(())
        } else {
            Err(format!("elapsed time cannot advance while {} is not true", active_path))
        }
    })
}

/// Install the guards every client store carries
pub fn install_default_guards(store: &StateStore) {
    store.add_guard(
        paths::PLAYBACK_ELAPSED,
        elapsed_requires_activity(paths::PLAYBACK_PLAYING),
    );
}
