//! Event types and EventBus for Tally
//!
//! The metadata poller (an external collaborator) announces item changes on
//! the bus; the rating controller listens instead of polling a shared global.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{Aggregate, NowPlaying};

/// Tally event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TallyEvent {
    /// The currently playing item changed (`None` when nothing is playing)
    ///
    /// Triggers:
    /// - Rating controller: discard the old view, fetch the new item's rating
    CurrentItemChanged {
        item: Option<NowPlaying>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The server acknowledged a rating submission
    ///
    /// Triggers:
    /// - UI observers that display aggregates outside the rating widget
    RatingCommitted {
        item_id: String,
        aggregate: Aggregate,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TallyEvent {
    /// Event type string for logging
    pub fn event_type(&self) -> &str {
        match self {
            TallyEvent::CurrentItemChanged { .. } => "CurrentItemChanged",
            TallyEvent::RatingCommitted { .. } => "RatingCommitted",
        }
    }

    pub fn item_changed(item: Option<NowPlaying>) -> Self {
        TallyEvent::CurrentItemChanged {
            item,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn rating_committed(item_id: impl Into<String>, aggregate: Aggregate) -> Self {
        TallyEvent::RatingCommitted {
            item_id: item_id.into(),
            aggregate,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use tally_common::events::{EventBus, TallyEvent};
/// use tally_common::NowPlaying;
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit(TallyEvent::item_changed(Some(NowPlaying::new("song-42", "Artist", "Title"))))
///     .ok();
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TallyEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TallyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TallyEvent) -> Result<usize, broadcast::error::SendError<TallyEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: TallyEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
