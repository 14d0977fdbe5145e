//! Rating data model
//!
//! A stored rating is always non-zero: "no rating" is the absence of a row.
//! Aggregates are derived and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// A non-zero rating value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum RatingValue {
    /// Thumbs down (-1)
    Down,
    /// Thumbs up (+1)
    Up,
}

impl RatingValue {
    pub fn as_i64(self) -> i64 {
        match self {
            RatingValue::Down => -1,
            RatingValue::Up => 1,
        }
    }

    /// Parse a requested value: `-1`/`+1` set a rating, `0` clears it
    ///
    /// Any other value is a validation error.
    pub fn from_requested(value: i64) -> Result<Option<Self>> {
        match value {
            -1 => Ok(Some(RatingValue::Down)),
            0 => Ok(None),
            1 => Ok(Some(RatingValue::Up)),
            other => Err(Error::Validation(format!(
                "rating value must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }

    /// Decode a value read back from a store
    ///
    /// Both schemas reject anything but -1 and 1, so a different value means
    /// the store itself is broken.
    pub fn from_stored(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(RatingValue::Down),
            1 => Ok(RatingValue::Up),
            other => Err(Error::PersistenceUnavailable(format!(
                "stored rating value {} is out of range",
                other
            ))),
        }
    }
}

impl From<RatingValue> for i8 {
    fn from(value: RatingValue) -> Self {
        value.as_i64() as i8
    }
}

impl TryFrom<i8> for RatingValue {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(RatingValue::Down),
            1 => Ok(RatingValue::Up),
            other => Err(format!("invalid rating value {}", other)),
        }
    }
}

/// Positive and negative rating totals for one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    #[serde(rename = "thumbsUp")]
    pub up: i64,
    #[serde(rename = "thumbsDown")]
    pub down: i64,
}

impl Aggregate {
    pub fn new(up: i64, down: i64) -> Self {
        Self { up, down }
    }

    /// Predict the aggregate after one user's rating moves from `previous` to `next`
    ///
    /// Buckets never go below zero.
    pub fn apply_change(self, previous: Option<RatingValue>, next: Option<RatingValue>) -> Self {
        let mut predicted = self;
        match previous {
            Some(RatingValue::Up) => predicted.up = (predicted.up - 1).max(0),
            Some(RatingValue::Down) => predicted.down = (predicted.down - 1).max(0),
            None => {}
        }
        match next {
            Some(RatingValue::Up) => predicted.up += 1,
            Some(RatingValue::Down) => predicted.down += 1,
            None => {}
        }
        predicted
    }
}

/// Item metadata carried alongside a rating, unused by aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
}

/// One stored rating row
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    pub item_id: String,
    pub user_identifier: String,
    pub value: RatingValue,
    pub item_meta: Option<ItemMeta>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate plus the requesting user's own rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingSnapshot {
    pub aggregate: Aggregate,
    pub user_rating: Option<RatingValue>,
}

/// The item currently playing, as announced by the metadata poller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub item_id: String,
    #[serde(default)]
    pub meta: ItemMeta,
}

impl NowPlaying {
    pub fn new(item_id: impl Into<String>, artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            meta: ItemMeta {
                artist: artist.into(),
                title: title.into(),
            },
        }
    }
}

/// Which storage backend a deployment runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single-file SQLite store
    Embedded,
    /// Client-server PostgreSQL store
    Relational,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Embedded => write!(f, "embedded"),
            StorageBackend::Relational => write!(f, "relational"),
        }
    }
}
