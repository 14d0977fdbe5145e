//! # Tally Common Library
//!
//! Shared code for the Tally rating service and rating client:
//! - Error taxonomy (validation / persistence unavailable / conflict ignored)
//! - Rating data model and aggregate arithmetic
//! - Wire types for the rating endpoint
//! - Event bus for current-item notifications
//! - Bootstrap configuration helpers
//! - Database initialization for the embedded and relational backends

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use models::{Aggregate, ItemMeta, NowPlaying, Rating, RatingSnapshot, RatingValue, StorageBackend};
