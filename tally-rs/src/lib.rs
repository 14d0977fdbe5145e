//! # Tally Rating Service (tally-rs)
//!
//! Durable like/dislike aggregation shared across users.
//!
//! **Architecture:** one [`store::RatingStore`] trait with an embedded
//! (SQLite) and a relational (PostgreSQL) adapter, selected once at startup;
//! [`service::RatingService`] validates requests and returns fresh
//! aggregates; [`api`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod store;

pub use error::{ApiError, ApiResult};
pub use service::RatingService;
pub use store::RatingStore;
