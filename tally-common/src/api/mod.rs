//! API module for the rating endpoint contract
//!
//! Shared by the rating service (which serves these types) and the rating
//! client (which sends and parses them).
//!
//! # Design Principle
//!
//! This module contains ONLY serde types and pure helpers. The service wraps
//! them with its HTTP framework; the client wraps them with its HTTP client.

pub mod types;

pub use types::{HealthResponse, RateRequest, RateResponse, RatingQuery, RatingReadResponse};
