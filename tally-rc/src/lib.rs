//! # Tally Rating Client (tally-rc)
//!
//! Client side of the rating subsystem:
//! - [`state_store`]: keyed pub/sub state with per-key write guards
//! - [`controller`]: optimistic like/dislike with cooldown, rollback and
//!   stale-response guard
//! - [`api_client`]: the rating endpoint over HTTP
//!
//! The controller learns about item changes from the
//! [`EventBus`](tally_common::events::EventBus), fed by whatever polls the
//! player for now-playing metadata.

pub mod api_client;
pub mod controller;
pub mod error;
pub mod state_store;

pub use api_client::{HttpRatingApi, RatingApi};
pub use controller::{ClientRatingView, ControllerConfig, Phase, RateOutcome, RatingController, RatingIntent};
pub use error::{ClientError, Result};
pub use state_store::{StateStore, Subscription};
