//! Rating endpoint
//!
//! Two rating routes plus a health check. Handlers only translate between
//! the wire types and [`RatingService`]; all rules live in the service.

pub mod handlers;
pub mod server;

use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::RatingService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RatingService>,
}

impl AppState {
    pub fn new(service: Arc<RatingService>) -> Self {
        Self { service }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/rating",
            get(handlers::get_rating).post(handlers::submit_rating),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
