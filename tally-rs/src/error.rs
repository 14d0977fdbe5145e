//! HTTP error mapping for the rating endpoint
//!
//! Every failure body has the same shape as a failed submission:
//! `{"success": false, "error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tally_common::api::RateResponse;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body or query (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Rating error from the service layer
    #[error(transparent)]
    Rating(#[from] tally_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rating(err) => match err {
                tally_common::Error::Validation(_) => StatusCode::BAD_REQUEST,
                tally_common::Error::PersistenceUnavailable(_)
                | tally_common::Error::ConflictIgnored(_) => StatusCode::SERVICE_UNAVAILABLE,
                tally_common::Error::Config(_) | tally_common::Error::Io(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(RateResponse::failure(self.to_string()))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
