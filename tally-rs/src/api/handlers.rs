//! HTTP request handlers

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use tally_common::api::{HealthResponse, RateRequest, RateResponse, RatingQuery, RatingReadResponse};

use super::AppState;
use crate::error::{ApiError, ApiResult};

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tally-rs".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.service.backend().to_string(),
    })
}

/// POST /api/rating
///
/// `value` of `+1`/`-1` sets the caller's rating, `0` clears it. Responds
/// with the aggregate produced by this write.
pub async fn submit_rating(
    State(state): State<AppState>,
    payload: Result<Json<RateRequest>, JsonRejection>,
) -> ApiResult<Json<RateResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let aggregate = state
        .service
        .rate(&request.item_id, &request.item_meta, &request.user_id, request.value)
        .await?;

    Ok(Json(RateResponse::ok(aggregate)))
}

/// GET /api/rating?itemId=...&userId=...
pub async fn get_rating(
    State(state): State<AppState>,
    query: Result<Query<RatingQuery>, QueryRejection>,
) -> ApiResult<Json<RatingReadResponse>> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let snapshot = state
        .service
        .read(&query.item_id, query.user_id.as_deref())
        .await?;

    Ok(Json(snapshot.into()))
}
