//! Rating endpoint request/response types
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::models::{Aggregate, ItemMeta, RatingSnapshot, RatingValue};

// ========================================
// Rating Submission
// ========================================

/// Body of `POST /api/rating`
///
/// `value` stays a plain integer here so that out-of-range values reach the
/// aggregator and come back as a validation failure instead of a parse error.
///
/// # Examples
///
/// ```
/// use tally_common::api::types::RateRequest;
///
/// let json = r#"{"itemId":"song-42","itemMeta":{"artist":"A","title":"T"},"value":1,"userId":"u1"}"#;
/// let request: RateRequest = serde_json::from_str(json).unwrap();
/// assert_eq!(request.value, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequest {
    pub item_id: String,
    #[serde(default)]
    pub item_meta: ItemMeta,
    pub value: i64,
    pub user_id: String,
}

/// Response of `POST /api/rating`
///
/// `{success:true, aggregate}` or `{success:false, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RateResponse {
    pub fn ok(aggregate: Aggregate) -> Self {
        Self {
            success: true,
            aggregate: Some(aggregate),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            aggregate: None,
            error: Some(message.into()),
        }
    }
}

// ========================================
// Rating Read
// ========================================

/// Query of `GET /api/rating`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingQuery {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Response of `GET /api/rating`
///
/// `userRating` is `null` when the user has not rated the item or no user
/// was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingReadResponse {
    pub aggregate: Aggregate,
    pub user_rating: Option<RatingValue>,
}

impl From<RatingSnapshot> for RatingReadResponse {
    fn from(snapshot: RatingSnapshot) -> Self {
        Self {
            aggregate: snapshot.aggregate,
            user_rating: snapshot.user_rating,
        }
    }
}

impl From<RatingReadResponse> for RatingSnapshot {
    fn from(response: RatingReadResponse) -> Self {
        Self {
            aggregate: response.aggregate,
            user_rating: response.user_rating,
        }
    }
}

// ========================================
// Health
// ========================================

/// Response of `GET /health`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub backend: String,
}

// ========================================
// Tests
// ========================================
