//! Rating API client
//!
//! [`RatingApi`] is the controller's only view of the server. The HTTP
//! implementation talks to the tally-rs rating endpoint; tests substitute
//! in-process or scripted implementations.

use async_trait::async_trait;
use std::time::Duration;
use tally_common::api::{RateRequest, RateResponse, RatingReadResponse};
use tally_common::{Aggregate, RatingSnapshot};
use tracing::debug;

use crate::error::{ClientError, Result};

const USER_AGENT: &str = concat!("tally-rc/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait RatingApi: Send + Sync {
    /// Submit a set-or-clear request; returns the server's fresh aggregate
    async fn submit_rating(&self, request: &RateRequest) -> Result<Aggregate>;

    /// Authoritative aggregate plus this user's own rating
    async fn fetch_rating(&self, item_id: &str, user_id: &str) -> Result<RatingSnapshot>;
}

pub struct HttpRatingApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpRatingApi {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:5730`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn rating_url(&self) -> String {
        format!("{}/api/rating", self.base_url)
    }
}

/// Map a non-success status to the client taxonomy
fn status_error(status: reqwest::StatusCode, message: Option<String>) -> ClientError {
    let message = message.unwrap_or_else(|| status.to_string());
    if status == reqwest::StatusCode::BAD_REQUEST {
        ClientError::Validation(message)
    } else {
        ClientError::Unavailable(format!("HTTP {}: {}", status.as_u16(), message))
    }
}

#[async_trait]
impl RatingApi for HttpRatingApi {
    async fn submit_rating(&self, request: &RateRequest) -> Result<Aggregate> {
        debug!(item_id = %request.item_id, value = request.value, "Submitting rating");

        let response = self
            .http_client
            .post(self.rating_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        // Failure bodies share the RateResponse shape; anything else (proxy
        // error pages) falls back to the status line.
        let body: Option<RateResponse> = response.json().await.ok();

        match body {
            Some(RateResponse {
                success: true,
                aggregate: Some(aggregate),
                ..
            }) if status.is_success() => Ok(aggregate),
            Some(body) if !status.is_success() => Err(status_error(status, body.error)),
            Some(body) => Err(ClientError::Unavailable(
                body.error
                    .unwrap_or_else(|| "rating response carried no aggregate".to_string()),
            )),
            None if status.is_success() => Err(ClientError::Unavailable(
                "unreadable rating response".to_string(),
            )),
            None => Err(status_error(status, None)),
        }
    }

    async fn fetch_rating(&self, item_id: &str, user_id: &str) -> Result<RatingSnapshot> {
        let response = self
            .http_client
            .get(self.rating_url())
            .query(&[("itemId", item_id), ("userId", user_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<RateResponse> = response.json().await.ok();
            return Err(status_error(status, body.and_then(|b| b.error)));
        }

        let body: RatingReadResponse = response.json().await?;
        Ok(body.into())
    }
}
