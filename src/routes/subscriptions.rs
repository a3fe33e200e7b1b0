use axum::{extract::State, http::StatusCode, Json};
use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Shape of a browser `PushSubscription.toJSON()`; the keys are not stored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub endpoint: String,
    /// Milliseconds since the Unix epoch.
    pub expiration_time: Option<i64>,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> AppResult<StatusCode> {
    if payload.endpoint.trim().is_empty() {
        return Err(AppError::bad_request("endpoint must not be empty"));
    }

    let expiration = payload
        .expiration_time
        .map(|millis| {
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| AppError::bad_request("expirationTime is out of range"))
        })
        .transpose()?;

    state
        .subscriptions()
        .push_subscription(&payload.endpoint, expiration)?;
    Ok(StatusCode::CREATED)
}
