use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::SessionUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::{Batch, RandomCodes};

use super::invitations::OfficeQuery;

#[derive(Deserialize)]
pub struct AssignBarcodeRequest {
    pub code: Uuid,
    pub category: i32,
    pub title: String,
}

pub async fn generate_batch(
    State(state): State<AppState>,
    user: SessionUser,
    Query(query): Query<OfficeQuery>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    user.permission_in(&state, query.office)?;

    let issuer = state.batches();
    let batch = state.retry(|| issuer.generate_batch(query.office, &mut RandomCodes))?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn assign_barcode(
    State(state): State<AppState>,
    Json(payload): Json<AssignBarcodeRequest>,
) -> AppResult<StatusCode> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let issuer = state.batches();
    let assigned =
        state.retry(|| issuer.assign_barcode_to_document(payload.code, payload.category, title))?;
    if assigned {
        Ok(StatusCode::CREATED)
    } else {
        Err(AppError::conflict("barcode is unavailable"))
    }
}
