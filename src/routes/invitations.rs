use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::SessionUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::RevokedInvitation;

#[derive(Deserialize)]
pub struct OfficeQuery {
    pub office: i32,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub permission: i32,
}

pub async fn upsert_invitation(
    State(state): State<AppState>,
    user: SessionUser,
    Query(query): Query<OfficeQuery>,
    Json(payload): Json<InviteRequest>,
) -> AppResult<Json<DateTime<Utc>>> {
    user.permission_in(&state, query.office)?;

    let email = payload.email.trim();
    if email.is_empty() {
        return Err(AppError::bad_request("email must not be empty"));
    }

    let invitations = state.invitations();
    state
        .retry(|| invitations.upsert_invitation(query.office, email, payload.permission))?
        .map(Json)
        .ok_or_else(|| AppError::conflict("email already belongs to a registered user"))
}

/// The request body is the plain-text email address to uninvite.
pub async fn revoke_invitation(
    State(state): State<AppState>,
    user: SessionUser,
    Query(query): Query<OfficeQuery>,
    body: String,
) -> AppResult<Json<RevokedInvitation>> {
    user.permission_in(&state, query.office)?;

    state
        .invitations()
        .revoke_invitation(query.office, body.trim())?
        .map(Json)
        .ok_or_else(AppError::not_found)
}
