use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};

use crate::{
    auth::SessionUser,
    error::{AppError, AppResult},
    models::UserProfile,
    state::AppState,
};

pub async fn me(user: SessionUser) -> Json<UserProfile> {
    Json(UserProfile {
        name: user.name,
        email: user.email,
    })
}

pub async fn logout(
    State(state): State<AppState>,
    user: SessionUser,
) -> AppResult<(HeaderMap, StatusCode)> {
    let sessions = state.sessions();
    state
        .retry(|| sessions.invalidate_session(user.session_id))?
        .ok_or_else(AppError::unauthorized)?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie());
    Ok((headers, StatusCode::NO_CONTENT))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static(
        "sid=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
    )
}
