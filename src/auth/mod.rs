use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::Cookie;
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const SESSION_COOKIE_NAME: &str = "sid";

/// The principal behind a valid, upgraded session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub session_id: Uuid,
    pub name: String,
    pub email: String,
}

impl SessionUser {
    /// Permission bits this user holds in `office`; forbidden when not staff.
    pub fn permission_in(&self, state: &AppState, office: i32) -> AppResult<i32> {
        state
            .sessions()
            .get_permissions_from_session(self.session_id, office)?
            .ok_or_else(AppError::forbidden)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // The session middleware already resolved this request's user.
        if let Some(user) = parts.extensions.get::<SessionUser>() {
            return Ok(user.clone());
        }

        let TypedHeader(cookies) = TypedHeader::<Cookie>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::unauthorized())?;

        let session_id = cookies
            .get(SESSION_COOKIE_NAME)
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(AppError::unauthorized)?;

        let profile = state
            .sessions()
            .get_user_from_session(session_id)?
            .ok_or_else(AppError::unauthorized)?;

        let user = SessionUser {
            session_id,
            name: profile.name,
            email: profile.email,
        };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
