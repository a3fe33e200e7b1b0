use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::CategorySummary;
use crate::state::AppState;
use crate::store::CategoryRemoval;

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

impl CategoryRequest {
    fn trimmed_name(&self) -> AppResult<&str> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
        Ok(name)
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CategorySummary>>> {
    Ok(Json(state.categories().get_active_categories()?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<i32>)> {
    let id = state.categories().create_category(payload.trimmed_name()?)?;
    Ok((StatusCode::CREATED, Json(id)))
}

pub async fn rename_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<StatusCode> {
    if state
        .categories()
        .rename_category(id, payload.trimmed_name()?)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found())
    }
}

pub async fn activate_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<String>> {
    state
        .categories()
        .activate_category(id)?
        .map(Json)
        .ok_or_else(AppError::not_found)
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<CategoryRemoval>> {
    let categories = state.categories();
    state
        .retry(|| categories.delete_category(id))?
        .map(Json)
        .ok_or_else(AppError::not_found)
}
