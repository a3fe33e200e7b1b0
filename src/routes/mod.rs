use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::SessionUser, state::AppState};

pub mod auth;
pub mod batches;
pub mod categories;
pub mod health;
pub mod invitations;
pub mod subscriptions;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    tracing::warn!(origin = value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        // The `sid` cookie is the only credential, so without an explicit
        // origin list no cross-origin caller may read responses.
        CorsLayer::new()
    };

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .route("/api/session", get(auth::me).delete(auth::logout))
        .route("/api/categories", get(categories::list_categories))
        .route("/api/category", post(categories::create_category))
        .route(
            "/api/category/:id",
            patch(categories::rename_category).delete(categories::delete_category),
        )
        .route(
            "/api/category/:id/activate",
            post(categories::activate_category),
        )
        .route(
            "/api/invite",
            put(invitations::upsert_invitation).delete(invitations::revoke_invitation),
        )
        .route("/api/batch", post(batches::generate_batch))
        .route("/api/document", post(batches::assign_barcode))
        .route("/api/subscribe", post(subscriptions::subscribe))
        .layer(middleware::from_extractor_with_state::<SessionUser, _>(
            protected_state,
        ));

    Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
