use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Any role may call these. Each handler takes `AuthUser`, which resolves the bearer token
/// before the body is read; logout takes only `BearerToken` so it stays idempotent for
/// tokens that are already gone.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/auth/logout", post(handlers::logout))
        // POST /fires
        // The reporter is always the caller.
        .route("/fires", post(handlers::create_fire))
        .route("/fires/{id}/comments", post(handlers::create_comment))
}
