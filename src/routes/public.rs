use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Everything here is read-only except login, which
/// is how a session is obtained in the first place.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/login
        // Find-or-create by name, then issue a fresh session token.
        .route("/auth/login", post(handlers::login))
        // GET /fires?status=...&limit=...&offset=...
        .route("/fires", get(handlers::list_fires))
        // GET /fires/nearby?latitude=...&longitude=...&radius=...
        // Static segment; matched ahead of `/fires/{id}`.
        .route("/fires/nearby", get(handlers::nearby_fires))
        .route("/fires/{id}", get(handlers::get_fire))
        .route("/fires/{id}/comments", get(handlers::list_comments))
}
