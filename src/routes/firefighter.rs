use crate::{AppState, handlers};
use axum::{Router, routing::patch};

/// Firefighter Router Module
///
/// Status transitions. The `Firefighter` extractor authenticates (401) and then checks the
/// role (403) before the handler body runs.
pub fn firefighter_routes() -> Router<AppState> {
    Router::new().route("/fires/{id}/status", patch(handlers::update_fire_status))
}
