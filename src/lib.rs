use axum::{Router, extract::FromRef, http::HeaderName, routing::get};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod housekeeping;
pub mod models;
pub mod repository;

// Endpoint groups, one per guarding extractor.
pub mod routes;
use routes::{authenticated, firefighter, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{MemoryRepository, PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every `/api` handler plus `/health`. Served at
/// `/api-docs/openapi.json` and browsable through the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::login, handlers::me, handlers::logout,
        handlers::list_fires, handlers::create_fire, handlers::get_fire,
        handlers::update_fire_status, handlers::nearby_fires,
        handlers::list_comments, handlers::create_comment
    ),
    components(
        schemas(
            models::Role, models::FireStatus, models::User, models::Fire,
            models::FireWithDistance, models::Comment,
            models::LoginRequest, models::CreateFireRequest, models::UpdateStatusRequest,
            models::CreateCommentRequest, models::LoginResponse, models::UserResponse,
            models::FireResponse, models::FireListResponse, models::NearbyFiresResponse,
            models::CommentResponse, models::CommentListResponse, error::ErrorResponse,
        )
    ),
    tags(
        (name = "fire-tracker", description = "Wildfire reporting API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for everything a handler may need. Extractors pull
/// individual parts out of it through the `FromRef` impls below.
#[derive(Clone)]
pub struct AppState {
    /// Storage-agnostic persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self { repo, config }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the `/api` surface, the health check and the docs, then wraps everything in the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Same paths appear in several groups with different methods; merge combines them.
    let api = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(firefighter::firefighter_routes());

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span so every log line emitted while serving a request carries its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
