use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AuthUser, BearerToken, Firefighter},
    error::{AppResult, ErrorResponse, ValidJson, ValidPath, ValidQuery},
    models::{
        CommentListResponse, CommentResponse, CreateCommentRequest, CreateFireRequest,
        FireListResponse, FireResponse, ListFiresParams, LoginRequest, LoginResponse,
        NearbyFiresParams, NearbyFiresResponse, UpdateStatusRequest, UserResponse,
    },
};

// --- Health ---

/// health
///
/// Liveness check. Touches no storage.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

// --- Auth ---

/// login
///
/// [Public Route] Self-asserted login. The name is looked up or created atomically and a
/// fresh session is issued on every call, so repeated logins yield distinct tokens.
///
/// *Note*: an existing user keeps the role it was created with; the `role` field only
/// matters the first time a name is seen.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 400, description = "Invalid name or role", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    payload.validate()?;

    let user = state
        .repo
        .find_or_create_user(&payload.name, payload.role)
        .await?;
    let session = state
        .repo
        .create_session(user.id, state.config.session_expiry())
        .await?;

    tracing::debug!(user_id = user.id, expires_at = %session.expires_at, "session issued");
    Ok(Json(LoginResponse {
        token: session.token,
        user,
    }))
}

/// me
///
/// [Authenticated Route] Returns the full record of the caller.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    )
)]
pub async fn me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserResponse>> {
    let user = state.repo.get_user(id).await?;
    Ok(Json(UserResponse { user }))
}

/// logout
///
/// [Authenticated Route] Revokes the presented token. Only a well-formed bearer header is
/// required: deleting an unknown or expired token still answers 204.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Missing or malformed Authorization header", body = ErrorResponse)
    )
)]
pub async fn logout(
    BearerToken(token): BearerToken,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.repo.delete_session(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Fires ---

/// list_fires
///
/// [Public Route] Newest-first listing with optional status filter. `total` counts every
/// fire matching the filter, not just the returned page.
#[utoipa::path(
    get,
    path = "/api/fires",
    params(ListFiresParams),
    responses(
        (status = 200, description = "One page of fires", body = FireListResponse),
        (status = 400, description = "Unknown status or malformed query", body = ErrorResponse)
    )
)]
pub async fn list_fires(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<ListFiresParams>,
) -> AppResult<Json<FireListResponse>> {
    let status = params.status_filter()?;
    let page = state.repo.list_fires(status, params.page()).await?;
    Ok(Json(FireListResponse {
        fires: page.fires,
        total: page.total,
    }))
}

/// create_fire
///
/// [Authenticated Route] Files a new report at `reported` status. The reporter is always
/// the caller; coordinates and description are validated before storage is touched.
#[utoipa::path(
    post,
    path = "/api/fires",
    request_body = CreateFireRequest,
    responses(
        (status = 201, description = "Fire reported", body = FireResponse),
        (status = 400, description = "Invalid coordinates or description", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    )
)]
pub async fn create_fire(
    AuthUser { id: reporter_id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateFireRequest>,
) -> AppResult<(StatusCode, Json<FireResponse>)> {
    let location = payload.validate()?;

    let fire = state
        .repo
        .create_fire(reporter_id, location, &payload.description)
        .await?;

    tracing::info!(
        fire_id = fire.id,
        reporter_id,
        latitude = fire.latitude,
        longitude = fire.longitude,
        "fire reported"
    );
    Ok((StatusCode::CREATED, Json(FireResponse { fire })))
}

/// get_fire
///
/// [Public Route] A single fire with its reporter joined.
#[utoipa::path(
    get,
    path = "/api/fires/{id}",
    params(("id" = i64, Path, description = "Fire ID")),
    responses(
        (status = 200, description = "Found", body = FireResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_fire(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
) -> AppResult<Json<FireResponse>> {
    let fire = state.repo.get_fire(id).await?;
    Ok(Json(FireResponse { fire }))
}

/// update_fire_status
///
/// [Firefighter Route] Sets the status unconditionally. Any status may follow any other,
/// including `closed` back to `reported`.
///
/// *RBAC*: `Firefighter` authenticates first (401) and only then checks the role (403), so a
/// rejected caller never reaches the store and the fire is left untouched.
#[utoipa::path(
    patch,
    path = "/api/fires/{id}/status",
    params(("id" = i64, Path, description = "Fire ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated", body = FireResponse),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 403, description = "Caller is not a firefighter", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn update_fire_status(
    Firefighter(_firefighter): Firefighter,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<UpdateStatusRequest>,
) -> AppResult<Json<FireResponse>> {
    let fire = state.repo.update_fire_status(id, payload.status).await?;
    Ok(Json(FireResponse { fire }))
}

/// nearby_fires
///
/// [Public Route] Fires within `radius` meters (default 10000) of a point, nearest first,
/// each with its distance in meters.
#[utoipa::path(
    get,
    path = "/api/fires/nearby",
    params(NearbyFiresParams),
    responses(
        (status = 200, description = "Fires in range", body = NearbyFiresResponse),
        (status = 400, description = "Invalid coordinates or radius", body = ErrorResponse)
    )
)]
pub async fn nearby_fires(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<NearbyFiresParams>,
) -> AppResult<Json<NearbyFiresResponse>> {
    let origin = params.origin()?;
    let radius = params.radius()?;

    let fires = state
        .repo
        .fires_near(origin, radius, params.limit())
        .await?;
    Ok(Json(NearbyFiresResponse { fires }))
}

// --- Comments ---

/// list_comments
///
/// [Public Route] Oldest first. An unknown fire simply has no comments.
#[utoipa::path(
    get,
    path = "/api/fires/{id}/comments",
    params(("id" = i64, Path, description = "Fire ID")),
    responses((status = 200, description = "Comments", body = CommentListResponse))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    ValidPath(fire_id): ValidPath<i64>,
) -> AppResult<Json<CommentListResponse>> {
    let comments = state.repo.list_comments(fire_id).await?;
    Ok(Json(CommentListResponse { comments }))
}

/// create_comment
///
/// [Authenticated Route] Posts a comment as the caller.
#[utoipa::path(
    post,
    path = "/api/fires/{id}/comments",
    params(("id" = i64, Path, description = "Fire ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = CommentResponse),
        (status = 400, description = "Empty or oversized text", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 404, description = "Fire Not Found", body = ErrorResponse)
    )
)]
pub async fn create_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidPath(fire_id): ValidPath<i64>,
    ValidJson(payload): ValidJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    payload.validate()?;

    let comment = state
        .repo
        .create_comment(fire_id, user_id, &payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}
