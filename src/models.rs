use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult},
    geo::Coordinates,
};

/// Upper bound on comment text, counted in Unicode scalar values (not bytes).
pub const MAX_COMMENT_CHARS: usize = 5000;

/// Page size applied when the caller omits `limit` or sends a non-positive one.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

// --- Closed Vocabularies ---

/// Role
///
/// The fixed two-role model. Bound to a user on first login and never changed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    User,
    Firefighter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Firefighter => "firefighter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "firefighter" => Ok(Role::Firefighter),
            _ => Err(AppError::validation(
                "Role must be 'user' or 'firefighter'",
            )),
        }
    }
}

/// FireStatus
///
/// Lifecycle of a report. `Reported` is the implicit initial value; the store performs no
/// transition checks, so any status may be set from any other.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "fire_status", rename_all = "lowercase")]
#[ts(export)]
pub enum FireStatus {
    Reported,
    Seen,
    Closed,
}

impl FireStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FireStatus::Reported => "reported",
            FireStatus::Seen => "seen",
            FireStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for FireStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FireStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reported" => Ok(FireStatus::Reported),
            "seen" => Ok(FireStatus::Seen),
            "closed" => Ok(FireStatus::Closed),
            _ => Err(AppError::validation(
                "Status must be 'reported', 'seen' or 'closed'",
            )),
        }
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// Public identity record from the `users` table. Names are unique; the role is fixed at
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Session
///
/// An issued bearer credential. `token` is the opaque value clients send back; it is the
/// primary key of the `sessions` table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Session {
    #[sqlx(rename = "id")]
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is valid strictly before its expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Fire
///
/// A geolocated incident report. `reporter` is populated when the record was loaded with
/// its reporter joined, and omitted from JSON otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Fire {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub reporter_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub reporter: Option<User>,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub status: FireStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// FireWithDistance
///
/// A fire plus its great-circle distance in meters from a query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FireWithDistance {
    #[serde(flatten)]
    pub fire: Fire,
    pub distance: f64,
}

/// Comment
///
/// Immutable discussion entry on a fire, with the author's public identity joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Comment {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub fire_id: i64,
    #[ts(type = "number")]
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub user: Option<User>,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Pagination ---

/// Page
///
/// Normalized `LIMIT`/`OFFSET` pair. `limit` has no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Non-positive limits fall back to the default; negative offsets to zero.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_LIMIT),
            offset: offset.filter(|o| *o >= 0).unwrap_or(0),
        }
    }

    /// Same as `new`, for raw query-string values; unparseable values count as absent.
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Self {
        Self::new(
            limit.and_then(|l| l.trim().parse().ok()),
            offset.and_then(|o| o.trim().parse().ok()),
        )
    }
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Self-asserted identity. An existing name keeps its original role regardless of `role`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub name: String,
    pub role: Role,
}

impl LoginRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Name is required"));
        }
        Ok(())
    }
}

/// CreateFireRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateFireRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[schema(example = "brush fire")]
    pub description: String,
}

impl CreateFireRequest {
    /// Checks the description and returns the validated location.
    pub fn validate(&self) -> AppResult<Coordinates> {
        let location = Coordinates::new(self.latitude, self.longitude)?;
        if self.description.trim().is_empty() {
            return Err(AppError::validation("Description is required"));
        }
        Ok(location)
    }
}

/// UpdateStatusRequest
///
/// Any of the three statuses is accepted here, including a return to `reported`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateStatusRequest {
    pub status: FireStatus,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub text: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.text.trim().is_empty() {
            return Err(AppError::validation("Comment text is required"));
        }
        if self.text.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::validation(format!(
                "Comment text must be at most {MAX_COMMENT_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// ListFiresParams
///
/// Raw query string for `GET /fires`. Values are kept as strings so that malformed numbers
/// degrade to defaults instead of failing the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFiresParams {
    /// Optional status filter; empty means "all".
    pub status: Option<String>,
    /// Page size, default 50.
    pub limit: Option<String>,
    /// Rows to skip, default 0.
    pub offset: Option<String>,
}

impl ListFiresParams {
    pub fn status_filter(&self) -> AppResult<Option<FireStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }

    pub fn page(&self) -> Page {
        Page::parse(self.limit.as_deref(), self.offset.as_deref())
    }
}

/// NearbyFiresParams
///
/// Query string for `GET /fires/nearby`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearbyFiresParams {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    /// Search radius in meters, default 10000.
    pub radius: Option<String>,
    pub limit: Option<String>,
}

impl NearbyFiresParams {
    pub fn origin(&self) -> AppResult<Coordinates> {
        let latitude = parse_number(self.latitude.as_deref(), "latitude")?
            .ok_or_else(|| AppError::validation("latitude is required"))?;
        let longitude = parse_number(self.longitude.as_deref(), "longitude")?
            .ok_or_else(|| AppError::validation("longitude is required"))?;
        Coordinates::new(latitude, longitude)
    }

    pub fn radius(&self) -> AppResult<f64> {
        crate::geo::search_radius(parse_number(self.radius.as_deref(), "radius")?)
    }

    pub fn limit(&self) -> i64 {
        Page::parse(self.limit.as_deref(), None).limit
    }
}

fn parse_number(raw: Option<&str>, field: &str) -> AppResult<Option<f64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::validation(format!("{field} must be a number"))),
    }
}

// --- Response Payloads (Output Schemas) ---

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// UserResponse
///
/// Body of `GET /auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub user: User,
}

/// FireResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FireResponse {
    pub fire: Fire,
}

/// FireListResponse
///
/// One page of fires plus `total`, the number of rows matching the filter across all pages.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FireListResponse {
    pub fires: Vec<Fire>,
    #[ts(type = "number")]
    pub total: i64,
}

/// NearbyFiresResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NearbyFiresResponse {
    pub fires: Vec<FireWithDistance>,
}

/// CommentResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentResponse {
    pub comment: Comment,
}

/// CommentListResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}
