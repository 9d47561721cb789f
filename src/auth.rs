use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    error::{AppError, AppResult},
    models::Role,
    repository::{Repository, RepositoryState},
};

/// BearerToken
///
/// The `TokenExtracted` step: the raw credential from an `Authorization: Bearer <token>`
/// header. Nothing about the token's validity is known yet.
///
/// Rejection: `AppError::Unauthorized` for a missing header or any deviation from the exact
/// `Bearer <token>` shape.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// parse_bearer
///
/// Accepts exactly `Bearer` + one space + a non-empty token without whitespace. The scheme is
/// matched case-sensitively.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?;
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return None;
    }
    Some(token)
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer)
            .ok_or_else(|| {
                tracing::debug!("rejected request: missing or malformed authorization header");
                AppError::Unauthorized
            })?;

        Ok(BearerToken(token.to_string()))
    }
}

/// AuthUser
///
/// The `Resolved` step: the identity bound to a valid session, passed by value into every
/// authenticated handler. Downstream code only ever reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

/// authenticate
///
/// Resolves a token to an identity. Unknown/expired tokens and sessions whose user no longer
/// exists all collapse into `Unauthorized`; storage failures propagate unchanged.
pub async fn authenticate(repo: &dyn Repository, token: &str) -> AppResult<AuthUser> {
    let user_id = repo.resolve_session(token).await.map_err(|e| match e {
        AppError::InvalidSession => {
            tracing::debug!("rejected request: invalid or expired session");
            AppError::Unauthorized
        }
        other => other,
    })?;

    let user = repo.get_user(user_id).await.map_err(|e| match e {
        AppError::NotFound(_) => {
            tracing::warn!(user_id, "session references a missing user");
            AppError::Unauthorized
        }
        other => other,
    })?;

    Ok(AuthUser {
        id: user.id,
        role: user.role,
    })
}

/// AuthUser Extractor Implementation
///
/// Runs `BearerToken` extraction, then `authenticate` against the repository from the
/// application state. Because it is a `FromRequestParts` extractor it always runs before the
/// body is read, so unauthenticated requests never reach body validation.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let repo = RepositoryState::from_ref(state);
        authenticate(repo.as_ref(), &token).await
    }
}

/// require_role
///
/// Pure role guard over an already-authenticated identity.
pub fn require_role(user: &AuthUser, required: Role) -> AppResult<()> {
    if user.role == required {
        Ok(())
    } else {
        tracing::debug!(user_id = user.id, role = %user.role, required = %required, "rejected request: insufficient role");
        Err(AppError::Forbidden(required))
    }
}

/// Firefighter
///
/// An `AuthUser` that has passed `require_role(.., Role::Firefighter)`. Authentication always
/// happens first: a bad credential is a 401 even on firefighter-only routes.
#[derive(Debug, Clone)]
pub struct Firefighter(pub AuthUser);

impl<S> FromRequestParts<S> for Firefighter
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, Role::Firefighter)?;
        Ok(Firefighter(user))
    }
}
