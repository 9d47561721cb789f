use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    error::AppResult,
    geo::Coordinates,
    models::{Comment, Fire, FireStatus, FireWithDistance, Page, Role, Session, User},
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// FirePage
///
/// One page of a listing plus the number of rows matching the filter across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct FirePage {
    pub fires: Vec<Fire>,
    pub total: i64,
}

/// Repository Trait
///
/// The persistence contract behind every handler and the auth extractors. Each method is a
/// single atomic store action; none of them retries.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum's task
/// boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity Store ---

    /// Returns the user named `name`, creating it with `role` if absent. An existing user keeps
    /// its original role. Concurrent calls for the same new name yield exactly one row.
    async fn find_or_create_user(&self, name: &str, role: Role) -> AppResult<User>;
    /// Fails with `NotFound` for an unknown id.
    async fn get_user(&self, id: i64) -> AppResult<User>;
    /// Issues a fresh random token expiring `ttl` from now. Collisions are hard failures.
    async fn create_session(&self, user_id: i64, ttl: Duration) -> AppResult<Session>;
    /// Returns the bound user id, or `InvalidSession` for unknown and expired tokens alike.
    async fn resolve_session(&self, token: &str) -> AppResult<i64>;
    /// Idempotent.
    async fn delete_session(&self, token: &str) -> AppResult<()>;
    /// Housekeeping only; returns the number of sessions removed.
    async fn delete_expired_sessions(&self) -> AppResult<u64>;

    // --- Report Store ---

    async fn create_fire(
        &self,
        reporter_id: i64,
        location: Coordinates,
        description: &str,
    ) -> AppResult<Fire>;
    /// Newest first. `total` honors the status filter but not the page.
    async fn list_fires(&self, status: Option<FireStatus>, page: Page) -> AppResult<FirePage>;
    /// Includes the joined reporter.
    async fn get_fire(&self, id: i64) -> AppResult<Fire>;
    /// Unconditional set; refreshes `updated_at`. No transition graph is enforced.
    async fn update_fire_status(&self, id: i64, status: FireStatus) -> AppResult<Fire>;
    /// Fires within `radius_meters` of `origin`, nearest first.
    async fn fires_near(
        &self,
        origin: Coordinates,
        radius_meters: f64,
        limit: i64,
    ) -> AppResult<Vec<FireWithDistance>>;

    // --- Comment Store ---

    /// Fails with `NotFound` when the fire does not exist.
    async fn create_comment(&self, fire_id: i64, user_id: i64, text: &str) -> AppResult<Comment>;
    /// Oldest first, each joined with its author.
    async fn list_comments(&self, fire_id: i64) -> AppResult<Vec<Comment>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
