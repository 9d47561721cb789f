use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{FirePage, Repository};
use crate::{
    error::{AppError, AppResult},
    geo::Coordinates,
    models::{Comment, Fire, FireStatus, FireWithDistance, Page, Role, Session, User},
};

#[derive(Default)]
struct MemoryState {
    // Ids are 1-based positions; nothing is ever removed from these vectors.
    users: Vec<User>,
    users_by_name: HashMap<String, i64>,
    sessions: HashMap<String, Session>,
    fires: Vec<(Fire, Coordinates)>,
    comments: Vec<Comment>,
}

impl MemoryState {
    fn user(&self, id: i64) -> Option<&User> {
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.users.get(i))
    }

    fn fire_index(&self, id: i64) -> Option<usize> {
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .filter(|i| *i < self.fires.len())
    }

    fn joined(&self, fire: &Fire) -> Fire {
        Fire {
            reporter: self.user(fire.reporter_id).cloned(),
            ..fire.clone()
        }
    }
}

/// MemoryRepository
///
/// In-process `Repository` with the same observable semantics as `PostgresRepository`:
/// atomic find-or-create, lazy session expiry, filtered counts and sphere distances. Used by
/// the test suites to drive the full router without a database.
///
/// The clock can be moved forward with `advance_clock` to exercise session expiry.
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
    clock_offset: Mutex<Duration>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock_offset: Mutex::new(Duration::zero()),
        }
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shifts this repository's notion of "now" forward by `by`.
    pub fn advance_clock(&self, by: Duration) {
        let mut offset = self
            .clock_offset
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }

    /// Number of sessions currently stored, expired ones included.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn now(&self) -> DateTime<Utc> {
        let offset = *self
            .clock_offset
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Utc::now() + offset
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_index(value: i64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_or_create_user(&self, name: &str, role: Role) -> AppResult<User> {
        let now = self.now();
        let mut state = self.lock();

        if let Some(existing) = state.users_by_name.get(name).and_then(|id| state.user(*id)) {
            return Ok(existing.clone());
        }

        let user = User {
            id: state.users.len() as i64 + 1,
            name: name.to_string(),
            role,
            created_at: now,
        };
        state.users_by_name.insert(user.name.clone(), user.id);
        state.users.push(user.clone());
        tracing::info!(user_id = user.id, role = %user.role, "created user");
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> AppResult<User> {
        self.lock()
            .user(id)
            .cloned()
            .ok_or(AppError::NotFound("user"))
    }

    async fn create_session(&self, user_id: i64, ttl: Duration) -> AppResult<Session> {
        let now = self.now();
        let mut state = self.lock();

        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        };
        if state.sessions.contains_key(&session.token) {
            return Err(AppError::Storage(sqlx::Error::Protocol(
                "session token collision".to_string(),
            )));
        }
        state
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn resolve_session(&self, token: &str) -> AppResult<i64> {
        let now = self.now();
        self.lock()
            .sessions
            .get(token)
            .filter(|session| session.is_valid_at(now))
            .map(|session| session.user_id)
            .ok_or(AppError::InvalidSession)
    }

    async fn delete_session(&self, token: &str) -> AppResult<()> {
        self.lock().sessions.remove(token);
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> AppResult<u64> {
        let now = self.now();
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.is_valid_at(now));
        Ok((before - state.sessions.len()) as u64)
    }

    async fn create_fire(
        &self,
        reporter_id: i64,
        location: Coordinates,
        description: &str,
    ) -> AppResult<Fire> {
        let now = self.now();
        let mut state = self.lock();

        let fire = Fire {
            id: state.fires.len() as i64 + 1,
            reporter_id,
            reporter: None,
            latitude: location.latitude(),
            longitude: location.longitude(),
            description: description.to_string(),
            status: FireStatus::Reported,
            created_at: now,
            updated_at: now,
        };
        state.fires.push((fire.clone(), location));
        Ok(state.joined(&fire))
    }

    async fn list_fires(&self, status: Option<FireStatus>, page: Page) -> AppResult<FirePage> {
        let state = self.lock();

        let mut matching: Vec<&Fire> = state
            .fires
            .iter()
            .map(|(fire, _)| fire)
            .filter(|fire| status.is_none_or(|s| fire.status == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let fires = matching
            .into_iter()
            .skip(to_index(page.offset))
            .take(to_index(page.limit))
            .map(|fire| state.joined(fire))
            .collect();

        Ok(FirePage { fires, total })
    }

    async fn get_fire(&self, id: i64) -> AppResult<Fire> {
        let state = self.lock();
        state
            .fire_index(id)
            .map(|i| state.joined(&state.fires[i].0))
            .ok_or(AppError::NotFound("fire"))
    }

    async fn update_fire_status(&self, id: i64, status: FireStatus) -> AppResult<Fire> {
        let now = self.now();
        let mut state = self.lock();

        let index = state.fire_index(id).ok_or(AppError::NotFound("fire"))?;
        let fire = &mut state.fires[index].0;
        fire.status = status;
        fire.updated_at = now;
        let updated = fire.clone();

        tracing::info!(fire_id = id, status = %status, "fire status updated");
        Ok(state.joined(&updated))
    }

    async fn fires_near(
        &self,
        origin: Coordinates,
        radius_meters: f64,
        limit: i64,
    ) -> AppResult<Vec<FireWithDistance>> {
        let state = self.lock();

        let mut nearby: Vec<FireWithDistance> = state
            .fires
            .iter()
            .map(|(fire, location)| (fire, origin.distance_to(location)))
            .filter(|(_, distance)| *distance <= radius_meters)
            .map(|(fire, distance)| FireWithDistance {
                fire: state.joined(fire),
                distance,
            })
            .collect();
        nearby.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.fire.id.cmp(&b.fire.id))
        });
        nearby.truncate(to_index(limit));

        Ok(nearby)
    }

    async fn create_comment(&self, fire_id: i64, user_id: i64, text: &str) -> AppResult<Comment> {
        let now = self.now();
        let mut state = self.lock();

        if state.fire_index(fire_id).is_none() {
            return Err(AppError::NotFound("fire"));
        }

        let comment = Comment {
            id: state.comments.len() as i64 + 1,
            fire_id,
            user_id,
            user: state.user(user_id).cloned(),
            text: text.to_string(),
            created_at: now,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, fire_id: i64) -> AppResult<Vec<Comment>> {
        let state = self.lock();

        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|comment| comment.fire_id == fire_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(comments)
    }
}
