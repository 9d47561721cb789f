use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{FirePage, Repository};
use crate::{
    error::{AppError, AppResult},
    geo::Coordinates,
    models::{Comment, Fire, FireStatus, FireWithDistance, Page, Role, Session, User},
};

/// Shared projection for every fire query. Expects the fire aliased as `f` and its reporter
/// LEFT JOINed as `u`.
macro_rules! fire_columns {
    () => {
        r#"
        f.id, f.reporter_id,
        ST_Y(f.location::geometry) AS latitude, ST_X(f.location::geometry) AS longitude,
        f.description, f.status, f.created_at, f.updated_at,
        u.name AS reporter_name, u.role AS reporter_role, u.created_at AS reporter_created_at
        "#
    };
}

const COMMENT_FIRE_FK: &str = "comments_fire_id_fkey";

/// Raw fire row with the reporter's columns flattened in.
#[derive(Debug, FromRow)]
struct FireRow {
    id: i64,
    reporter_id: i64,
    latitude: f64,
    longitude: f64,
    description: String,
    status: FireStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    reporter_name: Option<String>,
    reporter_role: Option<Role>,
    reporter_created_at: Option<DateTime<Utc>>,
}

impl From<FireRow> for Fire {
    fn from(row: FireRow) -> Self {
        let reporter = match (row.reporter_name, row.reporter_role, row.reporter_created_at) {
            (Some(name), Some(role), Some(created_at)) => Some(User {
                id: row.reporter_id,
                name,
                role,
                created_at,
            }),
            _ => None,
        };

        Fire {
            id: row.id,
            reporter_id: row.reporter_id,
            reporter,
            latitude: row.latitude,
            longitude: row.longitude,
            description: row.description,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct NearbyRow {
    #[sqlx(flatten)]
    fire: FireRow,
    distance: f64,
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    fire_id: i64,
    user_id: i64,
    text: String,
    created_at: DateTime<Utc>,
    author_name: Option<String>,
    author_role: Option<Role>,
    author_created_at: Option<DateTime<Utc>>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        let user = match (row.author_name, row.author_role, row.author_created_at) {
            (Some(name), Some(role), Some(created_at)) => Some(User {
                id: row.user_id,
                name,
                role,
                created_at,
            }),
            _ => None,
        };

        Comment {
            id: row.id,
            fire_id: row.fire_id,
            user_id: row.user_id,
            user,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

/// Upsert result; `inserted` is derived from the row's `xmax` system column.
#[derive(Debug, FromRow)]
struct UpsertedUser {
    #[sqlx(flatten)]
    user: User,
    inserted: bool,
}

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL with PostGIS. Report locations are stored as
/// `geography(Point, 4326)`; all timestamps come from the database clock.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_status_filter(builder: &mut QueryBuilder<'_, Postgres>, status: Option<FireStatus>) {
    if let Some(status) = status {
        builder.push(" WHERE f.status = ");
        builder.push_bind(status);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_or_create_user
    ///
    /// A single upsert. The no-op `DO UPDATE` makes Postgres return the conflicting row, so a
    /// concurrent first login either inserts or observes the winner's row; there is no
    /// select-then-insert window.
    async fn find_or_create_user(&self, name: &str, role: Role) -> AppResult<User> {
        let row = sqlx::query_as::<_, UpsertedUser>(
            r#"
            INSERT INTO users (name, role) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, role, created_at, (xmax = 0) AS inserted
            "#,
        )
        .bind(name)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        if row.inserted {
            tracing::info!(user_id = row.user.id, role = %row.user.role, "created user");
        } else {
            tracing::debug!(user_id = row.user.id, "existing user logged in");
        }
        Ok(row.user)
    }

    async fn get_user(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT id, name, role, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    async fn create_session(&self, user_id: i64, ttl: Duration) -> AppResult<Session> {
        let token = Uuid::new_v4().to_string();
        let ttl_seconds = ttl.num_milliseconds() as f64 / 1000.0;

        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at)
            VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3))
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(&token)
        .bind(user_id)
        .bind(ttl_seconds)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(user_id, expires_at = %session.expires_at, "issued session");
        Ok(session)
    }

    async fn resolve_session(&self, token: &str) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::InvalidSession)
    }

    async fn delete_session(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// create_fire
    ///
    /// Inserts the report as a geography point (note PostGIS takes longitude first) and joins
    /// the reporter back in the same statement.
    async fn create_fire(
        &self,
        reporter_id: i64,
        location: Coordinates,
        description: &str,
    ) -> AppResult<Fire> {
        let row = sqlx::query_as::<_, FireRow>(concat!(
            r#"
            WITH f AS (
                INSERT INTO fires (reporter_id, location, description, status)
                VALUES ($1, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography, $4, 'reported')
                RETURNING *
            )
            SELECT "#,
            fire_columns!(),
            " FROM f LEFT JOIN users u ON f.reporter_id = u.id"
        ))
        .bind(reporter_id)
        .bind(location.longitude())
        .bind(location.latitude())
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// list_fires
    ///
    /// Builds the page query and the count query with the same optional status filter, using
    /// QueryBuilder for safe parameterization.
    async fn list_fires(&self, status: Option<FireStatus>, page: Page) -> AppResult<FirePage> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(concat!(
            "SELECT ",
            fire_columns!(),
            " FROM fires f LEFT JOIN users u ON f.reporter_id = u.id"
        ));
        push_status_filter(&mut builder, status);
        builder.push(" ORDER BY f.created_at DESC, f.id DESC LIMIT ");
        builder.push_bind(page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset);

        let rows = builder
            .build_query_as::<FireRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM fires f");
        push_status_filter(&mut count, status);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(FirePage {
            fires: rows.into_iter().map(Fire::from).collect(),
            total,
        })
    }

    async fn get_fire(&self, id: i64) -> AppResult<Fire> {
        sqlx::query_as::<_, FireRow>(concat!(
            "SELECT ",
            fire_columns!(),
            " FROM fires f LEFT JOIN users u ON f.reporter_id = u.id WHERE f.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Fire::from)
        .ok_or(AppError::NotFound("fire"))
    }

    async fn update_fire_status(&self, id: i64, status: FireStatus) -> AppResult<Fire> {
        let fire = sqlx::query_as::<_, FireRow>(concat!(
            r#"
            WITH f AS (
                UPDATE fires SET status = $1, updated_at = NOW()
                WHERE id = $2
                RETURNING *
            )
            SELECT "#,
            fire_columns!(),
            " FROM f LEFT JOIN users u ON f.reporter_id = u.id"
        ))
        .bind(status)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Fire::from)
        .ok_or(AppError::NotFound("fire"))?;

        tracing::info!(fire_id = id, status = %status, "fire status updated");
        Ok(fire)
    }

    /// fires_near
    ///
    /// Sphere-based (`use_spheroid = false`) distance and radius filter, matching
    /// `geo::haversine_distance`. `ST_DWithin` lets the GiST index prune candidates.
    async fn fires_near(
        &self,
        origin: Coordinates,
        radius_meters: f64,
        limit: i64,
    ) -> AppResult<Vec<FireWithDistance>> {
        let rows = sqlx::query_as::<_, NearbyRow>(concat!(
            "SELECT ",
            fire_columns!(),
            r#",
                ST_Distance(f.location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, false)
                    AS distance
            FROM fires f LEFT JOIN users u ON f.reporter_id = u.id
            WHERE ST_DWithin(f.location, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3, false)
            ORDER BY distance ASC, f.id ASC
            LIMIT $4
            "#
        ))
        .bind(origin.longitude())
        .bind(origin.latitude())
        .bind(radius_meters)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FireWithDistance {
                fire: row.fire.into(),
                distance: row.distance,
            })
            .collect())
    }

    /// create_comment
    ///
    /// Inserts and joins the author in one statement. A foreign-key violation on the fire
    /// reference means the fire does not exist.
    async fn create_comment(&self, fire_id: i64, user_id: i64, text: &str) -> AppResult<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (fire_id, user_id, text) VALUES ($1, $2, $3)
                RETURNING id, fire_id, user_id, text, created_at
            )
            SELECT i.id, i.fire_id, i.user_id, i.text, i.created_at,
                   u.name AS author_name, u.role AS author_role, u.created_at AS author_created_at
            FROM inserted i LEFT JOIN users u ON i.user_id = u.id
            "#,
        )
        .bind(fire_id)
        .bind(user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let missing_fire = matches!(
                &e,
                sqlx::Error::Database(db) if db.constraint() == Some(COMMENT_FIRE_FK)
            );
            if missing_fire {
                AppError::NotFound("fire")
            } else {
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn list_comments(&self, fire_id: i64) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.fire_id, c.user_id, c.text, c.created_at,
                   u.name AS author_name, u.role AS author_role, u.created_at AS author_created_at
            FROM comments c
            LEFT JOIN users u ON c.user_id = u.id
            WHERE c.fire_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(fire_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }
}
