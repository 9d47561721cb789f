//! PostgreSQL/PostGIS integration tests.
//!
//! These need a live database with the PostGIS extension available:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::Duration;
use fire_tracker::{
    AppError,
    geo::Coordinates,
    models::{FireStatus, Page, Role},
    repository::{PostgresRepository, Repository},
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

/// Names are globally unique so tests can share one database.
fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn point(latitude: f64, longitude: f64) -> Coordinates {
    Coordinates::new(latitude, longitude).unwrap()
}

// --- Identity Store ---

#[tokio::test]
#[ignore]
async fn test_find_or_create_keeps_original_role() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let name = unique_name("alice");

    let created = repo.find_or_create_user(&name, Role::User).await.unwrap();
    let again = repo
        .find_or_create_user(&name, Role::Firefighter)
        .await
        .unwrap();

    assert_eq!(created, again);
    assert_eq!(again.role, Role::User);
    assert_eq!(repo.get_user(created.id).await.unwrap(), created);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_find_or_create_yields_one_row() {
    let ctx = DbTestContext::setup().await;
    let repo = Arc::new(ctx.repository());
    let name = unique_name("racer");

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let repo = repo.clone();
            let name = name.clone();
            tokio::spawn(async move { repo.find_or_create_user(&name, Role::User).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE name = $1")
        .bind(&name)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
#[ignore]
async fn test_session_lifecycle() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = repo
        .find_or_create_user(&unique_name("bob"), Role::User)
        .await
        .unwrap();

    let session = repo
        .create_session(user.id, Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
    assert_eq!(repo.resolve_session(&session.token).await.unwrap(), user.id);

    repo.delete_session(&session.token).await.unwrap();
    repo.delete_session(&session.token).await.unwrap();
    assert!(matches!(
        repo.resolve_session(&session.token).await,
        Err(AppError::InvalidSession)
    ));
}

#[tokio::test]
#[ignore]
async fn test_expired_sessions_do_not_resolve_and_are_swept() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = repo
        .find_or_create_user(&unique_name("carol"), Role::User)
        .await
        .unwrap();

    let expired = repo
        .create_session(user.id, Duration::seconds(-1))
        .await
        .unwrap();
    assert!(matches!(
        repo.resolve_session(&expired.token).await,
        Err(AppError::InvalidSession)
    ));

    assert!(repo.delete_expired_sessions().await.unwrap() >= 1);
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE id = $1")
        .bind(&expired.token)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

// --- Report Store ---

#[tokio::test]
#[ignore]
async fn test_fire_create_get_and_update() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let reporter = repo
        .find_or_create_user(&unique_name("dave"), Role::User)
        .await
        .unwrap();

    let fire = repo
        .create_fire(reporter.id, point(37.77, -122.42), "smoke plume")
        .await
        .unwrap();
    assert_eq!(fire.status, FireStatus::Reported);
    assert!((fire.latitude - 37.77).abs() < 1e-9);
    assert!((fire.longitude + 122.42).abs() < 1e-9);
    assert_eq!(fire.reporter.as_ref().map(|u| u.id), Some(reporter.id));

    let updated = repo
        .update_fire_status(fire.id, FireStatus::Closed)
        .await
        .unwrap();
    assert_eq!(updated.status, FireStatus::Closed);
    assert!(updated.updated_at >= fire.updated_at);

    let reopened = repo
        .update_fire_status(fire.id, FireStatus::Reported)
        .await
        .unwrap();
    assert_eq!(reopened.status, FireStatus::Reported);

    assert_eq!(repo.get_fire(fire.id).await.unwrap().status, FireStatus::Reported);
    assert!(matches!(
        repo.get_fire(-1).await,
        Err(AppError::NotFound("fire"))
    ));
}

#[tokio::test]
#[ignore]
async fn test_list_fires_total_honors_filter() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let reporter = repo
        .find_or_create_user(&unique_name("erin"), Role::User)
        .await
        .unwrap();

    let before_seen = repo
        .list_fires(Some(FireStatus::Seen), Page::default())
        .await
        .unwrap()
        .total;

    let fire = repo
        .create_fire(reporter.id, point(1.0, 1.0), "brush")
        .await
        .unwrap();
    repo.update_fire_status(fire.id, FireStatus::Seen)
        .await
        .unwrap();

    let seen = repo
        .list_fires(Some(FireStatus::Seen), Page::new(Some(1), None))
        .await
        .unwrap();
    assert_eq!(seen.total, before_seen + 1);
    assert_eq!(seen.fires.len(), 1);
    assert!(seen.fires.iter().all(|f| f.status == FireStatus::Seen));
}

#[tokio::test]
#[ignore]
async fn test_fires_near_uses_sphere_distance() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let reporter = repo
        .find_or_create_user(&unique_name("frank"), Role::User)
        .await
        .unwrap();

    // A long baseline so a wrong sphere radius shows up as meters, not millimeters.
    let origin = point(0.0, 0.0);
    let far = point(0.0, 10.0);
    let fire = repo
        .create_fire(reporter.id, far, "savanna fire")
        .await
        .unwrap();

    let found = repo.fires_near(origin, 1_200_000.0, 10_000).await.unwrap();
    let hit = found
        .iter()
        .find(|f| f.fire.id == fire.id)
        .expect("fire within radius");
    assert!((hit.distance - 1_111_950.797).abs() < 0.01);
    assert!((hit.distance - origin.distance_to(&far)).abs() < 0.01);

    let none = repo.fires_near(origin, 1_111_900.0, 10_000).await.unwrap();
    assert!(none.iter().all(|f| f.fire.id != fire.id));
}

// --- Comment Store ---

#[tokio::test]
#[ignore]
async fn test_comments_on_missing_and_existing_fires() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = repo
        .find_or_create_user(&unique_name("gina"), Role::User)
        .await
        .unwrap();

    assert!(matches!(
        repo.create_comment(-1, user.id, "hello").await,
        Err(AppError::NotFound("fire"))
    ));
    assert!(repo.list_comments(-1).await.unwrap().is_empty());

    let fire = repo
        .create_fire(user.id, point(2.0, 2.0), "campfire escaped")
        .await
        .unwrap();
    let first = repo.create_comment(fire.id, user.id, "first").await.unwrap();
    repo.create_comment(fire.id, user.id, "second").await.unwrap();

    let comments = repo.list_comments(fire.id).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].id, first.id);
    assert_eq!(comments[0].user.as_ref().map(|u| u.name.clone()), Some(user.name));
}
