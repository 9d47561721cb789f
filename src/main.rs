use fire_tracker::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    housekeeping::{SESSION_SWEEP_INTERVAL, spawn_session_sweeper},
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects to and migrates the database, starts the
/// session sweeper and serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (.env is optional)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging. RUST_LOG wins over LOG_LEVEL.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "fire_tracker={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Background housekeeping
    let _sweeper = spawn_session_sweeper(repo.clone(), SESSION_SWEEP_INTERVAL);

    // 5. Router and server
    let addr = config.listen_addr();
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", addr);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        addr.port()
    );

    axum::serve(listener, app).await.expect("HTTP server error");
}
