//! Common test utilities

use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use bill_splitter::api::{self, AppState};
use bill_splitter::email::LogMailer;
use bill_splitter::Config;

const SCHEMA_SQL: &str = include_str!("../../migrations/schema.sql");

/// Setup test database - ensure the schema exists and truncate tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    for statement in SCHEMA_SQL.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement)
            .execute(&pool)
            .await
            .expect("Failed to apply schema");
    }

    sqlx::query(
        "TRUNCATE TABLE password_resets, guest_access, bill_participants, bills, sessions, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}

/// Build the API router over a test pool with default config
pub fn test_app(pool: PgPool) -> Router {
    let config = Config {
        database_url: String::new(),
        database_max_connections: 5,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        app_base_url: "http://localhost:3000".to_string(),
        session_ttl_minutes: 60,
        guest_access_ttl_hours: 6,
        reset_token_ttl_minutes: 60,
    };

    let state = AppState {
        pool,
        config: Arc::new(config),
        mailer: Arc::new(LogMailer),
    };

    api::create_router(state)
}
