//! Database pool, migrations and health check.
//!
//! Deployments run on Postgres; tests and quick local runs use SQLite. An
//! in-memory SQLite database lives inside a single connection, so the pool
//! for such URLs is pinned to one connection.

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::AppConfig;

/// Connection attempts made before giving up at startup.
const CONNECT_ATTEMPTS: u32 = 5;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
    #[error("Failed to connect to database after {attempts} attempts: {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: sea_orm::DbErr,
    },
}

fn is_sqlite_memory(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}

/// Pool options derived from the configuration.
pub fn connect_options(cfg: &AppConfig) -> Result<ConnectOptions, DatabaseError> {
    let url = cfg.database_url.trim();
    if url.is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "Database URL cannot be empty".to_string(),
        });
    }

    let max_connections = if is_sqlite_memory(url) {
        1
    } else {
        cfg.db_max_connections
    };

    let mut opt = ConnectOptions::new(url);
    opt.max_connections(max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);
    Ok(opt)
}

/// Opens the connection pool, retrying transient failures with exponential backoff.
///
/// ```no_run
/// use attendance::{config::AppConfig, db::init_pool};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let db = init_pool(&AppConfig::default()).await?;
///     attendance::db::health_check(&db).await
/// }
/// ```
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection> {
    let opt = connect_options(cfg)?;
    let mut delay = FIRST_RETRY_DELAY;
    let mut attempt = 1;

    loop {
        match Database::connect(opt.clone()).await {
            Ok(conn) => {
                log::info!(
                    "Connected to {:?} database (attempt {})",
                    conn.get_database_backend(),
                    attempt
                );
                return Ok(conn);
            }
            Err(source) if attempt >= CONNECT_ATTEMPTS => {
                log::error!("Giving up on database after {} attempts: {}", attempt, source);
                return Err(DatabaseError::Unreachable {
                    attempts: attempt,
                    source,
                }
                .into());
            }
            Err(e) => {
                log::warn!(
                    "Database connection attempt {} failed: {}, retrying in {:?}",
                    attempt,
                    e,
                    delay
                );
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// Applies all pending migrations.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .context("Failed to apply database migrations")?;
    log::info!("Database migrations are up to date");
    Ok(())
}

/// Round-trips `SELECT 1` through the pool.
pub async fn health_check(db: &DatabaseConnection) -> Result<()> {
    db.query_one(Statement::from_string(
        db.get_database_backend(),
        "SELECT 1".to_string(),
    ))
    .await
    .context("Database health check failed")?;
    Ok(())
}
