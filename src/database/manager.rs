use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
                return DatabaseError::Conflict(constraint);
            }
        }
        DatabaseError::Sqlx(err)
    }
}

/// Process-wide connection pool for the application database
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    fn instance() -> Result<&'static DatabaseManager, DatabaseError> {
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        if let Some(manager) = INSTANCE.get() {
            return Ok(manager);
        }

        let pool = Self::connect_lazy()?;
        Ok(INSTANCE.get_or_init(|| DatabaseManager { pool }))
    }

    /// Builds the pool without opening a connection; the first query connects.
    fn connect_lazy() -> Result<PgPool, DatabaseError> {
        let settings = &config::config().database;
        let url = settings
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect_lazy(url)?;

        info!(max_connections = settings.max_connections, "Created database pool");
        Ok(pool)
    }

    /// Get the shared pool
    pub fn pool() -> Result<PgPool, DatabaseError> {
        Ok(Self::instance()?.pool.clone())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate() -> Result<(), DatabaseError> {
        let pool = Self::pool()?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Sqlx(e.into()))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close() {
        if let Ok(manager) = Self::instance() {
            manager.pool.close().await;
            info!("Closed database pool");
        }
    }
}
