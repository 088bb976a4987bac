//! Postgres implementation of the repository traits.

mod businesses;
mod clients;
mod invoices;
mod jobs;
mod roster;
mod subscriptions;
mod users;

use sqlx::PgPool;

use super::manager::{DatabaseError, DatabaseManager};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store backed by the process-wide pool.
    pub fn from_manager() -> Result<Self, DatabaseError> {
        Ok(Self::new(DatabaseManager::pool()?))
    }
}
