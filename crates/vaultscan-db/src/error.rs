//! Failures of the `PostgreSQL` entity store.
//!
//! The synchronous core only sees these as [`StoreError::Backend`], which
//! the service treats as transient and retries.

use vaultscan_core::StoreError;

/// Failures opening, migrating or querying the entity store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A query, transaction or connection attempt failed.
    #[error("entity store query failed: {0}")]
    Postgres(#[from] sqlx::Error),

    /// The schema could not be brought up to date.
    #[error("entity store migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A block number does not fit the `BIGINT` column.
    #[error("block {0} is beyond the storable range")]
    BlockOutOfRange(u64),

    /// The pool settings are unusable.
    #[error("entity store misconfigured: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        Self::Backend {
            message: e.to_string(),
        }
    }
}
