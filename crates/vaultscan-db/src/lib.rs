//! `PostgreSQL` persistence for the vaultscan indexer.
//!
//! Entities are stored as JSON documents, one row per entity per block at
//! which the entity was written. The indexer's synchronous core talks to
//! the store through [`PgEntityStore`]'s
//! [`EntityStore`](vaultscan_core::EntityStore) implementation, which
//! bridges into the running tokio runtime.
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool, configuration and
//!   migrations
//! - [`entity_store`] -- Versioned entity documents and the sync bridge
//! - [`error`] -- Shared error types

pub mod entity_store;
pub mod error;
pub mod postgres;

pub use entity_store::{EntityVersionRow, PgEntityStore};
pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
