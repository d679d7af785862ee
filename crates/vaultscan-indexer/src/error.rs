//! Error types for the indexer service binary.
//!
//! [`ServiceError`] is the top-level error type that wraps all possible
//! failure modes during startup and event processing.

use vaultscan_core::IndexerError;

/// Top-level error for the indexer service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: vaultscan_core::config::ConfigError,
    },

    /// The entity store could not be reached or migrated.
    #[error("database error: {source}")]
    Db {
        /// The underlying database error.
        #[from]
        source: vaultscan_db::DbError,
    },

    /// NATS connection or subscription failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },

    /// An event envelope could not be decoded.
    #[error("undecodable event on {subject}: {source}")]
    Decode {
        /// Subject the message arrived on.
        subject: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// An event kept failing and processing stopped.
    #[error("halted at block {block} after {attempts} attempt(s): {source}")]
    Halted {
        /// Block of the failing event.
        block: u64,
        /// Dispatch attempts made.
        attempts: u32,
        /// The last failure.
        source: IndexerError,
    },
}
