//! Vault state projection, share-price metrics, and snapshot scheduling for
//! the vaultscan indexer.
//!
//! This crate is the synchronous heart of the indexer. It knows nothing
//! about NATS or `PostgreSQL`: chain reads go through [`ChainReader`] and
//! persistence through [`EntityStore`], and the runtime supplies both.
//!
//! # Modules
//!
//! - [`chain`] -- [`ChainReader`] seam and the typed [`ChainView`] over it.
//! - [`config`] -- Configuration loading from `vaultscan-config.yaml`.
//! - [`context`] -- The injected deployment context.
//! - [`dispatch`] -- [`Dispatcher`]: routing, staging and template
//!   registration.
//! - [`error`] -- [`IndexerError`], the invocation-aborting fault.
//! - [`handlers`] -- Factory, vault and block handlers.
//! - [`invocation`] -- The state one handler invocation works against.
//! - [`metrics`] -- Fee-adjusted share prices.
//! - [`projector`] -- Re-reading a vault's full state into its entity.
//! - [`registry`] -- Lazy bootstrap of the factory entity.
//! - [`scheduler`] -- Periodic and event-triggered snapshots.
//! - [`store`] -- [`EntityStore`] seam, write staging and the in-memory
//!   backend.
//! - [`testing`] -- A scripted in-memory chain for tests and replays.
//!
//! [`ChainReader`]: chain::ChainReader
//! [`ChainView`]: chain::ChainView
//! [`EntityStore`]: store::EntityStore
//! [`Dispatcher`]: dispatch::Dispatcher
//! [`IndexerError`]: error::IndexerError

pub mod chain;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod invocation;
pub mod metrics;
pub mod projector;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod testing;

pub use chain::{ChainError, ChainReader};
pub use context::IndexerContext;
pub use dispatch::{Dispatcher, TemplateRegistry, VaultTemplates};
pub use error::IndexerError;
pub use handlers::{HandlerOutcome, SkipReason};
pub use store::{EntityStore, EntityStoreExt, Lookup, MemoryStore, StoreError, StoredEntity};
