//! Shared type definitions for the vaultscan indexer.
//!
//! This crate is the single source of truth for the data the indexer reads,
//! derives and persists. It has no behavior beyond construction helpers.
//!
//! # Modules
//!
//! - [`ids`] -- Entity ids and [`EntityKind`]
//! - [`entities`] -- Factory, Vault, `VaultSnapshot` and the event records
//! - [`reads`] -- Named shapes of the multi-valued contract reads
//! - [`events`] -- Decoded chain events and the dispatch envelope
//! - [`wire`] -- Contract call requests and gateway replies

pub mod entities;
pub mod events;
pub mod ids;
pub mod reads;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use alloy_primitives::{Address, B256, U256};
pub use entities::{
    DerivedPrices, Deposit, Entity, Factory, HarvestManagementFees, HarvestPerformanceFees,
    LiveState, Rebalance, Redeem, TokenTable, Vault, VaultAccumulators, VaultSnapshot,
};
pub use events::{BlockMeta, EventMeta, FactoryEvent, IndexerEvent, TransactionMeta, VaultEvent};
pub use ids::{EntityKind, address_id, event_record_id, snapshot_id};
pub use reads::{
    ConfigProps, ConstantProps, FactoryStateView, FeesProps, HistoryProps, PendingFees,
    SecurityProps, ShareStateView, TokenRow, VaultRoles, VaultStateView, VaultStatus,
};
pub use wire::{CallReply, ContractCall, ContractMethod};
