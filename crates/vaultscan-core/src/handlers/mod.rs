//! Event handlers.
//!
//! One entry point per event source:
//!
//! - [`factory::handle_factory_event`] -- events emitted by the factory
//! - [`vault::handle_vault_event`] -- events emitted by a registered vault
//! - [`block::handle_new_block`] -- the periodic snapshot pass
//!
//! Every handler first loads the factory and does nothing if it has not been
//! bootstrapped yet; only vault creation bootstraps it. Vault handlers then
//! load the vault named by the event's source address and do nothing if it
//! is not indexed. Those early returns are reported as
//! [`HandlerOutcome::Skipped`], not as errors.

pub mod block;
pub mod factory;
pub mod vault;

use std::fmt;

use alloy_primitives::Address;
use vaultscan_types::{Vault, address_id};

use crate::error::IndexerError;
use crate::invocation::Invocation;
use crate::store::{EntityStoreExt as _, Lookup};

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The event was applied.
    Applied,
    /// The event was deliberately ignored.
    Skipped(SkipReason),
}

/// Why a handler ignored an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The factory entity does not exist yet.
    FactoryNotIndexed,
    /// The event's vault is not indexed.
    VaultNotIndexed,
    /// A vault-created event named a vault that is already indexed.
    VaultAlreadyIndexed,
    /// The periodic snapshot interval has not elapsed.
    SnapshotNotDue,
    /// The event's source is not registered for vault event routing.
    UnregisteredSource,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FactoryNotIndexed => "factory not indexed",
            Self::VaultNotIndexed => "vault not indexed",
            Self::VaultAlreadyIndexed => "vault already indexed",
            Self::SnapshotNotDue => "snapshot not due",
            Self::UnregisteredSource => "unregistered source",
        };
        f.write_str(text)
    }
}

/// Load the vault whose contract is at `address`.
fn load_vault(inv: &mut Invocation<'_>, address: Address) -> Result<Lookup<Vault>, IndexerError> {
    Ok(inv.store.load::<Vault>(&address_id(address))?)
}
