//! Handlers for events emitted by the factory.

use alloy_primitives::Address;
use tracing::debug;
use vaultscan_types::{EntityKind, EventMeta, Factory, FactoryEvent, Vault};

use super::{HandlerOutcome, SkipReason, load_vault};
use crate::error::IndexerError;
use crate::invocation::Invocation;
use crate::projector::project_vault;
use crate::registry::{ensure_factory, load_factory, refresh_whitelisted_tokens};
use crate::store::{EntityStoreExt as _, Lookup};

/// Apply one factory event.
///
/// # Errors
///
/// Returns [`IndexerError`] if a read, the arithmetic or a save fails.
pub fn handle_factory_event(
    inv: &mut Invocation<'_>,
    meta: &EventMeta,
    event: &FactoryEvent,
) -> Result<HandlerOutcome, IndexerError> {
    if let FactoryEvent::VaultCreated { vault } = event {
        return handle_vault_created(inv, meta, *vault);
    }

    let Lookup::Found(mut factory) = load_factory(inv)? else {
        return Ok(HandlerOutcome::Skipped(SkipReason::FactoryNotIndexed));
    };

    match event {
        FactoryEvent::VaultCreated { .. } | FactoryEvent::OwnershipTransferred { .. } => {
            // Creation is handled above. The owner is not persisted.
            return Ok(HandlerOutcome::Applied);
        }
        FactoryEvent::SetAccessManager { new_access_manager } => {
            factory.access_manager = *new_access_manager;
        }
        FactoryEvent::SetFeesManager { new_fees_manager } => {
            factory.fees_manager = *new_fees_manager;
        }
        FactoryEvent::SetHarvester { new_harvester } => {
            factory.harvester = *new_harvester;
        }
        FactoryEvent::SetSwapContracts {
            new_swap_router,
            new_swap_proxy,
        } => {
            factory.swap_router = *new_swap_router;
            factory.swap_proxy = *new_swap_proxy;
        }
        FactoryEvent::SetSwapAdapter { new_swap_adapter } => {
            factory.swap_adapter = *new_swap_adapter;
        }
        FactoryEvent::AddTokensAndPriceFeeds | FactoryEvent::RemoveTokensAndPriceFeeds => {
            refresh_whitelisted_tokens(inv, &mut factory)?;
        }
    }

    inv.store.save(&factory)?;
    Ok(HandlerOutcome::Applied)
}

/// Register a newly deployed vault.
///
/// Bootstraps the factory if needed, counts the vault, creates it with
/// zeroed accumulators and unit prices, projects its on-chain state, and
/// registers it for vault event routing.
fn handle_vault_created(
    inv: &mut Invocation<'_>,
    meta: &EventMeta,
    address: Address,
) -> Result<HandlerOutcome, IndexerError> {
    let mut factory = ensure_factory(inv)?;

    if load_vault(inv, address)?.is_found() {
        debug!(vault = %address, "Vault already indexed, ignoring creation event");
        return Ok(HandlerOutcome::Skipped(SkipReason::VaultAlreadyIndexed));
    }

    factory.vault_count = increment_vault_count(&factory)?;
    inv.store.save(&factory)?;

    let mut vault = Vault::new(&factory.id, address, meta.transaction.from);
    project_vault(inv, &mut vault)?;
    inv.register_template(address);

    debug!(
        vault = %vault.id,
        vault_count = factory.vault_count,
        "Indexed new vault"
    );
    Ok(HandlerOutcome::Applied)
}

fn increment_vault_count(factory: &Factory) -> Result<u64, IndexerError> {
    factory
        .vault_count
        .checked_add(1)
        .ok_or_else(|| IndexerError::AccumulatorOverflow {
            kind: EntityKind::Factory,
            id: factory.id.clone(),
            field: "vaultCount",
        })
}
