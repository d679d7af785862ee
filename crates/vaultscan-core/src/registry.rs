//! Lazy bootstrap of the singleton factory entity.
//!
//! The factory entity is created the first time a vault is deployed, from
//! the factory contract's state at that block. Every later handler only
//! loads it.

use tracing::debug;
use vaultscan_types::{ContractMethod, Factory};

use crate::error::IndexerError;
use crate::invocation::Invocation;
use crate::store::{EntityStoreExt as _, Lookup};

/// Load the factory entity, if it has been bootstrapped.
///
/// # Errors
///
/// Returns [`IndexerError::Store`] if the store fails.
pub fn load_factory(inv: &mut Invocation<'_>) -> Result<Lookup<Factory>, IndexerError> {
    Ok(inv.store.load::<Factory>(inv.ctx.factory_id())?)
}

/// Return the factory entity, creating and persisting it on first use.
///
/// A new factory starts with no vaults, the whitelisted tokens and
/// collaborating contracts read at the current block, and its snapshot
/// watermark at the current block. An existing factory is returned
/// unchanged.
///
/// # Errors
///
/// Returns [`IndexerError::Chain`] if a factory read fails, or
/// [`IndexerError::Store`] if the store fails.
pub fn ensure_factory(inv: &mut Invocation<'_>) -> Result<Factory, IndexerError> {
    if let Lookup::Found(factory) = load_factory(inv)? {
        return Ok(factory);
    }

    debug!(
        factory = inv.ctx.factory_id(),
        block = inv.block.number,
        "Bootstrapping factory entity"
    );

    let chain = &mut inv.chain;
    let factory = Factory {
        id: inv.ctx.factory_id().to_owned(),
        vault_count: 0,
        tokens: chain.whitelisted_tokens()?,
        access_manager: chain.factory_address_field(ContractMethod::AccessManager)?,
        fees_manager: chain.factory_address_field(ContractMethod::FeesManager)?,
        harvester: chain.factory_address_field(ContractMethod::Harvester)?,
        swap_router: chain.factory_address_field(ContractMethod::SwapRouter)?,
        swap_proxy: chain.factory_address_field(ContractMethod::SwapProxy)?,
        swap_adapter: chain.factory_address_field(ContractMethod::SwapAdapter)?,
        last_snapshot_block_timestamp: inv.block.timestamp,
        last_snapshot_block_number: inv.block.number,
    };
    inv.store.save(&factory)?;
    Ok(factory)
}

/// Overwrite the factory's whitelisted tokens with the on-chain list.
///
/// # Errors
///
/// Returns [`IndexerError::Chain`] if the read fails.
pub fn refresh_whitelisted_tokens(
    inv: &mut Invocation<'_>,
    factory: &mut Factory,
) -> Result<(), IndexerError> {
    factory.tokens = inv.chain.whitelisted_tokens()?;
    Ok(())
}
