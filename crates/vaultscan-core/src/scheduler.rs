//! Snapshot scheduling.
//!
//! Snapshots are taken on two paths:
//!
//! - **Periodic**: on every new block, [`maybe_snapshot_all`] checks the time
//!   gate and, if strictly more than one interval has elapsed since the last
//!   periodic pass, snapshots every vault on the factory's on-chain list and
//!   advances the factory's watermark.
//! - **Event**: value-moving vault events call [`snapshot_now`], which
//!   ignores the gate.
//!
//! Historical catch-up calls the periodic path once per block, so the gate
//! must reject cheaply: a closed gate performs no reads and no writes.
//!
//! Neither path updates the vault entity. Callers re-project explicitly.

use alloy_primitives::Address;
use tracing::debug;
use vaultscan_types::{BlockMeta, Factory, VaultSnapshot, address_id, snapshot_id};

use crate::context::IndexerContext;
use crate::error::IndexerError;
use crate::invocation::Invocation;
use crate::metrics::compute_derived_prices;
use crate::store::EntityStoreExt as _;

/// Result of a periodic snapshot attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodicOutcome {
    /// The interval has not elapsed. Nothing was read or written.
    Skipped {
        /// Seconds elapsed since the last periodic pass.
        elapsed_secs: u64,
    },
    /// Every listed vault was snapshotted and the watermark advanced.
    Taken {
        /// Vaults snapshotted, in on-chain order.
        vaults: Vec<Address>,
    },
}

/// Whether the periodic pass must be skipped at `block`.
///
/// Skips while `block.timestamp - watermark <= interval`. A timestamp
/// earlier than the watermark counts as zero elapsed time.
pub const fn should_skip_periodic(ctx: &IndexerContext, factory: &Factory, block: BlockMeta) -> bool {
    elapsed_since_watermark(factory, block) <= ctx.snapshot_interval_secs()
}

const fn elapsed_since_watermark(factory: &Factory, block: BlockMeta) -> u64 {
    block
        .timestamp
        .saturating_sub(factory.last_snapshot_block_timestamp)
}

/// Snapshot every vault on the factory's on-chain list if the periodic gate
/// allows it, then advance and persist the factory watermark.
///
/// # Errors
///
/// Returns [`IndexerError`] if a read, the arithmetic or a save fails.
pub fn maybe_snapshot_all(
    inv: &mut Invocation<'_>,
    factory: &mut Factory,
) -> Result<PeriodicOutcome, IndexerError> {
    let block = inv.block;
    if should_skip_periodic(inv.ctx, factory, block) {
        let elapsed_secs = elapsed_since_watermark(factory, block);
        debug!(
            block = block.number,
            elapsed_secs,
            interval_secs = inv.ctx.snapshot_interval_secs(),
            "Periodic snapshot gate closed"
        );
        return Ok(PeriodicOutcome::Skipped { elapsed_secs });
    }

    let vaults = inv.chain.factory_state()?.vaults;
    debug!(
        block = block.number,
        vaults = vaults.len(),
        "Periodic snapshot gate open"
    );
    for &vault in &vaults {
        build_snapshot(inv, factory, vault, false)?;
    }

    factory.last_snapshot_block_timestamp = block.timestamp;
    factory.last_snapshot_block_number = block.number;
    inv.store.save(&*factory)?;

    Ok(PeriodicOutcome::Taken { vaults })
}

/// Snapshot one vault immediately, regardless of the periodic gate.
///
/// # Errors
///
/// Returns [`IndexerError`] if a read, the arithmetic or the save fails.
pub fn snapshot_now(
    inv: &mut Invocation<'_>,
    factory: &Factory,
    vault: Address,
) -> Result<VaultSnapshot, IndexerError> {
    build_snapshot(inv, factory, vault, true)
}

/// Read a vault's financial state and persist it as an immutable snapshot.
fn build_snapshot(
    inv: &mut Invocation<'_>,
    factory: &Factory,
    vault: Address,
    triggered_by_event: bool,
) -> Result<VaultSnapshot, IndexerError> {
    let chain = &mut inv.chain;
    let status = chain.vault_status(vault)?;
    let rows = chain.token_rows(vault)?;
    let mut tokens = Vec::with_capacity(rows.len());
    let mut assets_prices = Vec::with_capacity(rows.len());
    for row in rows {
        assets_prices.push(chain.latest_price(vault, row.price_feed)?);
        tokens.push(row.token);
    }
    let assets_balances = chain.vault_balances(vault)?;
    let pending_mng_fees = chain.management_fees(vault)?;
    let pending_perf_fees = chain.performance_fees(vault)?;
    let share_supply = chain.share_state(vault)?.share_supply;

    let derived = compute_derived_prices(
        status.share_price,
        share_supply,
        pending_mng_fees,
        pending_perf_fees,
    )?;

    let snapshot = VaultSnapshot {
        id: snapshot_id(&factory.id, vault, inv.block.number),
        factory: factory.id.clone(),
        vault: address_id(vault),
        tokens,
        assets_balances,
        assets_prices,
        positions: status.positions,
        tvl: status.tvl,
        share_price: status.share_price,
        derived,
        pending_mng_fees,
        pending_perf_fees,
        timestamp: inv.block.timestamp,
        block_number: inv.block.number,
        triggered_by_event,
    };
    inv.store.save(&snapshot)?;
    debug!(
        snapshot = %snapshot.id,
        triggered_by_event,
        "Saved vault snapshot"
    );
    Ok(snapshot)
}
