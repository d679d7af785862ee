//! The per-block handler driving periodic snapshots.

use tracing::debug;

use super::{HandlerOutcome, SkipReason, load_vault};
use crate::error::IndexerError;
use crate::invocation::Invocation;
use crate::projector::project_vault;
use crate::registry::load_factory;
use crate::scheduler::{PeriodicOutcome, maybe_snapshot_all};
use crate::store::Lookup;

/// Run the periodic snapshot pass for the invocation's block.
///
/// When the gate opens, every vault on the factory's on-chain list is
/// snapshotted and every one of them that is indexed is re-projected.
/// Listed vaults that are not indexed are snapshotted only.
///
/// # Errors
///
/// Returns [`IndexerError`] if a read, the arithmetic or a save fails.
pub fn handle_new_block(inv: &mut Invocation<'_>) -> Result<HandlerOutcome, IndexerError> {
    let Lookup::Found(mut factory) = load_factory(inv)? else {
        return Ok(HandlerOutcome::Skipped(SkipReason::FactoryNotIndexed));
    };

    let PeriodicOutcome::Taken { vaults } = maybe_snapshot_all(inv, &mut factory)? else {
        return Ok(HandlerOutcome::Skipped(SkipReason::SnapshotNotDue));
    };

    for address in vaults {
        match load_vault(inv, address)? {
            Lookup::Found(mut vault) => project_vault(inv, &mut vault)?,
            Lookup::NotFound => {
                debug!(vault = %address, "Listed vault is not indexed, snapshot only");
            }
        }
    }
    Ok(HandlerOutcome::Applied)
}
