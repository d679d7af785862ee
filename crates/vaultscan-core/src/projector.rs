//! Vault state projection.
//!
//! [`project_vault`] rebuilds every mutable field of a vault from the chain
//! at the current block and persists it. Each property group also has its
//! own refresh function, used by the configuration handlers to apply the
//! group named by their event before the full projection.
//!
//! Projection overwrites; it never merges. Identity, share transferability
//! and the lifetime accumulators are the only fields it leaves alone, since
//! the chain does not expose them through these reads.

use alloy_primitives::U256;
use tracing::debug;
use vaultscan_types::{LiveState, TokenTable, Vault};

use crate::error::IndexerError;
use crate::invocation::Invocation;
use crate::metrics::compute_derived_prices;
use crate::store::EntityStoreExt as _;

/// Re-read the vault's full on-chain state and persist it.
///
/// # Errors
///
/// Returns [`IndexerError::Chain`] if any read fails,
/// [`IndexerError::Metrics`] if the share price arithmetic overflows, or
/// [`IndexerError::Store`] if the save fails. Nothing is persisted on error.
pub fn project_vault(inv: &mut Invocation<'_>, vault: &mut Vault) -> Result<(), IndexerError> {
    refresh_token_table(inv, vault)?;
    vault.roles = inv.chain.roles(vault.vault)?;
    refresh_config_props(inv, vault)?;
    vault.constants = inv.chain.constant_props(vault.vault)?;
    refresh_fees_props(inv, vault)?;
    vault.history = inv.chain.history_props(vault.vault)?;
    refresh_security_props(inv, vault)?;
    refresh_live_state(inv, vault)?;

    inv.store.save(&*vault)?;
    debug!(vault = %vault.id, block = inv.block.number, "Projected vault");
    Ok(())
}

/// Re-read the token table into four parallel sequences.
///
/// # Errors
///
/// Returns [`IndexerError::Chain`] if a read fails.
pub fn refresh_token_table(inv: &mut Invocation<'_>, vault: &mut Vault) -> Result<(), IndexerError> {
    let rows = inv.chain.token_rows(vault.vault)?;
    let mut table = TokenTable::default();
    for row in rows {
        table.tokens.push(row.token);
        table.price_feed_addresses.push(row.price_feed);
        table.price_feed_precisions.push(U256::from(row.price_feed_precision));
        table.denominators.push(row.denominator);
    }
    vault.token_table = table;
    Ok(())
}

/// Re-read the configuration properties.
///
/// # Errors
///
/// Returns [`IndexerError::Chain`] if the read fails.
pub fn refresh_config_props(inv: &mut Invocation<'_>, vault: &mut Vault) -> Result<(), IndexerError> {
    vault.config = inv.chain.config_props(vault.vault)?;
    Ok(())
}

/// Re-read the fee properties.
///
/// # Errors
///
/// Returns [`IndexerError::Chain`] if the read fails.
pub fn refresh_fees_props(inv: &mut Invocation<'_>, vault: &mut Vault) -> Result<(), IndexerError> {
    vault.fees = inv.chain.fees_props(vault.vault)?;
    Ok(())
}

/// Re-read the security thresholds.
///
/// # Errors
///
/// Returns [`IndexerError::Chain`] if the read fails.
pub fn refresh_security_props(
    inv: &mut Invocation<'_>,
    vault: &mut Vault,
) -> Result<(), IndexerError> {
    vault.security = inv.chain.security_props(vault.vault)?;
    Ok(())
}

/// Re-read balances, positions, TVL, pending fees and share supply, and
/// recompute the derived share prices.
fn refresh_live_state(inv: &mut Invocation<'_>, vault: &mut Vault) -> Result<(), IndexerError> {
    let address = vault.vault;
    let state = inv.chain.vault_state(address)?;
    let management_fees = inv.chain.management_fees(address)?;
    let performance_fees = inv.chain.performance_fees(address)?;
    let share_supply = inv.chain.share_state(address)?.share_supply;

    vault.derived = compute_derived_prices(
        state.share_price,
        share_supply,
        management_fees,
        performance_fees,
    )?;
    vault.live = LiveState {
        balances: state.balances,
        positions: state.positions,
        tvl: state.tvl,
        share_price: state.share_price,
        ongoing_management_fees: management_fees,
        ongoing_performance_fees: performance_fees,
    };
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use alloy_primitives::{Address, address};
    use vaultscan_types::{BlockMeta, DerivedPrices, EntityKind, SecurityProps};

    use super::*;
    use crate::chain::ChainView;
    use crate::context::IndexerContext;
    use crate::store::MemoryStore;
    use crate::testing::{ScriptedChain, VaultFixture};

    const VAULT: Address = address!("0x00000000000000000000000000000000000000aa");
    const CREATOR: Address = address!("0x00000000000000000000000000000000000000bb");

    fn project(
        ctx: &IndexerContext,
        chain: &mut ScriptedChain,
        store: &mut MemoryStore,
        vault: &mut Vault,
    ) -> Result<(), IndexerError> {
        let block = BlockMeta {
            number: 100,
            timestamp: 1000,
        };
        let mut inv = Invocation::new(
            ctx,
            ChainView::new(chain, ctx.factory_address(), block.number),
            store,
            block,
        );
        project_vault(&mut inv, vault)
    }

    fn funded_fixture() -> VaultFixture {
        let mut fixture = VaultFixture::with_tokens(&ScriptedChain::default_tokens());
        fixture.share_price = U256::from(1_000_000_u64);
        fixture.share_supply = U256::from(1000_u64);
        fixture.management_fees = U256::from(10_u64);
        fixture.performance_fees = U256::from(5_u64);
        fixture.tvl = U256::from(1_000_000_000_u64);
        fixture.balances = vec![U256::from(3_u64), U256::from(4_u64)];
        fixture.security = SecurityProps {
            max_aum: U256::from(9_u64),
            ..SecurityProps::default()
        };
        fixture
    }

    #[test]
    fn projection_mirrors_every_group() {
        let ctx = IndexerContext::default();
        let mut chain = ScriptedChain::with_factory(ctx.factory_address());
        chain.install_vault(VAULT, &funded_fixture());
        let mut store = MemoryStore::new();
        let mut vault = Vault::new(ctx.factory_id(), VAULT, CREATOR);

        let result = project(&ctx, &mut chain, &mut store, &mut vault);
        assert!(result.is_ok(), "{result:?}");

        assert_eq!(vault.token_table.len(), 2);
        assert_eq!(vault.token_table.tokens, ScriptedChain::default_tokens());
        assert_eq!(vault.token_table.price_feed_precisions, vec![U256::from(8_u64); 2]);
        assert_eq!(vault.config.name, "Test Vault");
        assert_eq!(vault.security.max_aum, U256::from(9_u64));
        assert_eq!(vault.live.balances, vec![U256::from(3_u64), U256::from(4_u64)]);
        assert_eq!(vault.live.ongoing_management_fees, U256::from(10_u64));
        assert_eq!(vault.derived.net_share_price, U256::from(985_221_u64));

        let stored = store.get::<Vault>(&vault.id);
        assert_eq!(stored.as_ref(), Some(&vault));
    }

    #[test]
    fn zero_supply_projects_unit_prices() {
        let ctx = IndexerContext::default();
        let mut chain = ScriptedChain::with_factory(ctx.factory_address());
        let mut fixture = funded_fixture();
        fixture.share_supply = U256::ZERO;
        chain.install_vault(VAULT, &fixture);
        let mut store = MemoryStore::new();
        let mut vault = Vault::new(ctx.factory_id(), VAULT, CREATOR);

        assert!(project(&ctx, &mut chain, &mut store, &mut vault).is_ok());
        assert_eq!(vault.derived, DerivedPrices::unit());
    }

    #[test]
    fn projection_is_idempotent() {
        let ctx = IndexerContext::default();
        let mut chain = ScriptedChain::with_factory(ctx.factory_address());
        chain.install_vault(VAULT, &funded_fixture());
        let mut store = MemoryStore::new();
        let mut vault = Vault::new(ctx.factory_id(), VAULT, CREATOR);

        assert!(project(&ctx, &mut chain, &mut store, &mut vault).is_ok());
        let first = serde_json::to_vec(&vault).unwrap();
        assert!(project(&ctx, &mut chain, &mut store, &mut vault).is_ok());
        let second = serde_json::to_vec(&vault).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn projection_keeps_accumulators_and_transferability() {
        let ctx = IndexerContext::default();
        let mut chain = ScriptedChain::with_factory(ctx.factory_address());
        chain.install_vault(VAULT, &funded_fixture());
        let mut store = MemoryStore::new();
        let mut vault = Vault::new(ctx.factory_id(), VAULT, CREATOR);
        vault.accumulators.deposits_count = 4;
        vault.share_transferability = true;

        assert!(project(&ctx, &mut chain, &mut store, &mut vault).is_ok());
        assert_eq!(vault.accumulators.deposits_count, 4);
        assert!(vault.share_transferability);
    }

    #[test]
    fn failed_read_aborts_before_saving() {
        let ctx = IndexerContext::default();
        let mut chain = ScriptedChain::with_factory(ctx.factory_address());
        let mut store = MemoryStore::new();
        let mut vault = Vault::new(ctx.factory_id(), VAULT, CREATOR);

        let result = project(&ctx, &mut chain, &mut store, &mut vault);
        assert!(matches!(result, Err(IndexerError::Chain(_))));
        assert_eq!(store.count(EntityKind::Vault), 0);
    }
}
