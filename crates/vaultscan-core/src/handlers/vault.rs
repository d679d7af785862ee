//! Handlers for events emitted by a registered vault.
//!
//! Value-moving events (deposit, rebalance, redemption and both fee
//! harvests) record an immutable event entity, bump the vault's
//! accumulators, take an event-triggered snapshot and re-project the vault.
//! Configuration and role events re-read what changed and re-project,
//! without a snapshot.

use alloy_primitives::U256;
use tracing::debug;
use vaultscan_types::{
    Deposit, EntityKind, EventMeta, HarvestManagementFees, HarvestPerformanceFees,
    Rebalance, Redeem, Vault, VaultEvent, event_record_id,
};

use super::{HandlerOutcome, SkipReason, load_vault};
use crate::error::IndexerError;
use crate::invocation::Invocation;
use crate::projector::{
    project_vault, refresh_config_props, refresh_fees_props, refresh_security_props,
    refresh_token_table,
};
use crate::registry::load_factory;
use crate::scheduler::snapshot_now;
use crate::store::{EntityStoreExt as _, Lookup};

/// Apply one vault event.
///
/// # Errors
///
/// Returns [`IndexerError`] if a read, the arithmetic or a save fails.
pub fn handle_vault_event(
    inv: &mut Invocation<'_>,
    meta: &EventMeta,
    event: &VaultEvent,
) -> Result<HandlerOutcome, IndexerError> {
    let Lookup::Found(factory) = load_factory(inv)? else {
        return Ok(HandlerOutcome::Skipped(SkipReason::FactoryNotIndexed));
    };
    let Lookup::Found(mut vault) = load_vault(inv, meta.address)? else {
        debug!(vault = %meta.address, "Event from a vault that is not indexed");
        return Ok(HandlerOutcome::Skipped(SkipReason::VaultNotIndexed));
    };

    match event {
        VaultEvent::Deposit {
            shares_minted,
            base_token_amount_in,
        } => {
            let status = inv.chain.vault_status(vault.vault)?;
            inv.store.save(&Deposit {
                id: record_id(meta),
                vault: vault.id.clone(),
                from: meta.transaction.from,
                shares_minted: *shares_minted,
                base_token_amount_in: *base_token_amount_in,
                share_price_after: status.share_price,
                timestamp: meta.block.timestamp,
            })?;
            vault.accumulators.deposits_count =
                increment(&vault, vault.accumulators.deposits_count, "depositsCount")?;
        }
        VaultEvent::Rebalance {
            current_signals,
            desired_signals,
        } => {
            let status = inv.chain.vault_status(vault.vault)?;
            inv.store.save(&Rebalance {
                id: record_id(meta),
                vault: vault.id.clone(),
                from: meta.transaction.from,
                current_signals: current_signals.clone(),
                desired_signals: desired_signals.clone(),
                recorded_signals: status.positions,
                share_price_after: status.share_price,
                timestamp: meta.block.timestamp,
            })?;
            vault.accumulators.rebalances_count =
                increment(&vault, vault.accumulators.rebalances_count, "rebalancesCount")?;
        }
        VaultEvent::Redeem {
            share_burned,
            amount_received,
        } => {
            let status = inv.chain.vault_status(vault.vault)?;
            inv.store.save(&Redeem {
                id: record_id(meta),
                vault: vault.id.clone(),
                from: meta.transaction.from,
                share_burned: *share_burned,
                amount_received: *amount_received,
                share_price_after: status.share_price,
                timestamp: meta.block.timestamp,
            })?;
            vault.accumulators.redemptions_count =
                increment(&vault, vault.accumulators.redemptions_count, "redemptionsCount")?;
        }
        VaultEvent::HarvestManagementFees {
            amount_to_dao,
            amount_to_strategist,
        } => {
            inv.store.save(&HarvestManagementFees {
                id: record_id(meta),
                vault: vault.id.clone(),
                from: meta.transaction.from,
                amount_to_dao: *amount_to_dao,
                amount_to_strategist: *amount_to_strategist,
                timestamp: meta.block.timestamp,
            })?;
            let acc = &vault.accumulators;
            let to_dao = accumulate(
                &vault,
                acc.acc_management_fees_to_dao,
                *amount_to_dao,
                "accManagementFeesToDAO",
            )?;
            let to_strategists = accumulate(
                &vault,
                acc.acc_management_fees_to_strategists,
                *amount_to_strategist,
                "accManagementFeesToStrategists",
            )?;
            vault.accumulators.acc_management_fees_to_dao = to_dao;
            vault.accumulators.acc_management_fees_to_strategists = to_strategists;
        }
        VaultEvent::HarvestPerformanceFees {
            amount_to_dao,
            amount_to_strategist,
        } => {
            inv.store.save(&HarvestPerformanceFees {
                id: record_id(meta),
                vault: vault.id.clone(),
                from: meta.transaction.from,
                amount_to_dao: *amount_to_dao,
                amount_to_strategist: *amount_to_strategist,
                timestamp: meta.block.timestamp,
            })?;
            let acc = &vault.accumulators;
            let to_dao = accumulate(
                &vault,
                acc.acc_performance_fees_to_dao,
                *amount_to_dao,
                "accPerformanceFeesToDAO",
            )?;
            let to_strategists = accumulate(
                &vault,
                acc.acc_performance_fees_to_strategists,
                *amount_to_strategist,
                "accPerformanceFeesToStrategists",
            )?;
            vault.accumulators.acc_performance_fees_to_dao = to_dao;
            vault.accumulators.acc_performance_fees_to_strategists = to_strategists;
        }
        VaultEvent::AddAsset => refresh_token_table(inv, &mut vault)?,
        VaultEvent::SetShareTransferability { status } => vault.share_transferability = *status,
        VaultEvent::SetSecurityProps => refresh_security_props(inv, &mut vault)?,
        VaultEvent::SetConfigProps => refresh_config_props(inv, &mut vault)?,
        VaultEvent::SetFeesProps => refresh_fees_props(inv, &mut vault)?,
        VaultEvent::RoleAdminChanged { role, .. }
        | VaultEvent::RoleGranted { role, .. }
        | VaultEvent::RoleRevoked { role, .. } => {
            debug!(vault = %vault.id, role = %role, "Role change, re-projecting vault");
        }
    }

    inv.store.save(&vault)?;
    if event.moves_value() {
        snapshot_now(inv, &factory, vault.vault)?;
    }
    project_vault(inv, &mut vault)?;
    Ok(HandlerOutcome::Applied)
}

fn record_id(meta: &EventMeta) -> String {
    event_record_id(meta.transaction.hash, meta.log_index)
}

fn increment(vault: &Vault, count: u64, field: &'static str) -> Result<u64, IndexerError> {
    count.checked_add(1).ok_or_else(|| overflow(vault, field))
}

fn accumulate(
    vault: &Vault,
    total: U256,
    amount: U256,
    field: &'static str,
) -> Result<U256, IndexerError> {
    total.checked_add(amount).ok_or_else(|| overflow(vault, field))
}

fn overflow(vault: &Vault, field: &'static str) -> IndexerError {
    IndexerError::AccumulatorOverflow {
        kind: EntityKind::Vault,
        id: vault.id.clone(),
        field,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use alloy_primitives::{Address, B256, address};
    use vaultscan_types::{
        BlockMeta, ConfigProps, Factory, FactoryEvent, TransactionMeta, VaultSnapshot, address_id,
        snapshot_id,
    };

    use super::*;
    use crate::chain::ChainView;
    use crate::context::IndexerContext;
    use crate::handlers::factory::handle_factory_event;
    use crate::store::{EntityStore as _, EntityStoreExt as _, MemoryStore};
    use crate::testing::{ScriptedChain, VaultFixture};

    const VAULT: Address = address!("0x00000000000000000000000000000000000000aa");
    const USER: Address = address!("0x00000000000000000000000000000000000000bb");

    struct Harness {
        ctx: IndexerContext,
        chain: ScriptedChain,
        store: MemoryStore,
        fixture: VaultFixture,
    }

    impl Harness {
        /// A factory with one indexed vault, created at block 100.
        fn new() -> Self {
            let ctx = IndexerContext::default();
            let mut chain = ScriptedChain::with_factory(ctx.factory_address());
            let fixture = VaultFixture::with_tokens(&ScriptedChain::default_tokens());
            chain.install_vault(VAULT, &fixture);
            chain.set_factory_vaults(vec![VAULT]);
            let mut harness = Self {
                ctx,
                chain,
                store: MemoryStore::new(),
                fixture,
            };
            let meta = harness.meta(harness.ctx.factory_address(), 100, 0);
            harness.store.scope_to_block(100);
            let mut inv = Invocation::new(
                &harness.ctx,
                ChainView::new(&mut harness.chain, harness.ctx.factory_address(), 100),
                &mut harness.store,
                meta.block,
            );
            handle_factory_event(&mut inv, &meta, &FactoryEvent::VaultCreated { vault: VAULT })
                .unwrap();
            harness
        }

        fn meta(&self, address: Address, number: u64, log_index: u64) -> EventMeta {
            EventMeta {
                address,
                block: BlockMeta {
                    number,
                    timestamp: 1_000 + number * 12,
                },
                transaction: TransactionMeta {
                    hash: B256::with_last_byte(u8::try_from(number % 256).unwrap()),
                    from: USER,
                },
                log_index,
            }
        }

        fn apply(&mut self, number: u64, log_index: u64, event: &VaultEvent) -> HandlerOutcome {
            let meta = self.meta(VAULT, number, log_index);
            self.store.scope_to_block(number);
            let mut inv = Invocation::new(
                &self.ctx,
                ChainView::new(&mut self.chain, self.ctx.factory_address(), number),
                &mut self.store,
                meta.block,
            );
            handle_vault_event(&mut inv, &meta, event).unwrap()
        }

        fn vault(&self) -> Vault {
            self.store.get::<Vault>(&address_id(VAULT)).unwrap()
        }
    }

    #[test]
    fn deposit_records_event_snapshots_and_reprojects() {
        let mut h = Harness::new();
        h.fixture.share_price = U256::from(1_000_000_u64);
        h.fixture.share_supply = U256::from(1000_u64);
        h.fixture.management_fees = U256::from(10_u64);
        h.fixture.performance_fees = U256::from(5_u64);
        h.chain.install_vault(VAULT, &h.fixture);

        let outcome = h.apply(
            101,
            3,
            &VaultEvent::Deposit {
                shares_minted: U256::from(1000_u64),
                base_token_amount_in: U256::from(1_000_000_000_u64),
            },
        );
        assert_eq!(outcome, HandlerOutcome::Applied);

        let meta = h.meta(VAULT, 101, 3);
        let deposit = h
            .store
            .get::<Deposit>(&event_record_id(meta.transaction.hash, 3))
            .unwrap();
        assert_eq!(deposit.from, USER);
        assert_eq!(deposit.share_price_after, U256::from(1_000_000_u64));
        assert_eq!(deposit.vault, address_id(VAULT));

        let snapshot = h
            .store
            .get::<VaultSnapshot>(&snapshot_id(h.ctx.factory_id(), VAULT, 101))
            .unwrap();
        assert!(snapshot.triggered_by_event);

        let vault = h.vault();
        assert_eq!(vault.accumulators.deposits_count, 1);
        assert_eq!(vault.derived.net_share_price, U256::from(985_221_u64));
    }

    #[test]
    fn two_deposits_in_one_transaction_keep_both_records() {
        let mut h = Harness::new();
        let deposit = VaultEvent::Deposit {
            shares_minted: U256::from(1_u64),
            base_token_amount_in: U256::from(1_u64),
        };
        h.apply(101, 0, &deposit);
        h.apply(101, 1, &deposit);
        assert_eq!(h.store.count(EntityKind::Deposit), 2);
        assert_eq!(h.vault().accumulators.deposits_count, 2);
    }

    #[test]
    fn rebalance_records_positions_after_the_swap() {
        let mut h = Harness::new();
        h.fixture.positions = vec![U256::from(6_u64), U256::from(4_u64)];
        h.chain.install_vault(VAULT, &h.fixture);

        h.apply(
            101,
            0,
            &VaultEvent::Rebalance {
                current_signals: vec![U256::from(5_u64), U256::from(5_u64)],
                desired_signals: vec![U256::from(7_u64), U256::from(3_u64)],
            },
        );
        let meta = h.meta(VAULT, 101, 0);
        let rebalance = h
            .store
            .get::<Rebalance>(&event_record_id(meta.transaction.hash, 0))
            .unwrap();
        assert_eq!(rebalance.recorded_signals, h.fixture.positions);
        assert_eq!(rebalance.desired_signals, vec![U256::from(7_u64), U256::from(3_u64)]);
        assert_eq!(h.vault().accumulators.rebalances_count, 1);
    }

    #[test]
    fn harvests_accumulate_per_fee_kind() {
        let mut h = Harness::new();
        let management = VaultEvent::HarvestManagementFees {
            amount_to_dao: U256::from(30_u64),
            amount_to_strategist: U256::from(10_u64),
        };
        let performance = VaultEvent::HarvestPerformanceFees {
            amount_to_dao: U256::from(8_u64),
            amount_to_strategist: U256::from(2_u64),
        };
        h.apply(101, 0, &management);
        h.apply(102, 0, &management);
        h.apply(103, 0, &performance);

        let acc = h.vault().accumulators;
        assert_eq!(acc.acc_management_fees_to_dao, U256::from(60_u64));
        assert_eq!(acc.acc_management_fees_to_strategists, U256::from(20_u64));
        assert_eq!(acc.acc_performance_fees_to_dao, U256::from(8_u64));
        assert_eq!(acc.acc_performance_fees_to_strategists, U256::from(2_u64));
        assert_eq!(h.store.count(EntityKind::HarvestManagementFees), 2);
        assert_eq!(h.store.count(EntityKind::HarvestPerformanceFees), 1);
        assert_eq!(h.store.count(EntityKind::VaultSnapshot), 3);
    }

    #[test]
    fn accumulator_overflow_is_an_error() {
        let mut h = Harness::new();
        let mut vault = h.vault();
        vault.accumulators.acc_performance_fees_to_dao = U256::MAX;
        h.store.save(&vault).unwrap();

        let meta = h.meta(VAULT, 101, 0);
        h.store.scope_to_block(101);
        let mut inv = Invocation::new(
            &h.ctx,
            ChainView::new(&mut h.chain, h.ctx.factory_address(), 101),
            &mut h.store,
            meta.block,
        );
        let result = handle_vault_event(
            &mut inv,
            &meta,
            &VaultEvent::HarvestPerformanceFees {
                amount_to_dao: U256::from(1_u64),
                amount_to_strategist: U256::ZERO,
            },
        );
        assert!(matches!(
            result,
            Err(IndexerError::AccumulatorOverflow {
                field: "accPerformanceFeesToDAO",
                ..
            })
        ));
    }

    #[test]
    fn config_change_rereads_props_without_snapshot() {
        let mut h = Harness::new();
        h.fixture.config = ConfigProps {
            paused: true,
            verified: true,
            name: "Renamed".to_owned(),
            description: "New description".to_owned(),
        };
        h.chain.install_vault(VAULT, &h.fixture);

        h.apply(101, 0, &VaultEvent::SetConfigProps);
        let vault = h.vault();
        assert!(vault.config.paused);
        assert_eq!(vault.config.name, "Renamed");
        assert_eq!(h.store.count(EntityKind::VaultSnapshot), 0);
    }

    #[test]
    fn share_transferability_is_taken_from_the_event() {
        let mut h = Harness::new();
        h.apply(101, 0, &VaultEvent::SetShareTransferability { status: true });
        assert!(h.vault().share_transferability);
        h.apply(102, 0, &VaultEvent::SetShareTransferability { status: false });
        assert!(!h.vault().share_transferability);
    }

    #[test]
    fn role_change_reprojects_roles() {
        let mut h = Harness::new();
        h.fixture.roles.strategists = vec![USER];
        h.chain.install_vault(VAULT, &h.fixture);

        h.apply(
            101,
            0,
            &VaultEvent::RoleGranted {
                role: B256::repeat_byte(0x01),
                account: USER,
                sender: USER,
            },
        );
        assert_eq!(h.vault().roles.strategists, vec![USER]);
        assert_eq!(h.store.count(EntityKind::VaultSnapshot), 0);
    }

    #[test]
    fn events_from_unknown_vaults_are_skipped() {
        let mut h = Harness::new();
        let stranger = address!("0x00000000000000000000000000000000000000cc");
        let meta = h.meta(stranger, 101, 0);
        h.store.scope_to_block(101);
        let versions = h.store.version_count();
        let mut inv = Invocation::new(
            &h.ctx,
            ChainView::new(&mut h.chain, h.ctx.factory_address(), 101),
            &mut h.store,
            meta.block,
        );
        let outcome = handle_vault_event(&mut inv, &meta, &VaultEvent::AddAsset).unwrap();
        assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::VaultNotIndexed));
        assert_eq!(h.store.version_count(), versions);
    }

    #[test]
    fn vault_events_before_factory_bootstrap_are_skipped() {
        let ctx = IndexerContext::default();
        let mut chain = ScriptedChain::with_factory(ctx.factory_address());
        let mut store = MemoryStore::new();
        let meta = EventMeta {
            address: VAULT,
            ..EventMeta::default()
        };
        let mut inv = Invocation::new(
            &ctx,
            ChainView::new(&mut chain, ctx.factory_address(), 0),
            &mut store,
            meta.block,
        );
        let outcome = handle_vault_event(&mut inv, &meta, &VaultEvent::SetFeesProps).unwrap();
        assert_eq!(outcome, HandlerOutcome::Skipped(SkipReason::FactoryNotIndexed));
        assert!(store.get::<Factory>(ctx.factory_id()).is_none());
    }
}
