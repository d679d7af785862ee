//! Persisted entities: the factory registry, vaults, snapshots, and the
//! immutable event records.
//!
//! Entities are plain data. They are loaded from the entity store at the
//! start of a handler invocation, mutated, saved, and dropped. Nothing here
//! talks to the chain.

use alloy_primitives::{Address, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ids::{EntityKind, address_id};
use crate::reads::{ConfigProps, ConstantProps, FeesProps, HistoryProps, SecurityProps, VaultRoles};

/// A persisted entity with a stable kind and string id.
pub trait Entity: Serialize + DeserializeOwned {
    /// The storage kind of this entity type.
    const KIND: EntityKind;

    /// The entity's id.
    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($($ty:ident => $kind:ident),+ $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$kind;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )+
    };
}

impl_entity! {
    Factory => Factory,
    Vault => Vault,
    VaultSnapshot => VaultSnapshot,
    Deposit => Deposit,
    Rebalance => Rebalance,
    Redeem => Redeem,
    HarvestManagementFees => HarvestManagementFees,
    HarvestPerformanceFees => HarvestPerformanceFees,
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// The singleton factory registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factory {
    /// Well-known factory address, as an id.
    pub id: String,
    /// Number of vaults created so far.
    pub vault_count: u64,
    /// Whitelisted tokens, in on-chain order.
    pub tokens: Vec<Address>,
    /// Access manager contract.
    pub access_manager: Address,
    /// Fees manager contract.
    pub fees_manager: Address,
    /// Default fee harvester.
    pub harvester: Address,
    /// Swap router used by vaults.
    pub swap_router: Address,
    /// Swap proxy used by vaults.
    pub swap_proxy: Address,
    /// Swap adapter used by vaults.
    pub swap_adapter: Address,
    /// Block timestamp of the last periodic snapshot pass.
    pub last_snapshot_block_timestamp: u64,
    /// Block number of the last periodic snapshot pass.
    pub last_snapshot_block_number: u64,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A vault's token table as four parallel sequences, indexed by token index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTable {
    /// Token addresses.
    pub tokens: Vec<Address>,
    /// Oracle price feed per token.
    pub price_feed_addresses: Vec<Address>,
    /// Price feed precision per token, widened to 256 bits.
    pub price_feed_precisions: Vec<U256>,
    /// Denominator per token.
    pub denominators: Vec<U256>,
}

impl TokenTable {
    /// Number of tokens in the table.
    pub const fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the table is empty.
    pub const fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Live financial state read from the factory and the vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    /// Token balances held by the vault.
    pub balances: Vec<U256>,
    /// Current position per token.
    pub positions: Vec<U256>,
    /// Total value locked.
    pub tvl: U256,
    /// Raw share price before fee dilution.
    pub share_price: U256,
    /// Pending management fees, in shares.
    pub ongoing_management_fees: U256,
    /// Pending performance fees, in shares.
    pub ongoing_performance_fees: U256,
}

/// The three fee-adjusted share prices.
///
/// Always recomputed from raw state, never edited on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedPrices {
    /// Share price diluted by all pending fees.
    pub net_share_price: U256,
    /// Share price diluted by pending management fees only.
    pub share_price_net_from_mng_fees: U256,
    /// Share price diluted by pending performance fees only.
    pub share_price_net_from_perf_fees: U256,
}

impl DerivedPrices {
    /// The neutral unit price reported while no shares exist.
    pub const fn unit() -> Self {
        Self {
            net_share_price: U256::from_limbs([1, 0, 0, 0]),
            share_price_net_from_mng_fees: U256::from_limbs([1, 0, 0, 0]),
            share_price_net_from_perf_fees: U256::from_limbs([1, 0, 0, 0]),
        }
    }
}

/// Lifetime accumulators. Every field is non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultAccumulators {
    /// Management fees paid to the DAO.
    #[serde(rename = "accManagementFeesToDAO")]
    pub acc_management_fees_to_dao: U256,
    /// Management fees paid to strategists.
    pub acc_management_fees_to_strategists: U256,
    /// Performance fees paid to the DAO.
    #[serde(rename = "accPerformanceFeesToDAO")]
    pub acc_performance_fees_to_dao: U256,
    /// Performance fees paid to strategists.
    pub acc_performance_fees_to_strategists: U256,
    /// Number of deposits.
    pub deposits_count: u64,
    /// Number of rebalances.
    pub rebalances_count: u64,
    /// Number of redemptions.
    pub redemptions_count: u64,
}

/// One deployed vault and everything mirrored from its contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    /// Vault address, as an id.
    pub id: String,
    /// Id of the owning factory.
    pub factory: String,
    /// Vault address.
    pub vault: Address,
    /// Account that created the vault.
    pub creator: Address,
    /// Whether vault shares may be transferred.
    pub share_transferability: bool,
    /// Token table.
    pub token_table: TokenTable,
    /// Role assignments.
    pub roles: VaultRoles,
    /// Configuration properties.
    pub config: ConfigProps,
    /// Deployment constants.
    pub constants: ConstantProps,
    /// Fee properties.
    pub fees: FeesProps,
    /// Historical markers.
    pub history: HistoryProps,
    /// Security thresholds.
    pub security: SecurityProps,
    /// Live financial state.
    pub live: LiveState,
    /// Fee-adjusted share prices.
    pub derived: DerivedPrices,
    /// Lifetime accumulators.
    pub accumulators: VaultAccumulators,
}

impl Vault {
    /// A freshly created vault: identity set, accumulators zeroed, derived
    /// prices at the unit sentinel, everything else empty until projected.
    pub fn new(factory_id: &str, vault: Address, creator: Address) -> Self {
        Self {
            id: address_id(vault),
            factory: factory_id.to_owned(),
            vault,
            creator,
            share_transferability: false,
            token_table: TokenTable::default(),
            roles: VaultRoles::default(),
            config: ConfigProps::default(),
            constants: ConstantProps::default(),
            fees: FeesProps::default(),
            history: HistoryProps::default(),
            security: SecurityProps::default(),
            live: LiveState::default(),
            derived: DerivedPrices::unit(),
            accumulators: VaultAccumulators::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// VaultSnapshot
// ---------------------------------------------------------------------------

/// Immutable point-in-time copy of a vault's financial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSnapshot {
    /// `{factory-id}-{vault-address}-{block-number}`.
    pub id: String,
    /// Id of the owning factory.
    pub factory: String,
    /// Id of the vault.
    pub vault: String,
    /// Tokens in effect at the snapshot.
    pub tokens: Vec<Address>,
    /// Balance per token.
    pub assets_balances: Vec<U256>,
    /// Latest oracle price per token.
    pub assets_prices: Vec<U256>,
    /// Position per token.
    pub positions: Vec<U256>,
    /// Total value locked.
    pub tvl: U256,
    /// Raw share price.
    pub share_price: U256,
    /// Fee-adjusted share prices.
    pub derived: DerivedPrices,
    /// Pending management fees.
    pub pending_mng_fees: U256,
    /// Pending performance fees.
    pub pending_perf_fees: U256,
    /// Block timestamp.
    pub timestamp: u64,
    /// Block number.
    pub block_number: u64,
    /// `true` for business-event snapshots, `false` for periodic ones.
    pub triggered_by_event: bool,
}

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

/// A deposit into a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    /// `{tx-hash}-{log-index}`.
    pub id: String,
    /// Id of the vault.
    pub vault: String,
    /// Transaction sender.
    pub from: Address,
    /// Shares minted to the depositor.
    pub shares_minted: U256,
    /// Base token amount deposited.
    pub base_token_amount_in: U256,
    /// Share price right after the deposit.
    pub share_price_after: U256,
    /// Block timestamp.
    pub timestamp: u64,
}

/// A vault rebalance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rebalance {
    /// `{tx-hash}-{log-index}`.
    pub id: String,
    /// Id of the vault.
    pub vault: String,
    /// Transaction sender.
    pub from: Address,
    /// Signals before the rebalance.
    pub current_signals: Vec<U256>,
    /// Signals requested by the strategist.
    pub desired_signals: Vec<U256>,
    /// Signals actually recorded after the swap.
    pub recorded_signals: Vec<U256>,
    /// Share price right after the rebalance.
    pub share_price_after: U256,
    /// Block timestamp.
    pub timestamp: u64,
}

/// A redemption of vault shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redeem {
    /// `{tx-hash}-{log-index}`.
    pub id: String,
    /// Id of the vault.
    pub vault: String,
    /// Transaction sender.
    pub from: Address,
    /// Shares burned.
    pub share_burned: U256,
    /// Amount paid out.
    pub amount_received: U256,
    /// Share price right after the redemption.
    pub share_price_after: U256,
    /// Block timestamp.
    pub timestamp: u64,
}

/// A management fee harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestManagementFees {
    /// `{tx-hash}-{log-index}`.
    pub id: String,
    /// Id of the vault.
    pub vault: String,
    /// Transaction sender.
    pub from: Address,
    /// Amount sent to the DAO.
    #[serde(rename = "amountToDAO")]
    pub amount_to_dao: U256,
    /// Amount sent to the strategist.
    pub amount_to_strategist: U256,
    /// Block timestamp.
    pub timestamp: u64,
}

/// A performance fee harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestPerformanceFees {
    /// `{tx-hash}-{log-index}`.
    pub id: String,
    /// Id of the vault.
    pub vault: String,
    /// Transaction sender.
    pub from: Address,
    /// Amount sent to the DAO.
    #[serde(rename = "amountToDAO")]
    pub amount_to_dao: U256,
    /// Amount sent to the strategist.
    pub amount_to_strategist: U256,
    /// Block timestamp.
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    #[test]
    fn new_vault_starts_at_unit_prices_and_zero_accumulators() {
        let vault = Vault::new(
            "0xfactory",
            address!("0x00000000000000000000000000000000000000aa"),
            address!("0x00000000000000000000000000000000000000bb"),
        );
        assert_eq!(vault.id, "0x00000000000000000000000000000000000000aa");
        assert_eq!(vault.derived, DerivedPrices::unit());
        assert_eq!(vault.derived.net_share_price, U256::from(1_u64));
        assert_eq!(vault.accumulators, VaultAccumulators::default());
        assert!(!vault.share_transferability);
    }

    #[test]
    fn accumulator_names_follow_schema() {
        let json = serde_json::to_value(VaultAccumulators::default()).ok();
        let json = json.unwrap_or_default();
        assert!(json.get("accManagementFeesToDAO").is_some());
        assert!(json.get("accPerformanceFeesToStrategists").is_some());
        assert!(json.get("depositsCount").is_some());
    }

    #[test]
    fn entity_kind_is_bound_per_type() {
        assert_eq!(Factory::KIND, EntityKind::Factory);
        assert_eq!(VaultSnapshot::KIND, EntityKind::VaultSnapshot);
        assert_eq!(HarvestPerformanceFees::KIND, EntityKind::HarvestPerformanceFees);
    }
}
