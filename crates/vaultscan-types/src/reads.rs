//! Named shapes for the multi-valued contract reads.
//!
//! The vault and factory contracts return tuples. Each tuple the indexer
//! consumes has a named struct here so that fields are picked by name,
//! never by position. Fields the indexer does not use are simply absent:
//! decoding ignores unknown keys.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vault contract
// ---------------------------------------------------------------------------

/// One row of a vault's token table (`tokens(index)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRow {
    /// The token address.
    pub token: Address,
    /// The oracle price feed configured for the token.
    pub price_feed: Address,
    /// Decimal precision of the price feed.
    pub price_feed_precision: u8,
    /// Token denominator (`10^decimals`).
    pub denominator: U256,
}

/// Configuration properties (`getConfigProps`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProps {
    /// Whether deposits and swaps are paused.
    pub paused: bool,
    /// Whether the vault has been verified by the DAO.
    pub verified: bool,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Immutable properties fixed at deployment (`getConstantProps`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantProps {
    /// The factory that deployed the vault.
    pub factory: Address,
    /// Deployment timestamp.
    pub created_at: U256,
    /// The vault's share token.
    pub share: Address,
}

/// Fee properties (`getFeesProps`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeesProps {
    /// Receiver of the strategist share of fees.
    pub beneficiary: Address,
    /// Fee charged on redemption.
    pub exit_fees: U256,
    /// Annual management fee rate.
    pub management_fees_rate: U256,
    /// Strategist split of management fees.
    pub management_fees_to_strategist: U256,
    /// Performance fee rate.
    pub performance_fees_rate: U256,
    /// Strategist split of performance fees.
    pub performance_fees_to_strategist: U256,
}

/// Historical markers kept by the vault (`getHistoryProps`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryProps {
    /// Highest net asset value recorded, gating performance fees.
    pub high_water_mark: U256,
    /// Signals applied by the previous rebalance.
    pub prev_rebalance_signals: Vec<U256>,
    /// Timestamp of the previous swap.
    pub prev_swap: U256,
    /// Timestamp of the previous management fee harvest.
    pub prev_mng_harvest: U256,
}

/// Security thresholds (`getSecurityProps`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProps {
    /// Maximum assets under management.
    #[serde(rename = "maxAUM")]
    pub max_aum: U256,
    /// Maximum tolerated loss on a swap.
    pub max_loss_swap: U256,
    /// Minimum deposit amount.
    pub min_amount_deposit: U256,
    /// Maximum deposit amount.
    pub max_amount_deposit: U256,
    /// Minimum delay between swaps.
    pub min_frequency_swap: U256,
    /// Minimum delay enforced on sensitive operations.
    pub min_security_time: U256,
    /// Minimum amount worth harvesting.
    pub min_harvest_threshold: U256,
}

/// Post-operation status tuple (`getVaultStatus`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    /// Current position per token.
    pub positions: Vec<U256>,
    /// Total value locked.
    pub tvl: U256,
    /// Raw share price.
    pub share_price: U256,
}

/// A pending fee reading (`getManagementFees` / `getPerformanceFees`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFees {
    /// Shares that would be minted to pay the outstanding fees.
    pub amount: U256,
}

// ---------------------------------------------------------------------------
// Factory contract (views scoped to one vault)
// ---------------------------------------------------------------------------

/// Role assignments for one vault (`getRolesPerVault`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRoles {
    /// Accounts holding the admin role.
    pub admins: Vec<Address>,
    /// Accounts holding the strategist role.
    pub strategists: Vec<Address>,
    /// Accounts holding the harvester role.
    pub harvesters: Vec<Address>,
}

/// Vault-wide aggregate state (`getVaultState`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStateView {
    /// Token balances held by the vault.
    pub balances: Vec<U256>,
    /// Current position per token.
    pub positions: Vec<U256>,
    /// Total value locked.
    pub tvl: U256,
    /// Raw share price before fee dilution.
    pub share_price: U256,
}

/// Share token state (`getShareState`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareStateView {
    /// Current share supply.
    pub share_supply: U256,
}

/// Factory-wide state (`getFactoryState`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryStateView {
    /// Every vault deployed by the factory, in deployment order.
    pub vaults: Vec<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_ignores_unused_tuple_fields() {
        let json = serde_json::json!({
            "owner": "0x0000000000000000000000000000000000000001",
            "admins": ["0x0000000000000000000000000000000000000002"],
            "strategists": [],
            "harvesters": []
        });
        let roles: Result<VaultRoles, _> = serde_json::from_value(json);
        assert!(roles.is_ok());
        assert_eq!(roles.map(|r| r.admins.len()).ok(), Some(1));
    }

    #[test]
    fn missing_field_is_a_decode_error() {
        let json = serde_json::json!({ "positions": [], "tvl": "0x0" });
        let status: Result<VaultStatus, _> = serde_json::from_value(json);
        assert!(status.is_err());
    }

    #[test]
    fn security_props_use_contract_field_name_for_aum() {
        let props = SecurityProps {
            max_aum: U256::from(7_u64),
            ..SecurityProps::default()
        };
        let json = serde_json::to_value(&props).ok();
        assert!(json.as_ref().is_some_and(|j| j.get("maxAUM").is_some()));
    }
}
