//! Decoded chain events and the envelope the dispatch runtime delivers.
//!
//! The dispatch runtime decodes raw logs and delivers them, in canonical
//! block and transaction order, as [`IndexerEvent`] values.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// The block an event belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMeta {
    /// Block number.
    pub number: u64,
    /// Block timestamp, in seconds.
    pub timestamp: u64,
}

/// The transaction an event belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    /// Transaction hash.
    pub hash: B256,
    /// Transaction sender.
    pub from: Address,
}

/// Metadata shared by every contract event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// The contract that emitted the event.
    pub address: Address,
    /// Enclosing block.
    pub block: BlockMeta,
    /// Enclosing transaction.
    pub transaction: TransactionMeta,
    /// Position of the log within the block.
    pub log_index: u64,
}

/// Events emitted by the factory contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "params", rename_all = "PascalCase")]
pub enum FactoryEvent {
    /// A new vault was deployed.
    #[serde(rename_all = "camelCase")]
    VaultCreated {
        /// The new vault's address.
        vault: Address,
    },
    /// The access manager was replaced.
    #[serde(rename_all = "camelCase")]
    SetAccessManager {
        /// New access manager.
        new_access_manager: Address,
    },
    /// The fees manager was replaced.
    #[serde(rename_all = "camelCase")]
    SetFeesManager {
        /// New fees manager.
        new_fees_manager: Address,
    },
    /// The default harvester was replaced.
    #[serde(rename_all = "camelCase")]
    SetHarvester {
        /// New harvester.
        new_harvester: Address,
    },
    /// The swap router and proxy were replaced.
    #[serde(rename_all = "camelCase")]
    SetSwapContracts {
        /// New swap router.
        new_swap_router: Address,
        /// New swap proxy.
        new_swap_proxy: Address,
    },
    /// The swap adapter was replaced.
    #[serde(rename_all = "camelCase")]
    SetSwapAdapter {
        /// New swap adapter.
        new_swap_adapter: Address,
    },
    /// Tokens were added to the whitelist.
    AddTokensAndPriceFeeds,
    /// Tokens were removed from the whitelist.
    RemoveTokensAndPriceFeeds,
    /// Factory ownership changed.
    #[serde(rename_all = "camelCase")]
    OwnershipTransferred {
        /// Previous owner.
        previous_owner: Address,
        /// New owner.
        new_owner: Address,
    },
}

/// Events emitted by a vault contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "params", rename_all = "PascalCase")]
pub enum VaultEvent {
    /// Base tokens were deposited for shares.
    #[serde(rename_all = "camelCase")]
    Deposit {
        /// Shares minted.
        shares_minted: U256,
        /// Base token amount deposited.
        base_token_amount_in: U256,
    },
    /// The vault was rebalanced.
    #[serde(rename_all = "camelCase")]
    Rebalance {
        /// Signals before the rebalance.
        current_signals: Vec<U256>,
        /// Signals requested.
        desired_signals: Vec<U256>,
    },
    /// Shares were redeemed.
    #[serde(rename_all = "camelCase")]
    Redeem {
        /// Shares burned.
        share_burned: U256,
        /// Amount paid out.
        amount_received: U256,
    },
    /// Management fees were harvested.
    #[serde(rename_all = "camelCase")]
    HarvestManagementFees {
        /// Amount sent to the DAO.
        #[serde(rename = "amountToDAO")]
        amount_to_dao: U256,
        /// Amount sent to the strategist.
        amount_to_strategist: U256,
    },
    /// Performance fees were harvested.
    #[serde(rename_all = "camelCase")]
    HarvestPerformanceFees {
        /// Amount sent to the DAO.
        #[serde(rename = "amountToDAO")]
        amount_to_dao: U256,
        /// Amount sent to the strategist.
        amount_to_strategist: U256,
    },
    /// A token was added to the vault.
    AddAsset,
    /// Share transferability was toggled.
    #[serde(rename_all = "camelCase")]
    SetShareTransferability {
        /// New transferability status.
        status: bool,
    },
    /// Security thresholds changed.
    SetSecurityProps,
    /// Configuration properties changed.
    SetConfigProps,
    /// Fee properties changed.
    SetFeesProps,
    /// The admin role of a role changed.
    #[serde(rename_all = "camelCase")]
    RoleAdminChanged {
        /// The role.
        role: B256,
        /// Previous admin role.
        previous_admin_role: B256,
        /// New admin role.
        new_admin_role: B256,
    },
    /// A role was granted.
    #[serde(rename_all = "camelCase")]
    RoleGranted {
        /// The role.
        role: B256,
        /// The account receiving it.
        account: Address,
        /// The granting account.
        sender: Address,
    },
    /// A role was revoked.
    #[serde(rename_all = "camelCase")]
    RoleRevoked {
        /// The role.
        role: B256,
        /// The account losing it.
        account: Address,
        /// The revoking account.
        sender: Address,
    },
}

impl VaultEvent {
    /// Whether the event moves value and therefore forces a snapshot.
    pub const fn moves_value(&self) -> bool {
        matches!(
            self,
            Self::Deposit { .. }
                | Self::Rebalance { .. }
                | Self::Redeem { .. }
                | Self::HarvestManagementFees { .. }
                | Self::HarvestPerformanceFees { .. }
        )
    }
}

/// One unit of work delivered by the dispatch runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexerEvent {
    /// An event emitted by the factory.
    Factory {
        /// Log metadata.
        meta: EventMeta,
        /// Decoded event.
        event: FactoryEvent,
    },
    /// An event emitted by a vault.
    Vault {
        /// Log metadata.
        meta: EventMeta,
        /// Decoded event.
        event: VaultEvent,
    },
    /// A new block was processed.
    Block {
        /// The block.
        block: BlockMeta,
    },
}

impl IndexerEvent {
    /// The block the event belongs to.
    pub const fn block(&self) -> BlockMeta {
        match self {
            Self::Factory { meta, .. } | Self::Vault { meta, .. } => meta.block,
            Self::Block { block } => *block,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_tagged_vault_event() {
        let json = serde_json::json!({
            "kind": "vault",
            "meta": {
                "address": "0x00000000000000000000000000000000000000aa",
                "block": { "number": 101, "timestamp": 1000 },
                "transaction": {
                    "hash": "0x1111111111111111111111111111111111111111111111111111111111111111",
                    "from": "0x00000000000000000000000000000000000000bb"
                },
                "logIndex": 4
            },
            "event": {
                "name": "SetShareTransferability",
                "params": { "status": true }
            }
        });
        let decoded: Result<IndexerEvent, _> = serde_json::from_value(json);
        assert!(decoded.is_ok(), "{decoded:?}");
        let decoded = decoded.ok();
        assert_eq!(decoded.as_ref().map(|e| e.block().number), Some(101));
        assert!(matches!(
            decoded,
            Some(IndexerEvent::Vault {
                event: VaultEvent::SetShareTransferability { status: true },
                ..
            })
        ));
    }

    #[test]
    fn unit_factory_event_decodes_without_params() {
        let json = serde_json::json!({ "name": "AddTokensAndPriceFeeds" });
        let decoded: Result<FactoryEvent, _> = serde_json::from_value(json);
        assert_eq!(decoded.ok(), Some(FactoryEvent::AddTokensAndPriceFeeds));
    }

    #[test]
    fn only_business_events_move_value() {
        let deposit = VaultEvent::Deposit {
            shares_minted: U256::from(1_u64),
            base_token_amount_in: U256::from(1_u64),
        };
        assert!(deposit.moves_value());
        assert!(!VaultEvent::AddAsset.moves_value());
        assert!(!VaultEvent::SetConfigProps.moves_value());
    }
}
