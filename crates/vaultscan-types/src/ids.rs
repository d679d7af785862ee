//! Entity identifiers and entity kinds.
//!
//! Every persisted entity is addressed by a string id. Addresses are rendered
//! as lower-case `0x`-prefixed hex so that an id never depends on how an
//! address happened to be checksummed on the wire.
//!
//! | Entity | Id |
//! |--------|----|
//! | `Factory` | well-known factory address |
//! | `Vault` | vault address |
//! | `VaultSnapshot` | `{factory-id}-{vault-address}-{block-number}` |
//! | event records | `{tx-hash}-{log-index}` |

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Render an address the way it appears inside entity ids.
pub fn address_id(address: Address) -> String {
    format!("{address:#x}")
}

/// Id of the point-in-time snapshot of `vault` taken at `block_number`.
pub fn snapshot_id(factory_id: &str, vault: Address, block_number: u64) -> String {
    format!("{factory_id}-{}-{block_number}", address_id(vault))
}

/// Id of an immutable event record.
///
/// Keyed by transaction hash plus log index so that two records of the same
/// kind emitted by one transaction never overwrite each other.
pub fn event_record_id(tx_hash: B256, log_index: u64) -> String {
    format!("{tx_hash:#x}-{log_index}")
}

/// The kinds of entity persisted by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// The singleton factory registry.
    Factory,
    /// One deployed vault.
    Vault,
    /// Immutable point-in-time copy of a vault's financial state.
    VaultSnapshot,
    /// A deposit into a vault.
    Deposit,
    /// A vault rebalance.
    Rebalance,
    /// A redemption of vault shares.
    Redeem,
    /// A management fee harvest.
    HarvestManagementFees,
    /// A performance fee harvest.
    HarvestPerformanceFees,
}

impl EntityKind {
    /// Every entity kind, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Factory,
        Self::Vault,
        Self::VaultSnapshot,
        Self::Deposit,
        Self::Rebalance,
        Self::Redeem,
        Self::HarvestManagementFees,
        Self::HarvestPerformanceFees,
    ];

    /// Stable storage name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Factory => "factory",
            Self::Vault => "vault",
            Self::VaultSnapshot => "vault_snapshot",
            Self::Deposit => "deposit",
            Self::Rebalance => "rebalance",
            Self::Redeem => "redeem",
            Self::HarvestManagementFees => "harvest_management_fees",
            Self::HarvestPerformanceFees => "harvest_performance_fees",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256};

    use super::*;

    #[test]
    fn address_id_is_lower_case() {
        let addr = address!("0xF14c4B935054b8D1017Ad96c9a265EB7F8ECF13c");
        assert_eq!(address_id(addr), "0xf14c4b935054b8d1017ad96c9a265eb7f8ecf13c");
    }

    #[test]
    fn snapshot_id_joins_factory_vault_and_block() {
        let vault = address!("0x00000000000000000000000000000000000000aa");
        let id = snapshot_id("0xfactory", vault, 101);
        assert_eq!(
            id,
            "0xfactory-0x00000000000000000000000000000000000000aa-101"
        );
    }

    #[test]
    fn event_record_id_includes_log_index() {
        let hash = b256!("0x1111111111111111111111111111111111111111111111111111111111111111");
        let first = event_record_id(hash, 0);
        let second = event_record_id(hash, 3);
        assert_ne!(first, second);
        assert!(second.ends_with("-3"));
        assert!(first.starts_with("0x1111"));
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in EntityKind::ALL {
            let json = serde_json::to_string(&kind).ok();
            assert_eq!(json, Some(format!("\"{}\"", kind.as_str())));
        }
    }
}
