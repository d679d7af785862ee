//! Errors that abort a handler invocation.

use vaultscan_types::EntityKind;

use crate::chain::ChainError;
use crate::metrics::MetricsError;
use crate::store::StoreError;

/// A fault that aborts the current handler invocation.
///
/// Absent entities are not errors: handlers report them as a skipped
/// outcome. Everything here is surfaced to the dispatch runtime, which owns
/// the retry and halt policy.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// A contract read failed or returned an unexpected shape.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The entity store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Share price arithmetic overflowed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// A lifetime accumulator would overflow.
    #[error("{field} accumulator of {kind} '{id}' overflowed")]
    AccumulatorOverflow {
        /// Entity kind owning the accumulator.
        kind: EntityKind,
        /// Entity id.
        id: String,
        /// Accumulator name.
        field: &'static str,
    },
}

impl IndexerError {
    /// Whether re-running the same invocation could succeed.
    ///
    /// Transport and backend failures are transient. Reverts, malformed
    /// replies, corrupt documents and overflows are deterministic at a
    /// fixed block.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Chain(ChainError::Transport { .. }) | Self::Store(StoreError::Backend { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        let err = IndexerError::from(ChainError::Transport {
            contract: Address::ZERO,
            method: "getVaultStatus",
            message: "timed out".to_owned(),
        });
        assert!(err.is_transient());
        assert!(err.to_string().contains("getVaultStatus"));
    }

    #[test]
    fn reverts_and_overflows_are_not_transient() {
        let revert = IndexerError::from(ChainError::Reverted {
            contract: Address::ZERO,
            method: "tokensLength",
            reason: "no code".to_owned(),
        });
        assert!(!revert.is_transient());

        let overflow = IndexerError::AccumulatorOverflow {
            kind: EntityKind::Vault,
            id: "0xaa".to_owned(),
            field: "depositsCount",
        };
        assert!(!overflow.is_transient());
        assert_eq!(
            overflow.to_string(),
            "depositsCount accumulator of vault '0xaa' overflowed"
        );
    }
}
