//! Read-only contract call requests and replies.
//!
//! A [`ContractCall`] names one view method on the factory or a vault,
//! scoped to a block. The chain-call gateway answers with a [`CallReply`]
//! whose value decodes into one of the shapes in [`crate::reads`].

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// The view methods the indexer calls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum ContractMethod {
    // --- factory ---
    /// Whitelisted tokens of the factory.
    GetWhitelistedTokens,
    /// Access manager address.
    AccessManager,
    /// Fees manager address.
    FeesManager,
    /// Default harvester address.
    Harvester,
    /// Swap router address.
    SwapRouter,
    /// Swap proxy address.
    SwapProxy,
    /// Swap adapter address.
    SwapAdapter,
    /// Factory-wide state, including the vault list.
    GetFactoryState,
    /// Aggregate state of one vault.
    GetVaultState {
        /// The vault.
        vault: Address,
    },
    /// Share token state of one vault.
    GetShareState {
        /// The vault.
        vault: Address,
    },
    /// Role assignments of one vault.
    GetRolesPerVault {
        /// The vault.
        vault: Address,
    },

    // --- vault ---
    /// Number of tokens in the token table.
    TokensLength,
    /// One row of the token table.
    Tokens {
        /// Row index.
        index: u64,
    },
    /// Configuration properties.
    GetConfigProps,
    /// Deployment constants.
    GetConstantProps,
    /// Fee properties.
    GetFeesProps,
    /// Historical markers.
    GetHistoryProps,
    /// Security thresholds.
    GetSecurityProps,
    /// Pending management fees.
    GetManagementFees,
    /// Pending performance fees.
    GetPerformanceFees,
    /// Positions, TVL and share price.
    GetVaultStatus,
    /// Latest oracle price of a price feed.
    GetLatestPrice {
        /// The price feed.
        feed: Address,
    },
    /// Token balances held by the vault.
    GetVaultBalances,
}

impl ContractMethod {
    /// Contract-level method name, as used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetWhitelistedTokens => "getWhitelistedTokens",
            Self::AccessManager => "accessManager",
            Self::FeesManager => "feesManager",
            Self::Harvester => "harvester",
            Self::SwapRouter => "swapRouter",
            Self::SwapProxy => "swapProxy",
            Self::SwapAdapter => "swapAdapter",
            Self::GetFactoryState => "getFactoryState",
            Self::GetVaultState { .. } => "getVaultState",
            Self::GetShareState { .. } => "getShareState",
            Self::GetRolesPerVault { .. } => "getRolesPerVault",
            Self::TokensLength => "tokensLength",
            Self::Tokens { .. } => "tokens",
            Self::GetConfigProps => "getConfigProps",
            Self::GetConstantProps => "getConstantProps",
            Self::GetFeesProps => "getFeesProps",
            Self::GetHistoryProps => "getHistoryProps",
            Self::GetSecurityProps => "getSecurityProps",
            Self::GetManagementFees => "getManagementFees",
            Self::GetPerformanceFees => "getPerformanceFees",
            Self::GetVaultStatus => "getVaultStatus",
            Self::GetLatestPrice { .. } => "getLatestPrice",
            Self::GetVaultBalances => "getVaultBalances",
        }
    }
}

/// A view call against `contract` at `block`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    /// Target contract.
    pub contract: Address,
    /// Method and arguments.
    pub method: ContractMethod,
    /// Block the call is evaluated at.
    pub block: u64,
}

/// The gateway's answer to a [`ContractCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallReply {
    /// The call succeeded.
    Ok {
        /// Returned tuple, as JSON.
        value: serde_json::Value,
    },
    /// The call reverted or the contract does not exist.
    Reverted {
        /// Revert reason, if any.
        reason: String,
    },
}
