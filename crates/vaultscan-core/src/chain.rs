//! Read-only access to contract state at a fixed block.
//!
//! The [`ChainReader`] trait abstracts how a view call is executed: a
//! JSON-RPC node, a NATS gateway, or a scripted test chain. Handlers never
//! call it directly; they go through a [`ChainView`], which pins the block,
//! builds the [`ContractCall`] and decodes the reply into one of the named
//! read shapes from [`vaultscan_types::reads`].
//!
//! A read that fails for any reason is fatal to the current handler
//! invocation. There is no fallback value.

use alloy_primitives::{Address, U256};
use serde::de::DeserializeOwned;
use tracing::trace;
use vaultscan_types::{
    ConfigProps, ConstantProps, ContractCall, ContractMethod, FactoryStateView, FeesProps,
    HistoryProps, PendingFees, SecurityProps, ShareStateView, TokenRow, VaultRoles,
    VaultStateView, VaultStatus,
};

/// Errors raised while reading contract state.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The call could not be delivered or no reply arrived.
    #[error("call {method} on {contract} failed: {message}")]
    Transport {
        /// Target contract.
        contract: Address,
        /// Contract-level method name.
        method: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The call reverted, or no contract is deployed at the address.
    #[error("call {method} on {contract} reverted: {reason}")]
    Reverted {
        /// Target contract.
        contract: Address,
        /// Contract-level method name.
        method: &'static str,
        /// Revert reason reported by the node.
        reason: String,
    },

    /// The reply did not have the expected shape.
    #[error("call {method} on {contract} returned a malformed value: {source}")]
    Malformed {
        /// Target contract.
        contract: Address,
        /// Contract-level method name.
        method: &'static str,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// A returned integer does not fit where the indexer needs it.
    #[error("call {method} on {contract} returned {value}, which is out of range")]
    OutOfRange {
        /// Target contract.
        contract: Address,
        /// Contract-level method name.
        method: &'static str,
        /// The offending value.
        value: U256,
    },
}

impl ChainError {
    /// Build a [`ChainError::Transport`] for `call`.
    pub fn transport(call: &ContractCall, message: impl Into<String>) -> Self {
        Self::Transport {
            contract: call.contract,
            method: call.method.name(),
            message: message.into(),
        }
    }

    /// Build a [`ChainError::Reverted`] for `call`.
    pub fn reverted(call: &ContractCall, reason: impl Into<String>) -> Self {
        Self::Reverted {
            contract: call.contract,
            method: call.method.name(),
            reason: reason.into(),
        }
    }

    /// Build a [`ChainError::Malformed`] for `call`.
    pub fn malformed(call: &ContractCall, source: serde_json::Error) -> Self {
        Self::Malformed {
            contract: call.contract,
            method: call.method.name(),
            source,
        }
    }
}

/// Executes read-only contract calls.
///
/// Implementations must evaluate every call against the state at
/// `call.block` and never mutate chain state. The returned value is the
/// JSON rendering of the method's return tuple, keyed by output name.
pub trait ChainReader {
    /// Execute one view call.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] if the call cannot be delivered, reverts, or
    /// the contract does not exist.
    fn call(&mut self, call: &ContractCall) -> Result<serde_json::Value, ChainError>;
}

impl<R: ChainReader + ?Sized> ChainReader for &mut R {
    fn call(&mut self, call: &ContractCall) -> Result<serde_json::Value, ChainError> {
        (**self).call(call)
    }
}

/// Typed reads against the factory and its vaults at one block.
pub struct ChainView<'r> {
    reader: &'r mut dyn ChainReader,
    factory: Address,
    block: u64,
}

impl<'r> ChainView<'r> {
    /// Pin `reader` to `block`, with `factory` as the factory contract.
    pub fn new(reader: &'r mut dyn ChainReader, factory: Address, block: u64) -> Self {
        Self {
            reader,
            factory,
            block,
        }
    }

    fn read<T: DeserializeOwned>(
        &mut self,
        contract: Address,
        method: ContractMethod,
    ) -> Result<T, ChainError> {
        let call = ContractCall {
            contract,
            method,
            block: self.block,
        };
        trace!(contract = %call.contract, method = call.method.name(), block = call.block, "chain read");
        let value = self.reader.call(&call)?;
        serde_json::from_value(value).map_err(|e| ChainError::malformed(&call, e))
    }

    // -- factory ------------------------------------------------------------

    /// Whitelisted tokens, in on-chain order.
    pub fn whitelisted_tokens(&mut self) -> Result<Vec<Address>, ChainError> {
        self.read(self.factory, ContractMethod::GetWhitelistedTokens)
    }

    /// An address-valued factory getter such as `accessManager`.
    pub fn factory_address_field(&mut self, method: ContractMethod) -> Result<Address, ChainError> {
        self.read(self.factory, method)
    }

    /// Factory-wide state, including the on-chain vault list.
    pub fn factory_state(&mut self) -> Result<FactoryStateView, ChainError> {
        self.read(self.factory, ContractMethod::GetFactoryState)
    }

    /// Aggregate state of `vault` from the factory's vault-state view.
    pub fn vault_state(&mut self, vault: Address) -> Result<VaultStateView, ChainError> {
        self.read(self.factory, ContractMethod::GetVaultState { vault })
    }

    /// Share token state of `vault`.
    pub fn share_state(&mut self, vault: Address) -> Result<ShareStateView, ChainError> {
        self.read(self.factory, ContractMethod::GetShareState { vault })
    }

    /// Role assignments of `vault`.
    pub fn roles(&mut self, vault: Address) -> Result<VaultRoles, ChainError> {
        self.read(self.factory, ContractMethod::GetRolesPerVault { vault })
    }

    // -- vault --------------------------------------------------------------

    /// Number of rows in the vault's token table.
    pub fn tokens_length(&mut self, vault: Address) -> Result<u64, ChainError> {
        let length: U256 = self.read(vault, ContractMethod::TokensLength)?;
        u64::try_from(length)
            .ok()
            .ok_or(ChainError::OutOfRange {
                contract: vault,
                method: ContractMethod::TokensLength.name(),
                value: length,
            })
    }

    /// One row of the vault's token table.
    pub fn token_row(&mut self, vault: Address, index: u64) -> Result<TokenRow, ChainError> {
        self.read(vault, ContractMethod::Tokens { index })
    }

    /// Every row of the vault's token table, in index order.
    pub fn token_rows(&mut self, vault: Address) -> Result<Vec<TokenRow>, ChainError> {
        let length = self.tokens_length(vault)?;
        (0..length).map(|index| self.token_row(vault, index)).collect()
    }

    /// Configuration properties.
    pub fn config_props(&mut self, vault: Address) -> Result<ConfigProps, ChainError> {
        self.read(vault, ContractMethod::GetConfigProps)
    }

    /// Deployment constants.
    pub fn constant_props(&mut self, vault: Address) -> Result<ConstantProps, ChainError> {
        self.read(vault, ContractMethod::GetConstantProps)
    }

    /// Fee properties.
    pub fn fees_props(&mut self, vault: Address) -> Result<FeesProps, ChainError> {
        self.read(vault, ContractMethod::GetFeesProps)
    }

    /// Historical markers.
    pub fn history_props(&mut self, vault: Address) -> Result<HistoryProps, ChainError> {
        self.read(vault, ContractMethod::GetHistoryProps)
    }

    /// Security thresholds.
    pub fn security_props(&mut self, vault: Address) -> Result<SecurityProps, ChainError> {
        self.read(vault, ContractMethod::GetSecurityProps)
    }

    /// Pending management fees.
    pub fn management_fees(&mut self, vault: Address) -> Result<U256, ChainError> {
        let fees: PendingFees = self.read(vault, ContractMethod::GetManagementFees)?;
        Ok(fees.amount)
    }

    /// Pending performance fees.
    pub fn performance_fees(&mut self, vault: Address) -> Result<U256, ChainError> {
        let fees: PendingFees = self.read(vault, ContractMethod::GetPerformanceFees)?;
        Ok(fees.amount)
    }

    /// Positions, TVL and raw share price.
    pub fn vault_status(&mut self, vault: Address) -> Result<VaultStatus, ChainError> {
        self.read(vault, ContractMethod::GetVaultStatus)
    }

    /// Latest oracle price reported by `feed`, read through the vault.
    pub fn latest_price(&mut self, vault: Address, feed: Address) -> Result<U256, ChainError> {
        self.read(vault, ContractMethod::GetLatestPrice { feed })
    }

    /// Token balances held by the vault.
    pub fn vault_balances(&mut self, vault: Address) -> Result<Vec<U256>, ChainError> {
        self.read(vault, ContractMethod::GetVaultBalances)
    }
}

impl std::fmt::Debug for ChainView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainView")
            .field("factory", &self.factory)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}
