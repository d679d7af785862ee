//! An in-memory chain for tests and local replays.
//!
//! [`ScriptedChain`] answers view calls from a table of canned results keyed
//! by (contract, method). Tests install a factory and any number of vaults,
//! then edit individual results between events to play out on-chain state
//! changes. A call with no canned result reverts, like a call to an address
//! with no code.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256, address};
use serde::Serialize;
use vaultscan_types::{
    ConfigProps, ConstantProps, ContractCall, ContractMethod, FactoryStateView, FeesProps,
    HistoryProps, PendingFees, SecurityProps, ShareStateView, TokenRow, VaultRoles,
    VaultStateView, VaultStatus,
};

use crate::chain::{ChainError, ChainReader};

/// Every read result of one vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultFixture {
    /// Token table rows.
    pub tokens: Vec<TokenRow>,
    /// Latest price per price feed.
    pub prices: BTreeMap<Address, U256>,
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
    /// Token balances.
    pub balances: Vec<U256>,
    /// Positions per token.
    pub positions: Vec<U256>,
    /// Total value locked.
    pub tvl: U256,
    /// Raw share price.
    pub share_price: U256,
    /// Share supply.
    pub share_supply: U256,
    /// Pending management fees.
    pub management_fees: U256,
    /// Pending performance fees.
    pub performance_fees: U256,
}

impl VaultFixture {
    /// A vault holding the given tokens, each with its own price feed, and
    /// no shares.
    pub fn with_tokens(tokens: &[Address]) -> Self {
        let rows: Vec<TokenRow> = tokens
            .iter()
            .zip(0_u64..)
            .map(|(&token, n)| TokenRow {
                token,
                price_feed: Address::left_padding_from(&n.saturating_add(0xfe00).to_be_bytes()),
                price_feed_precision: 8,
                denominator: U256::from(1_000_000_u64),
            })
            .collect();
        let prices = rows
            .iter()
            .map(|row| (row.price_feed, U256::from(100_000_000_u64)))
            .collect();
        Self {
            balances: vec![U256::ZERO; rows.len()],
            positions: vec![U256::ZERO; rows.len()],
            tokens: rows,
            prices,
            config: ConfigProps {
                name: "Test Vault".to_owned(),
                ..ConfigProps::default()
            },
            ..Self::default()
        }
    }
}

/// A chain whose view calls return canned results.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChain {
    factory: Address,
    results: BTreeMap<(Address, ContractMethod), serde_json::Value>,
    calls: Vec<ContractCall>,
}

impl ScriptedChain {
    /// An empty chain: every call reverts.
    pub fn new(factory: Address) -> Self {
        Self {
            factory,
            ..Self::default()
        }
    }

    /// A chain with the factory deployed: default whitelisted tokens, fixed
    /// collaborator addresses and no vaults.
    pub fn with_factory(factory: Address) -> Self {
        let mut chain = Self::new(factory);
        chain.set_whitelisted_tokens(Self::default_tokens());
        for (method, value) in Self::default_collaborators() {
            chain.set(factory, method, value);
        }
        chain.set_factory_vaults(Vec::new());
        chain
    }

    /// Whitelisted tokens installed by [`with_factory`](Self::with_factory).
    pub fn default_tokens() -> Vec<Address> {
        vec![
            address!("0x00000000000000000000000000000000000000a1"),
            address!("0x00000000000000000000000000000000000000a2"),
        ]
    }

    /// Collaborator addresses installed by [`with_factory`](Self::with_factory).
    pub fn default_collaborators() -> [(ContractMethod, Address); 6] {
        [
            (ContractMethod::AccessManager, address!("0x00000000000000000000000000000000000000c1")),
            (ContractMethod::FeesManager, address!("0x00000000000000000000000000000000000000c2")),
            (ContractMethod::Harvester, address!("0x00000000000000000000000000000000000000c3")),
            (ContractMethod::SwapRouter, address!("0x00000000000000000000000000000000000000c4")),
            (ContractMethod::SwapProxy, address!("0x00000000000000000000000000000000000000c5")),
            (ContractMethod::SwapAdapter, address!("0x00000000000000000000000000000000000000c6")),
        ]
    }

    /// Set the result of `method` on `contract`.
    ///
    /// A value that cannot be serialized is stored as `null`, which decodes
    /// as a malformed reply.
    pub fn set(&mut self, contract: Address, method: ContractMethod, value: impl Serialize) -> &mut Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.results.insert((contract, method), value);
        self
    }

    /// Remove the result of `method` on `contract`, so that it reverts.
    pub fn remove(&mut self, contract: Address, method: &ContractMethod) -> &mut Self {
        self.results.remove(&(contract, method.clone()));
        self
    }

    /// Remove every canned result.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Set the factory's whitelisted tokens.
    pub fn set_whitelisted_tokens(&mut self, tokens: Vec<Address>) -> &mut Self {
        self.set(self.factory, ContractMethod::GetWhitelistedTokens, tokens)
    }

    /// Set the factory's on-chain vault list.
    pub fn set_factory_vaults(&mut self, vaults: Vec<Address>) -> &mut Self {
        self.set(self.factory, ContractMethod::GetFactoryState, FactoryStateView { vaults })
    }

    /// Install every read result of `vault`.
    ///
    /// Replaces the vault's previous token table, so rows beyond the new
    /// table's length revert afterwards.
    pub fn install_vault(&mut self, vault: Address, fixture: &VaultFixture) -> &mut Self {
        let stale: Vec<ContractMethod> = self
            .results
            .keys()
            .filter(|(contract, method)| {
                *contract == vault
                    && matches!(method, ContractMethod::Tokens { .. } | ContractMethod::GetLatestPrice { .. })
            })
            .map(|(_, method)| method.clone())
            .collect();
        for method in &stale {
            self.remove(vault, method);
        }

        let factory = self.factory;
        self.set(vault, ContractMethod::TokensLength, U256::from(fixture.tokens.len()));
        for (index, row) in (0_u64..).zip(&fixture.tokens) {
            self.set(vault, ContractMethod::Tokens { index }, row);
        }
        for (&feed, price) in &fixture.prices {
            self.set(vault, ContractMethod::GetLatestPrice { feed }, price);
        }
        self.set(vault, ContractMethod::GetConfigProps, &fixture.config)
            .set(vault, ContractMethod::GetConstantProps, &fixture.constants)
            .set(vault, ContractMethod::GetFeesProps, &fixture.fees)
            .set(vault, ContractMethod::GetHistoryProps, &fixture.history)
            .set(vault, ContractMethod::GetSecurityProps, &fixture.security)
            .set(vault, ContractMethod::GetVaultBalances, &fixture.balances)
            .set(
                vault,
                ContractMethod::GetManagementFees,
                PendingFees {
                    amount: fixture.management_fees,
                },
            )
            .set(
                vault,
                ContractMethod::GetPerformanceFees,
                PendingFees {
                    amount: fixture.performance_fees,
                },
            )
            .set(
                vault,
                ContractMethod::GetVaultStatus,
                VaultStatus {
                    positions: fixture.positions.clone(),
                    tvl: fixture.tvl,
                    share_price: fixture.share_price,
                },
            )
            .set(factory, ContractMethod::GetRolesPerVault { vault }, &fixture.roles)
            .set(
                factory,
                ContractMethod::GetVaultState { vault },
                VaultStateView {
                    balances: fixture.balances.clone(),
                    positions: fixture.positions.clone(),
                    tvl: fixture.tvl,
                    share_price: fixture.share_price,
                },
            )
            .set(
                factory,
                ContractMethod::GetShareState { vault },
                ShareStateView {
                    share_supply: fixture.share_supply,
                },
            )
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> &[ContractCall] {
        &self.calls
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}

impl ChainReader for ScriptedChain {
    fn call(&mut self, call: &ContractCall) -> Result<serde_json::Value, ChainError> {
        self.calls.push(call.clone());
        self.results
            .get(&(call.contract, call.method.clone()))
            .cloned()
            .ok_or_else(|| ChainError::reverted(call, "no result scripted"))
    }
}
