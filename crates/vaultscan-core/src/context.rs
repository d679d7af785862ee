//! The injected indexer context.
//!
//! Holds the deployment constants every component needs: the well-known
//! factory address (which doubles as the factory entity id) and the
//! periodic snapshot interval. Components receive it by reference instead
//! of reaching for module-level constants.

use alloy_primitives::{Address, address};
use vaultscan_types::address_id;

/// Address of the factory on the reference deployment.
pub const DEFAULT_FACTORY_ADDRESS: Address = address!("0xF14c4B935054b8D1017Ad96c9a265EB7F8ECF13c");

/// Minimum seconds between two periodic snapshot passes.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 3600;

/// Deployment constants shared by every handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerContext {
    factory_address: Address,
    factory_id: String,
    snapshot_interval_secs: u64,
}

impl IndexerContext {
    /// Build a context for the factory at `factory_address`.
    pub fn new(factory_address: Address, snapshot_interval_secs: u64) -> Self {
        Self {
            factory_address,
            factory_id: address_id(factory_address),
            snapshot_interval_secs,
        }
    }

    /// The factory contract address.
    pub const fn factory_address(&self) -> Address {
        self.factory_address
    }

    /// The factory entity id.
    pub fn factory_id(&self) -> &str {
        &self.factory_id
    }

    /// Seconds that must strictly elapse between periodic snapshot passes.
    pub const fn snapshot_interval_secs(&self) -> u64 {
        self.snapshot_interval_secs
    }
}

impl Default for IndexerContext {
    fn default() -> Self {
        Self::new(DEFAULT_FACTORY_ADDRESS, DEFAULT_SNAPSHOT_INTERVAL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_uses_reference_deployment() {
        let ctx = IndexerContext::default();
        assert_eq!(ctx.factory_address(), DEFAULT_FACTORY_ADDRESS);
        assert_eq!(ctx.factory_id(), "0xf14c4b935054b8d1017ad96c9a265eb7f8ecf13c");
        assert_eq!(ctx.snapshot_interval_secs(), 3600);
    }
}
