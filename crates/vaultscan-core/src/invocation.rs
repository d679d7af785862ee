//! The state one handler invocation works against.

use alloy_primitives::Address;
use vaultscan_types::BlockMeta;

use crate::chain::ChainView;
use crate::context::IndexerContext;
use crate::store::EntityStore;

/// Everything a handler invocation reads from and writes to.
///
/// Built by the dispatcher for a single event: chain reads are pinned to the
/// event's block and the store is the invocation's staging buffer. Vaults
/// registered for event routing are collected here and only handed to the
/// template registry once the invocation's writes are committed.
pub struct Invocation<'a> {
    pub(crate) ctx: &'a IndexerContext,
    pub(crate) chain: ChainView<'a>,
    pub(crate) store: &'a mut dyn EntityStore,
    pub(crate) block: BlockMeta,
    new_templates: Vec<Address>,
}

impl<'a> Invocation<'a> {
    /// Assemble an invocation for the event at `block`.
    pub fn new(
        ctx: &'a IndexerContext,
        chain: ChainView<'a>,
        store: &'a mut dyn EntityStore,
        block: BlockMeta,
    ) -> Self {
        Self {
            ctx,
            chain,
            store,
            block,
            new_templates: Vec::new(),
        }
    }

    /// Ask for `vault`'s events to be routed to the vault handlers.
    pub fn register_template(&mut self, vault: Address) {
        self.new_templates.push(vault);
    }

    /// Vaults registered during this invocation, in registration order.
    pub fn into_new_templates(self) -> Vec<Address> {
        self.new_templates
    }
}

impl std::fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("factory", &self.ctx.factory_id())
            .field("block", &self.block)
            .field("new_templates", &self.new_templates)
            .finish_non_exhaustive()
    }
}
