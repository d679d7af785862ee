//! Event routing and per-invocation atomicity.
//!
//! The [`Dispatcher`] is the only entry point the runtime calls. For each
//! [`IndexerEvent`] it:
//!
//! 1. Scopes the store to the event's block.
//! 2. Drops events from sources that are not watched.
//! 3. Runs the matching handler against a [`StagedWrites`] buffer.
//! 4. Commits the buffer if the handler succeeded, then registers any vault
//!    templates the handler asked for. On error, nothing is committed and
//!    nothing is registered.

use std::collections::BTreeSet;

use alloy_primitives::Address;
use tracing::debug;
use vaultscan_types::IndexerEvent;

use crate::chain::{ChainReader, ChainView};
use crate::context::IndexerContext;
use crate::error::IndexerError;
use crate::handlers::block::handle_new_block;
use crate::handlers::factory::handle_factory_event;
use crate::handlers::vault::handle_vault_event;
use crate::handlers::{HandlerOutcome, SkipReason};
use crate::invocation::Invocation;
use crate::store::{EntityStore, StagedWrites};

/// The set of vault contracts whose events are routed to the vault handlers.
pub trait TemplateRegistry {
    /// Start routing `vault`'s events. Registering twice is a no-op.
    fn register_vault(&mut self, vault: Address);

    /// Whether `vault`'s events are routed.
    fn is_registered(&self, vault: Address) -> bool;
}

/// In-memory template registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultTemplates {
    vaults: BTreeSet<Address>,
}

impl VaultTemplates {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            vaults: BTreeSet::new(),
        }
    }

    /// Number of registered vaults.
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    /// Whether no vault is registered.
    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// Registered vaults in address order.
    pub fn iter(&self) -> impl Iterator<Item = Address> + '_ {
        self.vaults.iter().copied()
    }
}

impl TemplateRegistry for VaultTemplates {
    fn register_vault(&mut self, vault: Address) {
        self.vaults.insert(vault);
    }

    fn is_registered(&self, vault: Address) -> bool {
        self.vaults.contains(&vault)
    }
}

impl FromIterator<Address> for VaultTemplates {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self {
            vaults: iter.into_iter().collect(),
        }
    }
}

/// Routes events to handlers and applies their writes atomically.
#[derive(Debug)]
pub struct Dispatcher<T = VaultTemplates> {
    ctx: IndexerContext,
    templates: T,
}

impl<T: TemplateRegistry> Dispatcher<T> {
    /// A dispatcher for the deployment in `ctx`, routing vault events for
    /// the vaults already in `templates`.
    pub const fn new(ctx: IndexerContext, templates: T) -> Self {
        Self { ctx, templates }
    }

    /// The deployment context.
    pub const fn context(&self) -> &IndexerContext {
        &self.ctx
    }

    /// The template registry.
    pub const fn templates(&self) -> &T {
        &self.templates
    }

    /// Apply one event.
    ///
    /// Reads go through `chain` at the event's block. Writes are staged and
    /// reach `store` only if the handler succeeds.
    ///
    /// # Errors
    ///
    /// Returns the handler's [`IndexerError`], or [`IndexerError::Store`] if
    /// the commit fails. In both cases no template is registered.
    pub fn dispatch(
        &mut self,
        event: &IndexerEvent,
        chain: &mut dyn ChainReader,
        store: &mut dyn EntityStore,
    ) -> Result<HandlerOutcome, IndexerError> {
        let block = event.block();
        store.scope_to_block(block.number);

        if let Some(source) = self.unwatched_source(event) {
            debug!(source = %source, block = block.number, "Ignoring event from unwatched source");
            return Ok(HandlerOutcome::Skipped(SkipReason::UnregisteredSource));
        }

        let mut staged = StagedWrites::new(store);
        let view = ChainView::new(chain, self.ctx.factory_address(), block.number);
        let mut inv = Invocation::new(&self.ctx, view, &mut staged, block);

        let result = match event {
            IndexerEvent::Factory { meta, event } => handle_factory_event(&mut inv, meta, event),
            IndexerEvent::Vault { meta, event } => handle_vault_event(&mut inv, meta, event),
            IndexerEvent::Block { .. } => handle_new_block(&mut inv),
        };
        let new_templates = inv.into_new_templates();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let discarded = staged.discard();
                debug!(
                    block = block.number,
                    discarded,
                    error = %e,
                    "Handler failed, discarding staged writes"
                );
                return Err(e);
            }
        };

        let written = staged.commit()?;
        for vault in new_templates {
            self.templates.register_vault(vault);
        }
        debug!(block = block.number, written, ?outcome, "Dispatched event");
        Ok(outcome)
    }

    /// The source address of `event` if it is not one this dispatcher watches.
    fn unwatched_source(&self, event: &IndexerEvent) -> Option<Address> {
        match event {
            IndexerEvent::Factory { meta, .. } => {
                (meta.address != self.ctx.factory_address()).then_some(meta.address)
            }
            IndexerEvent::Vault { meta, .. } => {
                (!self.templates.is_registered(meta.address)).then_some(meta.address)
            }
            IndexerEvent::Block { .. } => None,
        }
    }
}
