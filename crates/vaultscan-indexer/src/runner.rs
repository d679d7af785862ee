//! Ordered event processing with retry.
//!
//! Events are applied strictly in arrival order. A failing event is retried
//! in place, never skipped: skipping would let later events observe state
//! the failed one should have written. Failures that cannot change on retry
//! at a fixed block (reverts, malformed replies, corrupt documents,
//! overflows) halt immediately.

use std::time::Duration;

use tracing::{error, warn};
use vaultscan_core::config::RuntimeConfig;
use vaultscan_core::{ChainReader, Dispatcher, EntityStore, HandlerOutcome, IndexerError};
use vaultscan_types::IndexerEvent;

use crate::error::ServiceError;

/// How often and how patiently a failing event is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-dispatches after the first failure.
    pub max_retries: u32,
    /// Wait before retry `n` is `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Build the policy from the runtime configuration.
    pub const fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Wait before the given retry (1-based).
    const fn delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(retry)
    }
}

/// Dispatch `event`, retrying transient failures per `policy`.
///
/// # Errors
///
/// Returns [`ServiceError::Halted`] with the last failure once the event
/// fails deterministically or the retries are exhausted.
pub async fn dispatch_with_retry(
    dispatcher: &mut Dispatcher,
    event: &IndexerEvent,
    chain: &mut dyn ChainReader,
    store: &mut dyn EntityStore,
    policy: RetryPolicy,
) -> Result<HandlerOutcome, ServiceError> {
    let block = event.block().number;
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        let e = match dispatcher.dispatch(event, chain, store) {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };

        let retries_used = attempts.saturating_sub(1);
        if !e.is_transient() || retries_used >= policy.max_retries {
            error!(block, attempts, error = %e, "Event failed, halting");
            return Err(halted(block, attempts, e));
        }

        let delay = policy.delay(attempts);
        warn!(
            block,
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %e,
            "Event failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Where processing picks up after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    first_block: u64,
}

impl ResumePoint {
    /// Accept events from `first_block` onward.
    pub const fn from_block(first_block: u64) -> Self {
        Self { first_block }
    }

    /// Accept every event.
    pub const fn live() -> Self {
        Self { first_block: 0 }
    }

    /// First block whose events are applied.
    pub const fn first_block(&self) -> u64 {
        self.first_block
    }

    /// Whether `event` is at or after the resume block. Earlier events
    /// are already reflected in the rewound store.
    pub const fn admits(&self, event: &IndexerEvent) -> bool {
        event.block().number >= self.first_block
    }
}

const fn halted(block: u64, attempts: u32, source: IndexerError) -> ServiceError {
    ServiceError::Halted {
        block,
        attempts,
        source,
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vaultscan_core::testing::{ScriptedChain, VaultFixture};
    use vaultscan_core::{ChainError, IndexerContext, MemoryStore, VaultTemplates};
    use vaultscan_types::{Address, BlockMeta, ContractCall, EntityKind, EventMeta, FactoryEvent};

    use super::*;

    const VAULT: Address = Address::repeat_byte(0xaa);

    /// Fails the first `failures` calls with the given error kind.
    struct Flaky {
        inner: ScriptedChain,
        failures: u32,
        transient: bool,
        calls: u32,
    }

    impl ChainReader for Flaky {
        fn call(&mut self, call: &ContractCall) -> Result<serde_json::Value, ChainError> {
            self.calls = self.calls.saturating_add(1);
            if self.failures > 0 {
                self.failures = self.failures.saturating_sub(1);
                return Err(if self.transient {
                    ChainError::transport(call, "connection reset")
                } else {
                    ChainError::reverted(call, "paused")
                });
            }
            self.inner.call(call)
        }
    }

    fn setup(failures: u32, transient: bool) -> (Dispatcher, Flaky, IndexerEvent) {
        let ctx = IndexerContext::default();
        let mut inner = ScriptedChain::with_factory(ctx.factory_address());
        inner.install_vault(VAULT, &VaultFixture::with_tokens(&ScriptedChain::default_tokens()));
        let event = IndexerEvent::Factory {
            meta: EventMeta {
                address: ctx.factory_address(),
                ..EventMeta::default()
            },
            event: FactoryEvent::VaultCreated { vault: VAULT },
        };
        let chain = Flaky {
            inner,
            failures,
            transient,
            calls: 0,
        };
        (Dispatcher::new(ctx, VaultTemplates::new()), chain, event)
    }

    const POLICY: RetryPolicy = RetryPolicy {
        max_retries: 3,
        backoff: Duration::from_millis(1),
    };

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let (mut dispatcher, mut chain, event) = setup(2, true);
        let mut store = MemoryStore::new();

        let outcome = dispatch_with_retry(&mut dispatcher, &event, &mut chain, &mut store, POLICY)
            .await
            .unwrap();
        assert_eq!(outcome, HandlerOutcome::Applied);
        assert_eq!(store.count(EntityKind::Vault), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_halt() {
        let (mut dispatcher, mut chain, event) = setup(10, true);
        let mut store = MemoryStore::new();

        let result =
            dispatch_with_retry(&mut dispatcher, &event, &mut chain, &mut store, POLICY).await;
        assert!(matches!(
            result,
            Err(ServiceError::Halted { attempts: 4, .. })
        ));
        assert_eq!(store.version_count(), 0);
    }

    #[tokio::test]
    async fn deterministic_failures_halt_without_retry() {
        let (mut dispatcher, mut chain, event) = setup(1, false);
        let mut store = MemoryStore::new();

        let result =
            dispatch_with_retry(&mut dispatcher, &event, &mut chain, &mut store, POLICY).await;
        assert!(matches!(
            result,
            Err(ServiceError::Halted { attempts: 1, .. })
        ));
        assert_eq!(chain.calls, 1);
    }

    #[test]
    fn resume_point_skips_events_before_its_block() {
        let (_, _, event) = setup(0, true);
        let block_of = |number| IndexerEvent::Block {
            block: BlockMeta {
                number,
                timestamp: 0,
            },
        };

        let resume = ResumePoint::from_block(500);
        assert!(!resume.admits(&block_of(499)));
        assert!(resume.admits(&block_of(500)));
        assert!(resume.admits(&block_of(501)));
        assert!(!resume.admits(&event));
        assert!(ResumePoint::live().admits(&event));
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::from_config(&RuntimeConfig {
            max_retries: 3,
            retry_backoff_ms: 250,
            ..RuntimeConfig::default()
        });
        assert_eq!(policy.delay(1), Duration::from_millis(250));
        assert_eq!(policy.delay(3), Duration::from_millis(750));
    }
}
