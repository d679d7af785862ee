//! Indexer service binary for vaultscan.
//!
//! This is the main entry point that wires together the entity store, the
//! NATS chain-call gateway client and the event dispatcher, then applies
//! events from the intake subject in arrival order until shutdown or halt.
//!
//! # Delivery
//!
//! The intake is a core NATS subscription, so delivery is at most once:
//! events published while the service is down, or dropped because it fell
//! behind as a slow consumer, are never seen. Ordering holds only for what
//! is delivered. After an outage the publisher must replay from a known
//! block, and `runtime.resume_from_block` must name that block so the store
//! is rewound to match before replayed events are applied.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `vaultscan-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Rewind the store to the resume block, if one is configured
//! 5. Seed the vault template registry from persisted vaults
//! 6. Connect to NATS and create the chain reader
//! 7. Subscribe to the event intake subject
//! 8. Dispatch each event, retrying per the runtime policy
//! 9. Close the pool and log the result

mod error;
mod nats_chain;
mod runner;

use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::Address;
use futures::StreamExt as _;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use vaultscan_core::config::{IndexerConfig, LoggingConfig};
use vaultscan_core::{Dispatcher, HandlerOutcome, TemplateRegistry as _, VaultTemplates};
use vaultscan_db::{PgEntityStore, PostgresConfig, PostgresPool};
use vaultscan_types::{EntityKind, IndexerEvent};

use crate::error::ServiceError;
use crate::nats_chain::NatsChainReader;
use crate::runner::{ResumePoint, RetryPolicy, dispatch_with_retry};

/// Environment variable naming an alternative config file.
const CONFIG_PATH_ENV: &str = "VAULTSCAN_CONFIG";

/// Config file read when [`CONFIG_PATH_ENV`] is unset.
const DEFAULT_CONFIG_PATH: &str = "vaultscan-config.yaml";

/// Application entry point for the indexer service.
///
/// # Errors
///
/// Returns an error if any initialization step fails or an event halts
/// processing.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("vaultscan-indexer starting");
    info!(
        factory = %config.indexer.factory_address,
        snapshot_interval_secs = config.indexer.snapshot_interval_secs,
        events_subject = config.infrastructure.events_subject,
        chain_subject = config.infrastructure.chain_subject,
        "Configuration loaded"
    );

    // 3. Connect to PostgreSQL.
    let pool = PostgresPool::connect(&PostgresConfig::from_infrastructure(
        &config.infrastructure,
    ))
    .await?;
    pool.run_migrations().await?;
    let mut store = pool.entity_store();

    // 4. Rewind for a replay.
    let resume = match config.runtime.resume_from_block {
        Some(block) => {
            store.rewind_from(block).await?;
            ResumePoint::from_block(block)
        }
        None => ResumePoint::live(),
    };

    // 5. Seed templates.
    let templates = seed_templates(&store).await?;
    info!(vaults = templates.len(), "Vault templates seeded");
    let mut dispatcher = Dispatcher::new(config.context(), templates);

    // 6. Connect to NATS.
    let nats_url = &config.infrastructure.nats_url;
    info!(nats_url = nats_url, "Connecting to NATS");
    let client = async_nats::connect(nats_url)
        .await
        .map_err(|e| ServiceError::Nats {
            message: format!("failed to connect to NATS at {nats_url}: {e}"),
        })?;
    let mut chain = NatsChainReader::new(
        client.clone(),
        config.infrastructure.chain_subject.clone(),
        Duration::from_millis(config.runtime.call_timeout_ms),
    );

    // 7. Subscribe to event intake.
    let subject = config.infrastructure.events_subject.clone();
    let mut events = client
        .subscribe(subject.clone())
        .await
        .map_err(|e| ServiceError::Nats {
            message: format!("failed to subscribe to {subject}: {e}"),
        })?;
    info!(
        subject = subject,
        first_block = resume.first_block(),
        "Event intake subscribed"
    );

    // 8. Dispatch in arrival order.
    let policy = RetryPolicy::from_config(&config.runtime);
    let mut processed: u64 = 0;
    let result = loop {
        let message = tokio::select! {
            message = events.next() => message,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break Ok(());
            }
        };
        let Some(message) = message else {
            warn!(subject = subject, "Event intake closed");
            break Ok(());
        };

        let event = match serde_json::from_slice::<IndexerEvent>(&message.payload) {
            Ok(event) => event,
            Err(source) => {
                break Err(ServiceError::Decode {
                    subject: message.subject.to_string(),
                    source,
                });
            }
        };

        if !resume.admits(&event) {
            debug!(block = event.block().number, "Event precedes resume block, ignoring");
            continue;
        }

        match dispatch_with_retry(&mut dispatcher, &event, &mut chain, &mut store, policy).await {
            Ok(HandlerOutcome::Applied) => {}
            Ok(HandlerOutcome::Skipped(reason)) => {
                debug!(block = event.block().number, %reason, "Event skipped");
            }
            Err(e) => break Err(e),
        }
        processed = processed.saturating_add(1);
    };

    // 9. Shut down.
    pool.close().await;
    info!(processed, "vaultscan-indexer shutdown complete");
    result.map_err(Into::into)
}

/// Load the configuration file, falling back to defaults if it is absent.
fn load_config() -> Result<IndexerConfig, ServiceError> {
    let path = std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        Ok(IndexerConfig::from_file(&path)?)
    } else {
        Ok(IndexerConfig::parse("")?)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Register every persisted vault for event routing.
///
/// Vaults are registered in memory only, so a restart must rebuild the
/// registry before the first vault event arrives.
async fn seed_templates(store: &PgEntityStore) -> Result<VaultTemplates, ServiceError> {
    let ids = store.list_ids(EntityKind::Vault).await?;
    let mut templates = VaultTemplates::new();
    for id in ids {
        match id.parse::<Address>() {
            Ok(address) => templates.register_vault(address),
            Err(e) => warn!(id = id, error = %e, "Skipping vault with unparseable id"),
        }
    }
    Ok(templates)
}
