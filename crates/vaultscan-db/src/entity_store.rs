//! Versioned entity documents in the `entity_versions` table.
//!
//! Every save writes the entity's JSON document at a block number; saving
//! the same entity twice at one block replaces the earlier document. Loads
//! return the newest document at or before a block, so the store can answer
//! point-in-time queries and replays read exactly what the original run
//! read.
//!
//! # Sync Bridge
//!
//! [`EntityStore`] is synchronous, but `sqlx` is async. The trait methods
//! use [`tokio::task::block_in_place`] with the current runtime handle, so
//! they must be called from a multi-threaded tokio runtime.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use vaultscan_core::{EntityStore, StoreError, StoredEntity};
use vaultscan_types::EntityKind;

use crate::error::DbError;

/// Entity store over the `entity_versions` table.
#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
    block: u64,
}

impl PgEntityStore {
    /// Create a store bound to a connection pool, scoped to block 0.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool, block: 0 }
    }

    /// Load the newest document of an entity at or before `block`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::BlockOutOfRange`] if `block` does not fit a `BIGINT`.
    pub async fn load_at(
        &self,
        kind: EntityKind,
        id: &str,
        block: u64,
    ) -> Result<Option<serde_json::Value>, DbError> {
        let data: Option<serde_json::Value> = sqlx::query_scalar(
            r"SELECT data
              FROM entity_versions
              WHERE entity_type = $1 AND entity_id = $2 AND block_number <= $3
              ORDER BY block_number DESC
              LIMIT 1",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(to_bigint(block)?)
        .fetch_optional(&self.pool)
        .await?;

        Ok(data)
    }

    /// Write one document at `block`, replacing any document of the same
    /// entity already written at that block.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn save_at(&self, record: &StoredEntity, block: u64) -> Result<(), DbError> {
        upsert(&self.pool, record, to_bigint(block)?).await?;
        debug!(kind = %record.kind, id = %record.id, block, "Saved entity");
        Ok(())
    }

    /// Write several documents at `block` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if any upsert or the commit fails. No
    /// document is written in that case.
    pub async fn save_batch_at(&self, records: &[StoredEntity], block: u64) -> Result<(), DbError> {
        if records.is_empty() {
            return Ok(());
        }
        let block_i64 = to_bigint(block)?;

        let mut tx = self.pool.begin().await?;
        for record in records {
            upsert(&mut *tx, record, block_i64).await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), block, "Saved entity batch");
        Ok(())
    }

    /// Ids of every entity of `kind` ever written, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_ids(&self, kind: EntityKind) -> Result<Vec<String>, DbError> {
        let ids = sqlx::query_scalar(
            r"SELECT DISTINCT entity_id
              FROM entity_versions
              WHERE entity_type = $1
              ORDER BY entity_id",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Every stored version of an entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn versions(&self, kind: EntityKind, id: &str) -> Result<Vec<EntityVersionRow>, DbError> {
        let rows = sqlx::query_as::<_, EntityVersionRow>(
            r"SELECT entity_type, entity_id, block_number, data, written_at
              FROM entity_versions
              WHERE entity_type = $1 AND entity_id = $2
              ORDER BY block_number",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Delete every version written at or after `block`.
    ///
    /// Run before re-indexing from `block`, so replayed events load the
    /// state left by block `block - 1` instead of their own earlier
    /// writes. Returns the number of versions deleted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn rewind_from(&self, block: u64) -> Result<u64, DbError> {
        let result = sqlx::query(r"DELETE FROM entity_versions WHERE block_number >= $1")
            .bind(to_bigint(block)?)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        info!(block, deleted, "Rewound entity store");
        Ok(deleted)
    }
}

/// A row from the `entity_versions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityVersionRow {
    /// Entity kind name.
    pub entity_type: String,
    /// Entity id.
    pub entity_id: String,
    /// Block the version was written at.
    pub block_number: i64,
    /// The entity document.
    pub data: serde_json::Value,
    /// When the row was written.
    pub written_at: DateTime<Utc>,
}

async fn upsert<'e, E>(executor: E, record: &StoredEntity, block: i64) -> Result<(), DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r"INSERT INTO entity_versions (entity_type, entity_id, block_number, data)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (entity_type, entity_id, block_number) DO UPDATE SET
            data = EXCLUDED.data,
            written_at = now()",
    )
    .bind(record.kind.as_str())
    .bind(&record.id)
    .bind(block)
    .bind(&record.data)
    .execute(executor)
    .await?;
    Ok(())
}

fn to_bigint(block: u64) -> Result<i64, DbError> {
    i64::try_from(block)
        .ok()
        .ok_or(DbError::BlockOutOfRange(block))
}

/// Run `fut` to completion on the current tokio runtime from synchronous
/// code.
fn bridge<T, F>(fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, DbError>>,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|e| StoreError::Backend {
        message: format!("no tokio runtime available: {e}"),
    })?;
    tokio::task::block_in_place(|| handle.block_on(fut)).map_err(StoreError::from)
}

impl EntityStore for PgEntityStore {
    fn scope_to_block(&mut self, block: u64) {
        self.block = block;
    }

    fn load_raw(
        &mut self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        bridge(self.load_at(kind, id, self.block))
    }

    fn save_raw(&mut self, record: StoredEntity) -> Result<(), StoreError> {
        bridge(self.save_at(&record, self.block))
    }

    fn save_batch(&mut self, records: Vec<StoredEntity>) -> Result<(), StoreError> {
        bridge(self.save_batch_at(&records, self.block))
    }
}
