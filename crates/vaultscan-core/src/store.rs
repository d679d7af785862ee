//! Entity persistence.
//!
//! The [`EntityStore`] trait is the boundary between the indexer and its
//! storage backend. It speaks raw JSON documents keyed by
//! ([`EntityKind`], id); the typed [`EntityStoreExt`] layer on top decodes
//! them into entities. Every load and save is scoped to the block being
//! processed: saves create the version of an entity at that block, loads
//! return the newest version at or before it.
//!
//! [`StagedWrites`] buffers the writes of one handler invocation so that a
//! failing invocation persists nothing. [`MemoryStore`] is the in-process
//! backend used by tests and local replays.

use std::collections::BTreeMap;

use vaultscan_types::{Entity, EntityKind};

/// Result of loading an entity that may not be indexed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The entity exists.
    Found(T),
    /// No entity with that id has been saved.
    NotFound,
}

impl<T> Lookup<T> {
    /// Convert into an [`Option`].
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    /// Whether the entity exists.
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Errors raised by an entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage backend failed.
    #[error("entity store backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// A stored document does not decode into its entity type.
    #[error("stored {kind} '{id}' is corrupt: {source}")]
    Corrupt {
        /// Entity kind.
        kind: EntityKind,
        /// Entity id.
        id: String,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// An entity could not be encoded for storage.
    #[error("failed to encode {kind} '{id}': {source}")]
    Encode {
        /// Entity kind.
        kind: EntityKind,
        /// Entity id.
        id: String,
        /// The underlying encode error.
        source: serde_json::Error,
    },
}

/// One entity document ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntity {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity id.
    pub id: String,
    /// The entity, as JSON.
    pub data: serde_json::Value,
}

/// Key-value persistence with last-write-wins semantics per entity id.
pub trait EntityStore {
    /// Scope subsequent loads and saves to `block`.
    fn scope_to_block(&mut self, block: u64);

    /// Load the newest version of an entity at or before the scoped block.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend cannot be reached.
    fn load_raw(
        &mut self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Write the version of an entity at the scoped block, replacing any
    /// version already written at that block.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the write fails.
    fn save_raw(&mut self, record: StoredEntity) -> Result<(), StoreError>;

    /// Write several entities. Backends with transactions write them
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if any write fails.
    fn save_batch(&mut self, records: Vec<StoredEntity>) -> Result<(), StoreError> {
        for record in records {
            self.save_raw(record)?;
        }
        Ok(())
    }
}

/// Typed loads and saves on top of any [`EntityStore`].
pub trait EntityStoreExt: EntityStore {
    /// Load an entity by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the stored document does not
    /// decode, or any backend error.
    fn load<E: Entity>(&mut self, id: &str) -> Result<Lookup<E>, StoreError> {
        let Some(data) = self.load_raw(E::KIND, id)? else {
            return Ok(Lookup::NotFound);
        };
        serde_json::from_value(data)
            .map(Lookup::Found)
            .map_err(|source| StoreError::Corrupt {
                kind: E::KIND,
                id: id.to_owned(),
                source,
            })
    }

    /// Save an entity under its own id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encode`] if the entity cannot be serialized,
    /// or any backend error.
    fn save<E: Entity>(&mut self, entity: &E) -> Result<(), StoreError> {
        let data = serde_json::to_value(entity).map_err(|source| StoreError::Encode {
            kind: E::KIND,
            id: entity.id().to_owned(),
            source,
        })?;
        self.save_raw(StoredEntity {
            kind: E::KIND,
            id: entity.id().to_owned(),
            data,
        })
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

// ---------------------------------------------------------------------------
// Staged writes
// ---------------------------------------------------------------------------

/// Buffers the writes of one handler invocation.
///
/// Loads see staged writes first, then the underlying store. Nothing reaches
/// the underlying store until [`commit`](Self::commit); dropping the buffer
/// discards every staged write.
pub struct StagedWrites<'s> {
    inner: &'s mut dyn EntityStore,
    staged: Vec<StoredEntity>,
}

impl<'s> StagedWrites<'s> {
    /// Stage writes on top of `inner`.
    pub fn new(inner: &'s mut dyn EntityStore) -> Self {
        Self {
            inner,
            staged: Vec::new(),
        }
    }

    /// Number of distinct entities staged.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Write every staged entity to the underlying store in one batch.
    ///
    /// Returns the number of entities written.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the batch fails.
    pub fn commit(self) -> Result<usize, StoreError> {
        let count = self.staged.len();
        if count > 0 {
            self.inner.save_batch(self.staged)?;
        }
        Ok(count)
    }

    /// Drop every staged write, returning how many were dropped.
    pub fn discard(self) -> usize {
        self.staged.len()
    }
}

impl EntityStore for StagedWrites<'_> {
    fn scope_to_block(&mut self, block: u64) {
        self.inner.scope_to_block(block);
    }

    fn load_raw(
        &mut self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        if let Some(record) = self.staged.iter().find(|r| r.kind == kind && r.id == id) {
            return Ok(Some(record.data.clone()));
        }
        self.inner.load_raw(kind, id)
    }

    fn save_raw(&mut self, record: StoredEntity) -> Result<(), StoreError> {
        match self
            .staged
            .iter_mut()
            .find(|r| r.kind == record.kind && r.id == record.id)
        {
            Some(existing) => existing.data = record.data,
            None => self.staged.push(record),
        }
        Ok(())
    }
}

impl std::fmt::Debug for StagedWrites<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedWrites")
            .field("pending", &self.staged.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

type Versions = BTreeMap<u64, serde_json::Value>;

/// An in-memory, versioned entity store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entities: BTreeMap<(EntityKind, String), Versions>,
    block: u64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest version of an entity, regardless of the scoped block.
    pub fn get<E: Entity>(&self, id: &str) -> Option<E> {
        self.entities
            .get(&(E::KIND, id.to_owned()))
            .and_then(|versions| versions.values().next_back())
            .and_then(|data| serde_json::from_value(data.clone()).ok())
    }

    /// Version of an entity as of `block`.
    pub fn load_at<E: Entity>(&self, id: &str, block: u64) -> Option<E> {
        self.entities
            .get(&(E::KIND, id.to_owned()))
            .and_then(|versions| versions.range(..=block).next_back())
            .and_then(|(_, data)| serde_json::from_value(data.clone()).ok())
    }

    /// Ids of every stored entity of `kind`, in id order.
    pub fn ids(&self, kind: EntityKind) -> Vec<String> {
        self.entities
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Number of distinct entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.keys().filter(|(k, _)| *k == kind).count()
    }

    /// Total number of stored versions across every entity.
    pub fn version_count(&self) -> usize {
        self.entities.values().map(BTreeMap::len).sum()
    }

    /// Delete every version written at or after `block`, returning how
    /// many were deleted. Entities left without versions disappear.
    pub fn rewind_from(&mut self, block: u64) -> usize {
        let before = self.version_count();
        for versions in self.entities.values_mut() {
            drop(versions.split_off(&block));
        }
        self.entities.retain(|_, versions| !versions.is_empty());
        before.saturating_sub(self.version_count())
    }
}

impl EntityStore for MemoryStore {
    fn scope_to_block(&mut self, block: u64) {
        self.block = block;
    }

    fn load_raw(
        &mut self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self
            .entities
            .get(&(kind, id.to_owned()))
            .and_then(|versions| versions.range(..=self.block).next_back())
            .map(|(_, data)| data.clone()))
    }

    fn save_raw(&mut self, record: StoredEntity) -> Result<(), StoreError> {
        self.entities
            .entry((record.kind, record.id))
            .or_default()
            .insert(self.block, record.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use vaultscan_types::{Factory, Vault};

    use super::*;

    fn factory(vault_count: u64) -> Factory {
        Factory {
            id: "0xf1".to_owned(),
            vault_count,
            ..Factory::default()
        }
    }

    #[test]
    fn missing_entity_is_not_found() {
        let mut store = MemoryStore::new();
        let lookup = store.load::<Factory>("0xf1");
        assert!(matches!(lookup, Ok(Lookup::NotFound)));
    }

    #[test]
    fn loads_are_scoped_to_the_block() {
        let mut store = MemoryStore::new();
        store.scope_to_block(10);
        assert!(store.save(&factory(1)).is_ok());
        store.scope_to_block(20);
        assert!(store.save(&factory(2)).is_ok());

        store.scope_to_block(15);
        let at_15 = store.load::<Factory>("0xf1").ok().and_then(Lookup::found);
        assert_eq!(at_15.map(|f| f.vault_count), Some(1));

        store.scope_to_block(5);
        assert!(matches!(store.load::<Factory>("0xf1"), Ok(Lookup::NotFound)));

        assert_eq!(store.get::<Factory>("0xf1").map(|f| f.vault_count), Some(2));
        assert_eq!(store.load_at::<Factory>("0xf1", 19).map(|f| f.vault_count), Some(1));
    }

    #[test]
    fn last_write_in_a_block_wins() {
        let mut store = MemoryStore::new();
        store.scope_to_block(7);
        assert!(store.save(&factory(1)).is_ok());
        assert!(store.save(&factory(3)).is_ok());
        assert_eq!(store.version_count(), 1);
        assert_eq!(store.get::<Factory>("0xf1").map(|f| f.vault_count), Some(3));
    }

    #[test]
    fn rewind_drops_the_block_and_everything_after() {
        let mut store = MemoryStore::new();
        for (block, count) in [(10, 1), (20, 2), (30, 3)] {
            store.scope_to_block(block);
            assert!(store.save(&factory(count)).is_ok());
        }
        store.scope_to_block(20);
        let vault = Vault::new(
            "0xf1",
            address!("0x00000000000000000000000000000000000000aa"),
            address!("0x00000000000000000000000000000000000000bb"),
        );
        assert!(store.save(&vault).is_ok());

        assert_eq!(store.rewind_from(20), 3);
        assert_eq!(store.version_count(), 1);
        assert_eq!(store.get::<Factory>("0xf1").map(|f| f.vault_count), Some(1));
        assert_eq!(store.count(EntityKind::Vault), 0);
        assert_eq!(store.rewind_from(20), 0);
    }

    #[test]
    fn corrupt_document_is_reported() {
        let mut store = MemoryStore::new();
        let record = StoredEntity {
            kind: EntityKind::Factory,
            id: "0xf1".to_owned(),
            data: serde_json::json!({ "vaultCount": "many" }),
        };
        assert!(store.save_raw(record).is_ok());
        assert!(matches!(
            store.load::<Factory>("0xf1"),
            Err(StoreError::Corrupt { kind: EntityKind::Factory, .. })
        ));
    }

    #[test]
    fn staged_writes_are_visible_before_commit() {
        let mut store = MemoryStore::new();
        let mut staged = StagedWrites::new(&mut store);
        assert!(staged.save(&factory(4)).is_ok());
        assert!(staged.save(&factory(5)).is_ok());
        assert_eq!(staged.pending(), 1);

        let seen = staged.load::<Factory>("0xf1").ok().and_then(Lookup::found);
        assert_eq!(seen.map(|f| f.vault_count), Some(5));

        assert_eq!(staged.commit().ok(), Some(1));
        assert_eq!(store.get::<Factory>("0xf1").map(|f| f.vault_count), Some(5));
    }

    #[test]
    fn discarded_writes_never_reach_the_store() {
        let mut store = MemoryStore::new();
        let mut staged = StagedWrites::new(&mut store);
        let vault = Vault::new(
            "0xf1",
            address!("0x00000000000000000000000000000000000000aa"),
            address!("0x00000000000000000000000000000000000000bb"),
        );
        assert!(staged.save(&vault).is_ok());
        assert!(staged.save(&factory(1)).is_ok());
        assert_eq!(staged.discard(), 2);
        assert_eq!(store.version_count(), 0);
    }

    #[test]
    fn ids_are_listed_per_kind() {
        let mut store = MemoryStore::new();
        assert!(store.save(&factory(0)).is_ok());
        let vault = Vault::new(
            "0xf1",
            address!("0x00000000000000000000000000000000000000aa"),
            address!("0x00000000000000000000000000000000000000bb"),
        );
        assert!(store.save(&vault).is_ok());
        assert_eq!(
            store.ids(EntityKind::Vault),
            vec!["0x00000000000000000000000000000000000000aa".to_owned()]
        );
        assert_eq!(store.count(EntityKind::Factory), 1);
    }
}
