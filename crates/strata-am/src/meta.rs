//! Relocation and metadata bridging.
//!
//! The metadata store keeps one durable row per storage instance, keyed by
//! [`StorageId`]. Keys follow the physical storage, not the logical
//! relation: relocation deletes the prior row and inserts a fresh one under
//! the new identifier, carrying `block_row_count` over so a relation keeps
//! the layout it was created with even after process settings change.
//!
//! All mutations here ride the host's unit of work; a rollback restores the
//! previous metadata row.

use std::sync::Arc;

use strata_engine::{MetadataStore, StorageManager};
use strata_error::{Result, StrataError};
use strata_types::cx::Cx;
use strata_types::{Persistence, Relation, StorageConfig, StorageId};

/// Bridge between the adapter and the external metadata store plus the
/// host's physical storage manager.
pub struct MetadataBridge<M, S> {
    meta: Arc<M>,
    storage: Arc<S>,
}

impl<M: MetadataStore, S: StorageManager> MetadataBridge<M, S> {
    /// Create a bridge over the given collaborators.
    pub fn new(meta: Arc<M>, storage: Arc<S>) -> Self {
        Self { meta, storage }
    }

    /// The physical storage manager behind this bridge.
    pub fn storage_manager(&self) -> &S {
        self.storage.as_ref()
    }

    /// (Re)initialize storage for `relation` under `new_storage`.
    ///
    /// Only permanent persistence is supported. When the relation already
    /// has a metadata row (relocation, e.g. TRUNCATE), its `block_row_count`
    /// carries over; for brand-new storage it comes from the current
    /// configuration. The prior row is deleted, physical allocation is
    /// delegated to the storage manager, and a fresh row is inserted under
    /// the new identifier.
    pub fn create_storage(
        &self,
        cx: &Cx,
        relation: &Relation,
        new_storage: StorageId,
        persistence: Persistence,
        config: &StorageConfig,
    ) -> Result<()> {
        if persistence != Persistence::Permanent {
            return Err(StrataError::UnsupportedPersistence {
                requested: persistence.to_string(),
            });
        }

        let prior = self.meta.read_metadata(cx, relation.storage, true)?;
        let block_row_count = match prior {
            Some(meta) => meta.block_row_count,
            None => config.block_row_count,
        };

        self.meta.delete_metadata_if_exists(cx, relation.storage)?;
        self.storage.create_storage(cx, new_storage, persistence)?;
        self.meta.init_metadata(cx, new_storage, block_row_count)?;

        tracing::debug!(
            relation = relation.id.get(),
            prior_storage = relation.storage.get(),
            new_storage = new_storage.get(),
            block_row_count,
            relocated = prior.is_some(),
            "initialized columnar storage"
        );
        Ok(())
    }

    /// Truncate `relation` in place, without changing its storage identity.
    ///
    /// Valid only while the storage was created inside the same uncommitted
    /// unit of work, so no other transaction can observe it. The metadata
    /// row is deleted and recreated with its `block_row_count` preserved.
    pub fn in_place_truncate(&self, cx: &Cx, relation: &Relation) -> Result<()> {
        let meta = self
            .meta
            .read_metadata(cx, relation.storage, false)?
            .ok_or_else(|| StrataError::internal("metadata row vanished during truncate"))?;

        self.storage.truncate_storage(cx, relation.storage)?;
        self.meta.delete_metadata_if_exists(cx, relation.storage)?;
        self.meta
            .init_metadata(cx, relation.storage, meta.block_row_count)?;

        tracing::debug!(
            relation = relation.id.get(),
            storage = relation.storage.get(),
            "truncated columnar storage in place"
        );
        Ok(())
    }

    /// Remove the metadata row for `storage`.
    ///
    /// Physical storage release is the host storage manager's job; the
    /// adapter only cleans up what it owns.
    pub fn drop_cleanup(&self, cx: &Cx, storage: StorageId) -> Result<()> {
        self.meta.delete_metadata_if_exists(cx, storage)?;
        tracing::debug!(storage = storage.get(), "dropped columnar metadata row");
        Ok(())
    }
}
