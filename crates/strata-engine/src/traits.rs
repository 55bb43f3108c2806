//! Open traits for the adapter's external collaborators.
//!
//! These abstract the columnar engine's read/write sessions, the durable
//! metadata store, the host's physical storage manager, and the host's lock
//! manager. Unlike the adapter-internal types they are user-implementable:
//! a host brings its own backends, and [`crate::memory::MemoryEngine`]
//! implements all of them in memory.

use strata_error::Result;
use strata_types::cx::Cx;
use strata_types::{
    ColumnIdx, Persistence, RelationId, RelationMetadata, Snapshot, StorageId, StorageOptions,
    TupleShape, TupleSlot,
};

/// An append-only write session produced by a [`ColumnarEngine`].
///
/// Rows are buffered into stripes/blocks per the options the session was
/// opened with. Nothing is visible to readers until [`finish`](Self::finish);
/// dropping a writer without finishing discards everything it buffered.
pub trait RowWriter: Send {
    /// Append one row. The slot must be fully materialized: no position may
    /// reference out-of-line storage.
    fn write_row(&mut self, cx: &Cx, slot: &TupleSlot) -> Result<()>;

    /// Flush buffered state and commit the appended rows.
    fn finish(self, cx: &Cx) -> Result<()>;
}

/// A read session produced by a [`ColumnarEngine`].
///
/// Forward-only: once `next_row` returns `false` the session is exhausted
/// and cannot be restarted.
pub trait RowReader: Send {
    /// Advance to the next row, filling `slot`. Positions outside the
    /// session's column list are left null. Returns `false` at end of data.
    fn next_row(&mut self, cx: &Cx, slot: &mut TupleSlot) -> Result<bool>;
}

/// The columnar storage engine.
///
/// Stripe/block encoding, compression, and on-disk layout live behind this
/// trait; the adapter only streams rows through it.
pub trait ColumnarEngine: Send + Sync {
    /// Write-session type.
    type Writer: RowWriter;
    /// Read-session type.
    type Reader: RowReader;

    /// Open a write session over `storage`, shaped by `shape` and governed
    /// by the immutable `options` snapshot.
    fn begin_write(
        &self,
        cx: &Cx,
        storage: StorageId,
        options: &StorageOptions,
        shape: &TupleShape,
    ) -> Result<Self::Writer>;

    /// Open a read session over `storage` returning only `columns`.
    ///
    /// `snapshot` is carried for contract fidelity; the append-only model
    /// exposes all committed rows regardless of it.
    fn begin_read(
        &self,
        cx: &Cx,
        storage: StorageId,
        shape: &TupleShape,
        columns: &[ColumnIdx],
        snapshot: Snapshot,
    ) -> Result<Self::Reader>;

    /// Estimate the number of committed rows in `storage`.
    fn estimate_row_count(&self, cx: &Cx, storage: StorageId) -> Result<u64>;
}

/// The durable per-storage metadata store.
///
/// Rows are keyed by [`StorageId`] and must participate in the host's unit
/// of work: a rolled-back delete+insert restores the previous row.
pub trait MetadataStore: Send + Sync {
    /// Read the metadata row for `storage`.
    ///
    /// With `missing_ok`, absence is `Ok(None)`; without it, absence is a
    /// [`strata_error::StrataError::MetadataMissing`] error.
    fn read_metadata(
        &self,
        cx: &Cx,
        storage: StorageId,
        missing_ok: bool,
    ) -> Result<Option<RelationMetadata>>;

    /// Delete the metadata row for `storage` if present.
    fn delete_metadata_if_exists(&self, cx: &Cx, storage: StorageId) -> Result<()>;

    /// Insert a fresh metadata row for `storage`.
    fn init_metadata(&self, cx: &Cx, storage: StorageId, block_row_count: u64) -> Result<()>;
}

/// The host's physical storage manager.
///
/// Allocation and deallocation mechanics are the host's concern; the
/// adapter only asks for creation, truncation, and size.
pub trait StorageManager: Send + Sync {
    /// Allocate physical storage for `storage`.
    fn create_storage(&self, cx: &Cx, storage: StorageId, persistence: Persistence) -> Result<()>;

    /// Truncate `storage` to empty without changing its identity.
    fn truncate_storage(&self, cx: &Cx, storage: StorageId) -> Result<()>;

    /// Current physical size of `storage` in bytes.
    fn storage_size(&self, cx: &Cx, storage: StorageId) -> Result<u64>;
}

/// Lock strength for relation-level locks taken through the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock: serializes against concurrent drop, permits readers.
    AccessShare,
    /// Exclusive lock: blocks all other access.
    AccessExclusive,
}

/// The host's relation lock manager.
///
/// Locks are transaction-scoped: there is deliberately no unlock method.
/// Everything acquired here is released by the host when the enclosing unit
/// of work completes, which is exactly the behavior the pre-drop hook
/// relies on to keep its exclusive lock until the drop commits.
pub trait RelationLocker: Send + Sync {
    /// Acquire `mode` on `relation`, blocking until granted.
    fn lock(&self, cx: &Cx, relation: RelationId, mode: LockMode) -> Result<()>;
}
