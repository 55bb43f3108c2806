//! In-memory implementation of every collaborator seam.
//!
//! All state lives behind one `Arc<Mutex<..>>`; clones of a [`MemoryEngine`]
//! share it, so one instance can serve as engine, metadata store, storage
//! manager, and lock manager at once. Intended for tests and embedded use,
//! with no persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use strata_error::{Result, StrataError};
use strata_types::cx::Cx;
use strata_types::{
    ColumnIdx, Datum, Persistence, RelationId, RelationMetadata, Snapshot, StorageId,
    StorageOptions, TupleShape, TupleSlot,
};

use crate::traits::{
    ColumnarEngine, LockMode, MetadataStore, RelationLocker, RowReader, RowWriter, StorageManager,
};

type StoredRow = Vec<Option<Datum>>;

#[derive(Debug, Default)]
struct MemoryEngineInner {
    tables: HashMap<StorageId, Vec<StoredRow>>,
    metadata: HashMap<StorageId, RelationMetadata>,
    locks: Vec<(RelationId, LockMode)>,
}

/// Shared in-memory backend for all four collaborator seams.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<Mutex<MemoryEngineInner>>,
}

fn lock_err() -> StrataError {
    StrataError::internal("MemoryEngine lock poisoned")
}

impl MemoryEngine {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed rows in `storage`. Test observability helper.
    pub fn row_count(&self, storage: StorageId) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.tables.get(&storage).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// The metadata row for `storage`, if any. Test observability helper.
    pub fn metadata(&self, storage: StorageId) -> Option<RelationMetadata> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.metadata.get(&storage).copied())
    }

    /// Total number of metadata rows. Test observability helper.
    pub fn metadata_row_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.metadata.len()).unwrap_or(0)
    }

    /// Every lock acquired so far, in acquisition order. Test observability
    /// helper; the backend never releases them itself (transaction-scoped
    /// release is the host's job).
    pub fn lock_log(&self) -> Vec<(RelationId, LockMode)> {
        self.inner
            .lock()
            .map(|inner| inner.locks.clone())
            .unwrap_or_default()
    }
}

/// Buffering write session. Rows become visible only on `finish`; a dropped
/// writer discards its buffer.
pub struct MemoryWriter {
    inner: Arc<Mutex<MemoryEngineInner>>,
    storage: StorageId,
    arity: usize,
    buffered: Vec<StoredRow>,
}

impl RowWriter for MemoryWriter {
    fn write_row(&mut self, cx: &Cx, slot: &TupleSlot) -> Result<()> {
        cx.checkpoint()?;
        if slot.arity() != self.arity {
            return Err(StrataError::ArityMismatch {
                expected: self.arity,
                actual: slot.arity(),
            });
        }
        if slot.has_out_of_line() {
            return Err(StrataError::internal(
                "out-of-line datum reached the columnar writer",
            ));
        }
        self.buffered.push(slot.values().to_vec());
        Ok(())
    }

    fn finish(self, cx: &Cx) -> Result<()> {
        cx.checkpoint()?;
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner
            .tables
            .entry(self.storage)
            .or_default()
            .extend(self.buffered);
        Ok(())
    }
}

/// Forward-only read session over a row snapshot taken at open time.
pub struct MemoryReader {
    rows: Vec<StoredRow>,
    columns: Vec<ColumnIdx>,
    arity: usize,
    pos: usize,
}

impl RowReader for MemoryReader {
    fn next_row(&mut self, cx: &Cx, slot: &mut TupleSlot) -> Result<bool> {
        cx.checkpoint()?;
        if slot.arity() != self.arity {
            return Err(StrataError::ArityMismatch {
                expected: self.arity,
                actual: slot.arity(),
            });
        }
        let Some(row) = self.rows.get(self.pos) else {
            return Ok(false);
        };
        self.pos += 1;
        slot.clear();
        for &idx in &self.columns {
            slot.set(idx, row.get(idx.0).cloned().flatten());
        }
        Ok(true)
    }
}

impl ColumnarEngine for MemoryEngine {
    type Writer = MemoryWriter;
    type Reader = MemoryReader;

    fn begin_write(
        &self,
        cx: &Cx,
        storage: StorageId,
        options: &StorageOptions,
        shape: &TupleShape,
    ) -> Result<Self::Writer> {
        cx.checkpoint()?;
        tracing::debug!(
            storage = storage.get(),
            stripe_row_count = options.stripe_row_count,
            block_row_count = options.block_row_count,
            "opening memory write session"
        );
        Ok(MemoryWriter {
            inner: Arc::clone(&self.inner),
            storage,
            arity: shape.arity(),
            buffered: Vec::new(),
        })
    }

    fn begin_read(
        &self,
        cx: &Cx,
        storage: StorageId,
        shape: &TupleShape,
        columns: &[ColumnIdx],
        _snapshot: Snapshot,
    ) -> Result<Self::Reader> {
        cx.checkpoint()?;
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        // Snapshot the committed rows at open: appends after this point are
        // not seen by this session.
        let rows = inner.tables.get(&storage).cloned().unwrap_or_default();
        Ok(MemoryReader {
            rows,
            columns: columns.to_vec(),
            arity: shape.arity(),
            pos: 0,
        })
    }

    fn estimate_row_count(&self, cx: &Cx, storage: StorageId) -> Result<u64> {
        cx.checkpoint()?;
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        Ok(inner.tables.get(&storage).map_or(0, Vec::len) as u64)
    }
}

impl MetadataStore for MemoryEngine {
    fn read_metadata(
        &self,
        cx: &Cx,
        storage: StorageId,
        missing_ok: bool,
    ) -> Result<Option<RelationMetadata>> {
        cx.checkpoint()?;
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        match inner.metadata.get(&storage) {
            Some(meta) => Ok(Some(*meta)),
            None if missing_ok => Ok(None),
            None => Err(StrataError::MetadataMissing {
                storage: storage.get(),
            }),
        }
    }

    fn delete_metadata_if_exists(&self, cx: &Cx, storage: StorageId) -> Result<()> {
        cx.checkpoint()?;
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner.metadata.remove(&storage);
        Ok(())
    }

    fn init_metadata(&self, cx: &Cx, storage: StorageId, block_row_count: u64) -> Result<()> {
        cx.checkpoint()?;
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner
            .metadata
            .insert(storage, RelationMetadata { block_row_count });
        Ok(())
    }
}

impl StorageManager for MemoryEngine {
    fn create_storage(&self, cx: &Cx, storage: StorageId, _persistence: Persistence) -> Result<()> {
        cx.checkpoint()?;
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner.tables.entry(storage).or_default();
        Ok(())
    }

    fn truncate_storage(&self, cx: &Cx, storage: StorageId) -> Result<()> {
        cx.checkpoint()?;
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner.tables.entry(storage).or_default().clear();
        Ok(())
    }

    fn storage_size(&self, cx: &Cx, storage: StorageId) -> Result<u64> {
        cx.checkpoint()?;
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        let size = inner.tables.get(&storage).map_or(0, |rows| {
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|v| v.as_ref().map_or(0, Datum::width))
                        .sum::<u64>()
                })
                .sum()
        });
        Ok(size)
    }
}

impl RelationLocker for MemoryEngine {
    fn lock(&self, cx: &Cx, relation: RelationId, mode: LockMode) -> Result<()> {
        cx.checkpoint()?;
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner.locks.push((relation, mode));
        Ok(())
    }
}
