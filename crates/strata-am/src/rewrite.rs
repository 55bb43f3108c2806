//! Row-streaming rewrite (compaction) path.
//!
//! Streams every row of the old storage into fresh storage through one scan
//! session and one write state held concurrently. The column shapes must
//! match position for position; dropped source columns keep their slot in
//! the target but are forced to null. A failure anywhere aborts the whole
//! operation — the target writer is discarded unflushed, so no partial
//! result is ever committed.

use strata_engine::ColumnarEngine;
use strata_error::{Result, StrataError};
use strata_types::cx::Cx;
use strata_types::{
    ColumnIdx, IndexId, Relation, Snapshot, StorageConfig, StorageOptions, TupleSlot,
};

use crate::scan::ScanSession;
use crate::write::WriteState;

/// Outcome of a rewrite.
///
/// The append-only model has no independent dead-row concept, so the rows
/// streamed are reported both as processed and as reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    /// Rows read from the old storage and written to the new.
    pub rows_processed: u64,
    /// Rows reported to the caller as reclaimed. Always equals
    /// `rows_processed`.
    pub rows_reclaimed: u64,
}

/// Stream all rows of `old` into `new`.
///
/// Fails before any row is read if an index is present or a sorted rewrite
/// is requested (the columnar model supports neither), or if the two shapes
/// differ in column count.
pub fn copy_for_compaction<E: ColumnarEngine>(
    engine: &E,
    cx: &Cx,
    old: &Relation,
    new: &Relation,
    old_index: Option<IndexId>,
    use_sort: bool,
    config: &StorageConfig,
) -> Result<RewriteStats> {
    if old_index.is_some() || use_sort {
        return Err(StrataError::IndexesNotSupported);
    }
    // The host's rewrite machinery keeps dropped columns in the target shape
    // as placeholders, so the arities must line up exactly.
    if old.shape.arity() != new.shape.arity() {
        return Err(StrataError::ColumnCountMismatch {
            source: old.shape.arity(),
            target: new.shape.arity(),
        });
    }

    let options = StorageOptions::snapshot(config);
    let mut write = WriteState::open(engine, cx, new, options)?;
    let mut scan = ScanSession::open(engine, cx, old, Snapshot::default(), None)?;

    let mut source = TupleSlot::with_arity(old.shape.arity());
    let mut target = TupleSlot::with_arity(new.shape.arity());
    let mut rows = 0u64;

    while scan.next_row(cx, &mut source)? {
        target.clear();
        for (i, column) in old.shape.columns().iter().enumerate() {
            // Dropped columns stay null in the target; live columns copy
            // value and null flag positionally.
            if !column.dropped {
                target.set(ColumnIdx(i), source.datum(ColumnIdx(i)).cloned());
            }
        }
        write.append(cx, &mut target)?;
        rows += 1;
    }

    write.finish(cx)?;
    scan.close();

    tracing::info!(
        source = old.id.get(),
        target = new.id.get(),
        rows,
        "rewrote columnar relation"
    );
    Ok(RewriteStats {
        rows_processed: rows,
        rows_reclaimed: rows,
    })
}
