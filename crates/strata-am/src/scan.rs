//! Scan-session lifecycle.
//!
//! A [`ScanSession`] wraps one engine read session over a relation snapshot
//! and an explicit column list. Sessions are independent of the write state:
//! several may coexist, and the rewrite path holds one open next to a
//! writer. Close is idempotent, and `Drop` closes too, so sessions release
//! their reader even when the statement unwinds.

use strata_engine::{ColumnarEngine, RowReader};
use strata_error::Result;
use strata_types::cx::Cx;
use strata_types::{ColumnIdx, Relation, RelationId, Snapshot, TupleSlot};

/// One read session over a relation.
pub struct ScanSession<R: RowReader> {
    relation: RelationId,
    snapshot: Snapshot,
    columns: Vec<ColumnIdx>,
    reader: Option<R>,
}

impl<R: RowReader> ScanSession<R> {
    /// Open a session over `relation`.
    ///
    /// When `columns` is `None` the live-column list is computed from the
    /// shape: dropped columns are excluded unless the caller overrides.
    /// `snapshot` is recorded but does not filter visibility; the
    /// append-only model reports every committed row.
    pub fn open<E>(
        engine: &E,
        cx: &Cx,
        relation: &Relation,
        snapshot: Snapshot,
        columns: Option<Vec<ColumnIdx>>,
    ) -> Result<Self>
    where
        E: ColumnarEngine<Reader = R>,
    {
        let columns = columns.unwrap_or_else(|| relation.shape.live_columns());
        tracing::debug!(
            relation = relation.id.get(),
            storage = relation.storage.get(),
            columns = columns.len(),
            "opening scan session"
        );
        let reader = engine.begin_read(cx, relation.storage, &relation.shape, &columns, snapshot)?;
        Ok(Self {
            relation: relation.id,
            snapshot,
            columns,
            reader: Some(reader),
        })
    }

    /// The relation this session reads.
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    /// The snapshot token the session was opened with.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    /// The columns this session returns.
    pub fn columns(&self) -> &[ColumnIdx] {
        &self.columns
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Advance one row into `slot`.
    ///
    /// `Ok(false)` is terminal: the session cannot be restarted without a
    /// close and reopen. A closed session also reports `false`.
    pub fn next_row(&mut self, cx: &Cx, slot: &mut TupleSlot) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        cx.checkpoint()?;
        slot.clear();
        reader.next_row(cx, slot)
    }

    /// Release the read session. Idempotent.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(relation = self.relation.get(), "closing scan session");
        }
    }
}

impl<R: RowReader> Drop for ScanSession<R> {
    fn drop(&mut self) {
        self.close();
    }
}
