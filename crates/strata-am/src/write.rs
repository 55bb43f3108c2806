//! Writer-state lifecycle.
//!
//! [`WriteState`] is the exclusively-owned handle over one engine write
//! session; [`WriteStateManager`] owns at most one of them and refuses to
//! open a second for a different relation while one is active. Exclusivity
//! is a type-level property: the manager is reached only through `&mut`,
//! and the handle itself is consumed by [`WriteState::finish`].

use std::sync::Arc;

use strata_engine::{ColumnarEngine, RowWriter};
use strata_error::{Result, StrataError};
use strata_types::cx::Cx;
use strata_types::{Relation, RelationId, StorageConfig, StorageOptions, TupleSlot};

/// An open write session bound to exactly one relation and one immutable
/// [`StorageOptions`] snapshot.
pub struct WriteState<W: RowWriter> {
    relation: RelationId,
    options: StorageOptions,
    writer: W,
    rows_appended: u64,
}

impl<W: RowWriter> WriteState<W> {
    /// Open a write session over `relation`, shaped by its full column list.
    pub fn open<E>(
        engine: &E,
        cx: &Cx,
        relation: &Relation,
        options: StorageOptions,
    ) -> Result<Self>
    where
        E: ColumnarEngine<Writer = W>,
    {
        tracing::debug!(
            relation = relation.id.get(),
            storage = relation.storage.get(),
            "initializing write state"
        );
        let writer = engine.begin_write(cx, relation.storage, &options, &relation.shape)?;
        Ok(Self {
            relation: relation.id,
            options,
            writer,
            rows_appended: 0,
        })
    }

    /// The relation this writer is bound to.
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    /// The options snapshot taken at open.
    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Append one row, materializing out-of-line values first: nothing
    /// deferred crosses the engine boundary.
    pub fn append(&mut self, cx: &Cx, slot: &mut TupleSlot) -> Result<()> {
        slot.flatten()?;
        self.writer.write_row(cx, slot)?;
        self.rows_appended += 1;
        Ok(())
    }

    /// Flush buffered state and release the session. Returns the number of
    /// rows appended through this handle.
    pub fn finish(self, cx: &Cx) -> Result<u64> {
        tracing::debug!(
            relation = self.relation.get(),
            rows = self.rows_appended,
            "flushing write state"
        );
        self.writer.finish(cx)?;
        Ok(self.rows_appended)
    }
}

/// Owner of the single active [`WriteState`].
///
/// The insert path creates the writer lazily on first append and keeps it
/// until [`flush_and_close`](Self::flush_and_close), which both explicit
/// bulk-insert completion and the executor-teardown hook call. A later
/// statement on the same relation opens a fresh writer.
pub struct WriteStateManager<E: ColumnarEngine> {
    engine: Arc<E>,
    active: Option<WriteState<E::Writer>>,
}

impl<E: ColumnarEngine> WriteStateManager<E> {
    /// Manager with no active writer.
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            active: None,
        }
    }

    /// Whether no writer is currently open.
    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// The relation bound to the active writer, if any.
    pub fn active_relation(&self) -> Option<RelationId> {
        self.active.as_ref().map(WriteState::relation)
    }

    fn ensure(
        &mut self,
        cx: &Cx,
        relation: &Relation,
        config: &StorageConfig,
    ) -> Result<&mut WriteState<E::Writer>> {
        if let Some(state) = self.active.as_ref() {
            if state.relation() != relation.id {
                return Err(StrataError::WriterAlreadyActive {
                    active: state.relation().get(),
                    requested: relation.id.get(),
                });
            }
        }
        if self.active.is_none() {
            let options = StorageOptions::snapshot(config);
            let state = WriteState::open(self.engine.as_ref(), cx, relation, options)?;
            self.active = Some(state);
        }
        match self.active.as_mut() {
            Some(state) => Ok(state),
            None => Err(StrataError::internal("write state missing after open")),
        }
    }

    /// Append one row, opening the writer lazily.
    ///
    /// A failed append poisons the session: the writer is discarded without
    /// flushing so nothing from the failed statement is committed.
    pub fn append_row(
        &mut self,
        cx: &Cx,
        relation: &Relation,
        config: &StorageConfig,
        slot: &mut TupleSlot,
    ) -> Result<()> {
        let state = self.ensure(cx, relation, config)?;
        let outcome = state.append(cx, slot);
        if outcome.is_err() {
            self.active = None;
        }
        outcome
    }

    /// Append a batch of rows, opening the writer lazily.
    ///
    /// All-or-nothing across the batch: the first failure discards the
    /// writer, so no prefix of the batch is ever committed.
    pub fn append_batch(
        &mut self,
        cx: &Cx,
        relation: &Relation,
        config: &StorageConfig,
        slots: &mut [TupleSlot],
    ) -> Result<()> {
        let state = self.ensure(cx, relation, config)?;
        let mut failed = None;
        for slot in slots.iter_mut() {
            let outcome = cx.checkpoint().and_then(|()| state.append(cx, slot));
            if let Err(err) = outcome {
                failed = Some(err);
                break;
            }
        }
        if let Some(err) = failed {
            self.active = None;
            return Err(err);
        }
        Ok(())
    }

    /// Flush and release the active writer. Idempotent: with no writer open
    /// this is a no-op.
    pub fn flush_and_close(&mut self, cx: &Cx) -> Result<()> {
        if let Some(state) = self.active.take() {
            let relation = state.relation();
            let rows = state.finish(cx)?;
            tracing::info!(relation = relation.get(), rows, "flushed and closed write state");
        }
        Ok(())
    }
}
