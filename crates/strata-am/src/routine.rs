//! The table-access routine table.
//!
//! [`ColumnarAccess`] is the full surface the host calls through: scans,
//! inserts, storage lifecycle, rewrite, analysis, and size estimation. Every
//! entry point of the host contract is present; the ones outside the
//! append-only model return a structured
//! [`StrataError::NotImplemented`] naming the routine, and
//! [`Capability`] flags let callers probe support without triggering the
//! error path.

use std::sync::Arc;

use bitflags::bitflags;

use strata_engine::{
    ColumnarEngine, LockMode, MetadataStore, RelationLocker, StorageManager,
};
use strata_error::{Result, StrataError, UnsupportedOp};
use strata_types::cx::Cx;
use strata_types::{
    ColumnIdx, IndexId, Persistence, Relation, Snapshot, StorageConfig, StorageId, TupleSlot,
};

use crate::hooks::DropEvent;
use crate::meta::MetadataBridge;
use crate::rewrite::{self, RewriteStats};
use crate::scan::ScanSession;
use crate::write::WriteStateManager;

/// Name the access method registers under in the host catalog. Relations
/// whose `access_method` equals this string are governed by this adapter.
pub const ACCESS_METHOD_NAME: &str = "strata_columnar";

bitflags! {
    /// Capabilities the append-only columnar model actually implements.
    ///
    /// Anything not flagged here maps to a routine that fails with
    /// [`StrataError::NotImplemented`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capability: u32 {
        /// Row and batch insert.
        const INSERT = 1 << 0;
        /// Sequential scans.
        const SCAN = 1 << 1;
        /// Storage (re)initialization and truncation.
        const RELOCATE = 1 << 2;
        /// Streaming rewrite (compaction).
        const REWRITE = 1 << 3;
        /// Size and row-count estimation.
        const ESTIMATE = 1 << 4;
        /// Analysis sampling.
        const ANALYZE = 1 << 5;
    }
}

/// Size estimate reported to the planner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelSizeEstimate {
    /// Physical size in bytes.
    pub size_bytes: u64,
    /// Estimated committed row count.
    pub row_count: u64,
    /// Fraction of rows visible to every snapshot. Always 1.0: committed
    /// rows are visible to everyone in the append-only model.
    pub all_visible_fraction: f64,
}

/// Counters accumulated by the analysis entry points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalyzeStats {
    /// Rows seen and counted live.
    pub live_rows: f64,
    /// Dead rows. Always zero: the model keeps no dead row versions.
    pub dead_rows: f64,
}

/// The access-method routine table over a columnar engine `E`, metadata
/// store `M`, storage manager `S`, and lock manager `L`.
pub struct ColumnarAccess<E: ColumnarEngine, M, S, L> {
    engine: Arc<E>,
    bridge: MetadataBridge<M, S>,
    locker: Arc<L>,
    config: StorageConfig,
    writer: WriteStateManager<E>,
}

impl<E, M, S, L> ColumnarAccess<E, M, S, L>
where
    E: ColumnarEngine,
    M: MetadataStore,
    S: StorageManager,
    L: RelationLocker,
{
    /// Assemble the routine table over its collaborators.
    pub fn new(
        engine: Arc<E>,
        meta: Arc<M>,
        storage: Arc<S>,
        locker: Arc<L>,
        config: StorageConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            writer: WriteStateManager::new(Arc::clone(&engine)),
            engine,
            bridge: MetadataBridge::new(meta, storage),
            locker,
            config,
        })
    }

    /// What this access method supports.
    pub const fn capabilities() -> Capability {
        Capability::INSERT
            .union(Capability::SCAN)
            .union(Capability::RELOCATE)
            .union(Capability::REWRITE)
            .union(Capability::ESTIMATE)
            .union(Capability::ANALYZE)
    }

    /// Probe a capability without touching the error path.
    pub fn supports(&self, capability: Capability) -> bool {
        Self::capabilities().contains(capability)
    }

    /// Current process-level storage configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Replace the process-level storage configuration. Already-open writers
    /// keep the snapshot they were opened with.
    pub fn set_config(&mut self, config: StorageConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Whether `relation` is governed by this access method.
    pub fn governs(&self, relation: &Relation) -> bool {
        relation.access_method == ACCESS_METHOD_NAME
    }

    /// A fresh slot shaped for `relation`, every position null.
    pub fn create_slot(&self, relation: &Relation) -> TupleSlot {
        TupleSlot::with_arity(relation.shape.arity())
    }

    // === Scans ===

    /// Open a sequential scan.
    pub fn begin_scan(
        &self,
        cx: &Cx,
        relation: &Relation,
        snapshot: Snapshot,
        columns: Option<Vec<ColumnIdx>>,
    ) -> Result<ScanSession<E::Reader>> {
        ScanSession::open(self.engine.as_ref(), cx, relation, snapshot, columns)
    }

    /// Restarting a scan is not supported; close and reopen instead.
    pub fn scan_rescan(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::Rescan))
    }

    /// Parallel scans are not supported.
    pub fn parallelscan_estimate(&self) -> Result<usize> {
        Err(StrataError::not_implemented(
            UnsupportedOp::ParallelScanEstimate,
        ))
    }

    /// Parallel scans are not supported.
    pub fn parallelscan_initialize(&self) -> Result<()> {
        Err(StrataError::not_implemented(
            UnsupportedOp::ParallelScanInitialize,
        ))
    }

    /// Parallel scans are not supported.
    pub fn parallelscan_reinitialize(&self) -> Result<()> {
        Err(StrataError::not_implemented(
            UnsupportedOp::ParallelScanReinitialize,
        ))
    }

    // === Index-driven fetches and tuple-id operations ===

    pub fn index_fetch_begin(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::IndexFetchBegin))
    }

    pub fn index_fetch_reset(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::IndexFetchReset))
    }

    pub fn index_fetch_end(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::IndexFetchEnd))
    }

    pub fn index_fetch_tuple(&self) -> Result<bool> {
        Err(StrataError::not_implemented(UnsupportedOp::IndexFetchTuple))
    }

    pub fn tuple_fetch_row_version(&self) -> Result<bool> {
        Err(StrataError::not_implemented(UnsupportedOp::FetchRowVersion))
    }

    pub fn tuple_get_latest_tid(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::GetLatestTid))
    }

    pub fn tuple_tid_valid(&self) -> Result<bool> {
        Err(StrataError::not_implemented(UnsupportedOp::TupleTidValid))
    }

    pub fn compute_xid_horizon_for_tuples(&self) -> Result<u64> {
        Err(StrataError::not_implemented(
            UnsupportedOp::ComputeXidHorizon,
        ))
    }

    /// Every committed row is visible to every snapshot.
    pub fn tuple_satisfies_snapshot(&self, _snapshot: Snapshot) -> Result<bool> {
        Ok(true)
    }

    // === Inserts and mutation ===

    /// Insert one row, opening the shared write state lazily on first use.
    pub fn tuple_insert(
        &mut self,
        cx: &Cx,
        relation: &Relation,
        slot: &mut TupleSlot,
    ) -> Result<()> {
        let config = self.config;
        self.writer.append_row(cx, relation, &config, slot)
    }

    /// Insert a batch of rows. All-or-nothing across the batch.
    pub fn multi_insert(
        &mut self,
        cx: &Cx,
        relation: &Relation,
        slots: &mut [TupleSlot],
    ) -> Result<()> {
        let config = self.config;
        self.writer.append_batch(cx, relation, &config, slots)
    }

    pub fn tuple_insert_speculative(&self) -> Result<()> {
        Err(StrataError::not_implemented(
            UnsupportedOp::TupleInsertSpeculative,
        ))
    }

    pub fn tuple_complete_speculative(&self) -> Result<()> {
        Err(StrataError::not_implemented(
            UnsupportedOp::TupleCompleteSpeculative,
        ))
    }

    pub fn tuple_delete(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::TupleDelete))
    }

    pub fn tuple_update(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::TupleUpdate))
    }

    pub fn tuple_lock(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::TupleLock))
    }

    /// Flush and release the write state after a bulk insert. Idempotent.
    pub fn finish_bulk_insert(&mut self, cx: &Cx) -> Result<()> {
        self.writer.flush_and_close(cx)
    }

    /// Whether a writer is currently open. Exposed for hosts that schedule
    /// teardown conditionally.
    pub fn has_active_writer(&self) -> bool {
        !self.writer.is_idle()
    }

    // === Storage lifecycle ===

    /// (Re)initialize storage for `relation` under `new_storage`, carrying
    /// the layout of any prior metadata row over.
    pub fn relation_set_new_storage(
        &self,
        cx: &Cx,
        relation: &Relation,
        new_storage: StorageId,
        persistence: Persistence,
    ) -> Result<()> {
        self.bridge
            .create_storage(cx, relation, new_storage, persistence, &self.config)
    }

    /// Truncate `relation` in place. Only valid while its storage is
    /// invisible to other transactions.
    pub fn relation_nontransactional_truncate(&self, cx: &Cx, relation: &Relation) -> Result<()> {
        self.bridge.in_place_truncate(cx, relation)
    }

    /// Block-level copy is meaningless for stripe-encoded storage.
    pub fn relation_copy_data(&self) -> Result<()> {
        Err(StrataError::not_implemented(UnsupportedOp::RelationCopyData))
    }

    /// Rewrite `old` into `new` row by row.
    ///
    /// Requires the shared write state to be idle: the rewrite opens its own
    /// transient writer over the target and the model permits only one open
    /// writer at a time.
    pub fn relation_copy_for_compaction(
        &self,
        cx: &Cx,
        old: &Relation,
        new: &Relation,
        old_index: Option<IndexId>,
        use_sort: bool,
    ) -> Result<RewriteStats> {
        if let Some(active) = self.writer.active_relation() {
            return Err(StrataError::WriterAlreadyActive {
                active: active.get(),
                requested: new.id.get(),
            });
        }
        rewrite::copy_for_compaction(
            self.engine.as_ref(),
            cx,
            old,
            new,
            old_index,
            use_sort,
            &self.config,
        )
    }

    // === Analysis ===

    /// Every block is analyzable; there is no per-block visibility state.
    pub fn scan_analyze_next_block(&self, cx: &Cx) -> Result<bool> {
        cx.checkpoint()?;
        Ok(true)
    }

    /// Pull one row for analysis, counting it live. Returns `false` when the
    /// session is exhausted.
    pub fn scan_analyze_next_tuple(
        &self,
        cx: &Cx,
        scan: &mut ScanSession<E::Reader>,
        slot: &mut TupleSlot,
        stats: &mut AnalyzeStats,
    ) -> Result<bool> {
        if scan.next_row(cx, slot)? {
            stats.live_rows += 1.0;
            return Ok(true);
        }
        Ok(false)
    }

    // === Index build ===

    pub fn index_build_range_scan(&self) -> Result<u64> {
        Err(StrataError::not_implemented(
            UnsupportedOp::IndexBuildRangeScan,
        ))
    }

    pub fn index_validate_scan(&self) -> Result<()> {
        Err(StrataError::not_implemented(
            UnsupportedOp::IndexValidateScan,
        ))
    }

    // === Planner estimation ===

    /// Physical size of the relation's storage in bytes.
    pub fn relation_size(&self, cx: &Cx, relation: &Relation) -> Result<u64> {
        self.bridge
            .storage_manager()
            .storage_size(cx, relation.storage)
    }

    /// Out-of-line values are materialized inline before write; no auxiliary
    /// relation is ever needed.
    pub fn relation_needs_toast_table(&self, _relation: &Relation) -> bool {
        false
    }

    /// Estimate size, row count, and visibility for the planner.
    pub fn estimate_rel_size(&self, cx: &Cx, relation: &Relation) -> Result<RelSizeEstimate> {
        let size_bytes = self.relation_size(cx, relation)?;
        let row_count = self.engine.estimate_row_count(cx, relation.storage)?;
        Ok(RelSizeEstimate {
            size_bytes,
            row_count,
            all_visible_fraction: 1.0,
        })
    }

    // === Bitmap and sample scans ===

    pub fn scan_bitmap_next_block(&self) -> Result<bool> {
        Err(StrataError::not_implemented(
            UnsupportedOp::BitmapScanNextBlock,
        ))
    }

    pub fn scan_bitmap_next_tuple(&self) -> Result<bool> {
        Err(StrataError::not_implemented(
            UnsupportedOp::BitmapScanNextTuple,
        ))
    }

    pub fn scan_sample_next_block(&self) -> Result<bool> {
        Err(StrataError::not_implemented(
            UnsupportedOp::SampleScanNextBlock,
        ))
    }

    pub fn scan_sample_next_tuple(&self) -> Result<bool> {
        Err(StrataError::not_implemented(
            UnsupportedOp::SampleScanNextTuple,
        ))
    }

    // === Lifecycle participation ===

    /// Statement-teardown observer body: flush any open writer.
    pub fn teardown(&mut self, cx: &Cx) -> Result<()> {
        self.writer.flush_and_close(cx)
    }

    /// Catalog-drop observer body.
    ///
    /// Takes a shared lock first so the relation cannot vanish while it is
    /// inspected; `lookup` resolves the id against the catalog. When the
    /// relation is governed by this access method, an exclusive lock is
    /// acquired (and held by the host until the drop commits) and the
    /// metadata row is removed. Foreign relations and partial drops are
    /// ignored.
    pub fn on_object_drop(
        &self,
        cx: &Cx,
        event: &DropEvent,
        lookup: &dyn Fn(strata_types::RelationId) -> Option<Relation>,
    ) -> Result<()> {
        if !event.is_relation_drop() {
            return Ok(());
        }
        self.locker.lock(cx, event.object, LockMode::AccessShare)?;
        let Some(relation) = lookup(event.object) else {
            // Already gone; nothing for us to clean up.
            return Ok(());
        };
        if !self.governs(&relation) {
            return Ok(());
        }
        self.locker
            .lock(cx, event.object, LockMode::AccessExclusive)?;
        self.bridge.drop_cleanup(cx, relation.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_engine::MemoryEngine;
    use strata_types::{ColumnMeta, ColumnType, Datum, RelationId, TupleShape};

    type MemAccess = ColumnarAccess<MemoryEngine, MemoryEngine, MemoryEngine, MemoryEngine>;

    fn access(engine: &MemoryEngine) -> MemAccess {
        ColumnarAccess::new(
            Arc::new(engine.clone()),
            Arc::new(engine.clone()),
            Arc::new(engine.clone()),
            Arc::new(engine.clone()),
            StorageConfig::default(),
        )
        .unwrap()
    }

    fn relation(id: u32, storage: u64) -> Relation {
        Relation {
            id: RelationId::new(id).unwrap(),
            storage: StorageId::new(storage),
            name: format!("t{id}"),
            access_method: ACCESS_METHOD_NAME.to_owned(),
            shape: TupleShape::new(vec![
                ColumnMeta::new("id", ColumnType::Int),
                ColumnMeta::new("label", ColumnType::Text),
            ]),
        }
    }

    #[test]
    fn invalid_config_is_rejected_at_assembly() {
        let engine = MemoryEngine::new();
        let bad = StorageConfig {
            stripe_row_count: 10,
            block_row_count: 100,
            ..StorageConfig::default()
        };
        let err = ColumnarAccess::<_, MemoryEngine, MemoryEngine, MemoryEngine>::new(
            Arc::new(engine.clone()),
            Arc::new(engine.clone()),
            Arc::new(engine.clone()),
            Arc::new(engine),
            bad,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("block_row_count"));
    }

    #[test]
    fn capability_flags_match_the_routine_surface() {
        let engine = MemoryEngine::new();
        let am = access(&engine);
        assert!(am.supports(Capability::INSERT | Capability::SCAN));
        assert!(am.supports(Capability::REWRITE));

        assert!(am.scan_rescan().unwrap_err().is_capability_gap());
        assert!(am.tuple_delete().unwrap_err().is_capability_gap());
        assert!(am.tuple_update().unwrap_err().is_capability_gap());
        assert!(am.tuple_lock().unwrap_err().is_capability_gap());
        assert!(am.relation_copy_data().unwrap_err().is_capability_gap());
        assert!(am.index_fetch_tuple().unwrap_err().is_capability_gap());
        assert!(am.scan_sample_next_block().unwrap_err().is_capability_gap());
    }

    #[test]
    fn unsupported_errors_name_their_entry_point() {
        let engine = MemoryEngine::new();
        let am = access(&engine);
        assert_eq!(
            am.tuple_delete().unwrap_err().to_string(),
            "tuple_delete is not implemented by the columnar access method"
        );
        assert_eq!(
            am.parallelscan_estimate().unwrap_err().to_string(),
            "parallelscan_estimate is not implemented by the columnar access method"
        );
    }

    #[test]
    fn governs_compares_the_registered_name() {
        let engine = MemoryEngine::new();
        let am = access(&engine);
        let ours = relation(1, 10);
        let theirs = Relation {
            access_method: "heap".to_owned(),
            ..relation(2, 20)
        };
        assert!(am.governs(&ours));
        assert!(!am.governs(&theirs));
    }

    #[test]
    fn insert_then_scan_round_trip() {
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        let mut am = access(&engine);
        let rel = relation(1, 10);

        let mut slot = am.create_slot(&rel);
        slot.set(ColumnIdx(0), Some(Datum::Int(1)));
        slot.set(ColumnIdx(1), Some("one".into()));
        am.tuple_insert(&cx, &rel, &mut slot).unwrap();
        am.finish_bulk_insert(&cx).unwrap();

        let mut scan = am.begin_scan(&cx, &rel, Snapshot::default(), None).unwrap();
        let mut out = am.create_slot(&rel);
        assert!(scan.next_row(&cx, &mut out).unwrap());
        assert_eq!(out.datum(ColumnIdx(0)), Some(&Datum::Int(1)));
        assert_eq!(out.datum(ColumnIdx(1)), Some(&Datum::Text("one".to_owned())));
        assert!(!scan.next_row(&cx, &mut out).unwrap());
    }

    #[test]
    fn rewrite_is_refused_while_a_writer_is_open() {
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        let mut am = access(&engine);
        let rel = relation(1, 10);
        let target = relation(1, 20);

        let mut slot = am.create_slot(&rel);
        slot.set(ColumnIdx(0), Some(Datum::Int(1)));
        am.tuple_insert(&cx, &rel, &mut slot).unwrap();

        let err = am
            .relation_copy_for_compaction(&cx, &rel, &target, None, false)
            .unwrap_err();
        assert!(matches!(err, StrataError::WriterAlreadyActive { .. }));

        am.finish_bulk_insert(&cx).unwrap();
        am.relation_copy_for_compaction(&cx, &rel, &target, None, false)
            .unwrap();
        assert_eq!(engine.row_count(target.storage), 1);
    }

    #[test]
    fn analysis_counts_every_row_live() {
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        let mut am = access(&engine);
        let rel = relation(1, 10);

        let mut batch: Vec<TupleSlot> = (0..3)
            .map(|i| {
                let mut slot = am.create_slot(&rel);
                slot.set(ColumnIdx(0), Some(Datum::Int(i)));
                slot
            })
            .collect();
        am.multi_insert(&cx, &rel, &mut batch).unwrap();
        am.finish_bulk_insert(&cx).unwrap();

        assert!(am.scan_analyze_next_block(&cx).unwrap());
        let mut scan = am.begin_scan(&cx, &rel, Snapshot::default(), None).unwrap();
        let mut slot = am.create_slot(&rel);
        let mut stats = AnalyzeStats::default();
        while am
            .scan_analyze_next_tuple(&cx, &mut scan, &mut slot, &mut stats)
            .unwrap()
        {}
        assert_eq!(stats.live_rows, 3.0);
        assert_eq!(stats.dead_rows, 0.0);
    }

    #[test]
    fn estimation_reports_full_visibility() {
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        let mut am = access(&engine);
        let rel = relation(1, 10);

        let mut slot = am.create_slot(&rel);
        slot.set(ColumnIdx(0), Some(Datum::Int(7)));
        am.tuple_insert(&cx, &rel, &mut slot).unwrap();
        am.finish_bulk_insert(&cx).unwrap();

        let estimate = am.estimate_rel_size(&cx, &rel).unwrap();
        assert_eq!(estimate.row_count, 1);
        assert_eq!(estimate.all_visible_fraction, 1.0);
        assert!(!am.relation_needs_toast_table(&rel));
        assert!(am.tuple_satisfies_snapshot(Snapshot::default()).unwrap());
    }

    #[test]
    fn drop_observer_cleans_only_governed_relations() {
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        let am = access(&engine);
        let rel = relation(1, 10);

        am.relation_set_new_storage(&cx, &rel, rel.storage, Persistence::Permanent)
            .unwrap();
        assert!(engine.metadata(rel.storage).is_some());

        let event = DropEvent {
            class: crate::hooks::ObjectClass::Relation,
            object: rel.id,
            sub_object: None,
        };
        let looked_up = rel.clone();
        am.on_object_drop(&cx, &event, &move |id| {
            (id == looked_up.id).then(|| looked_up.clone())
        })
        .unwrap();
        assert!(engine.metadata(rel.storage).is_none());
        assert_eq!(
            engine.lock_log(),
            vec![
                (rel.id, LockMode::AccessShare),
                (rel.id, LockMode::AccessExclusive)
            ]
        );
    }

    #[test]
    fn drop_observer_ignores_foreign_and_partial_drops() {
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        let am = access(&engine);
        let foreign = Relation {
            access_method: "heap".to_owned(),
            ..relation(2, 20)
        };

        // Column drop on a governed relation: skipped without locking.
        let column_event = DropEvent {
            class: crate::hooks::ObjectClass::Relation,
            object: RelationId::new(1).unwrap(),
            sub_object: Some(3),
        };
        am.on_object_drop(&cx, &column_event, &|_| None).unwrap();
        assert!(engine.lock_log().is_empty());

        // Whole-relation drop of a foreign table: shared lock only.
        let event = DropEvent {
            class: crate::hooks::ObjectClass::Relation,
            object: foreign.id,
            sub_object: None,
        };
        let looked_up = foreign.clone();
        am.on_object_drop(&cx, &event, &move |_| Some(looked_up.clone()))
            .unwrap();
        assert_eq!(engine.lock_log(), vec![(foreign.id, LockMode::AccessShare)]);
    }
}
