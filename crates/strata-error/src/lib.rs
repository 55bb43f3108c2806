use std::fmt;

/// An entry point of the table-access contract that the append-only model
/// does not implement.
///
/// The host contract requires every one of these routines to be present in
/// the routine table, so each gets a named variant here and a deterministic
/// [`StrataError::NotImplemented`] failure when invoked. Callers can match on
/// the variant to detect capability gaps structurally instead of parsing
/// message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedOp {
    /// Restarting an open scan without close/reopen.
    Rescan,
    /// Parallel scan shared-state size estimation.
    ParallelScanEstimate,
    /// Parallel scan shared-state initialization.
    ParallelScanInitialize,
    /// Parallel scan shared-state reinitialization.
    ParallelScanReinitialize,
    /// Opening an index-driven fetch session.
    IndexFetchBegin,
    /// Resetting an index-driven fetch session.
    IndexFetchReset,
    /// Closing an index-driven fetch session.
    IndexFetchEnd,
    /// Fetching one row through an index-driven fetch session.
    IndexFetchTuple,
    /// Fetching a specific row version by tuple id.
    FetchRowVersion,
    /// Resolving the latest version of a tuple id.
    GetLatestTid,
    /// Validating a tuple id against the relation.
    TupleTidValid,
    /// Computing a transaction horizon for a set of tuple ids.
    ComputeXidHorizon,
    /// Speculative (upsert-style) insert.
    TupleInsertSpeculative,
    /// Completing or aborting a speculative insert.
    TupleCompleteSpeculative,
    /// Point delete by tuple id.
    TupleDelete,
    /// Point update by tuple id.
    TupleUpdate,
    /// Row-level locking by tuple id.
    TupleLock,
    /// Block-preserving relocation copy (non-rewriting).
    RelationCopyData,
    /// Scanning the relation to build an index.
    IndexBuildRangeScan,
    /// Scanning the relation to validate an index.
    IndexValidateScan,
    /// Bitmap-index-driven block scan.
    BitmapScanNextBlock,
    /// Bitmap-index-driven tuple scan.
    BitmapScanNextTuple,
    /// Sample scan block selection.
    SampleScanNextBlock,
    /// Sample scan tuple selection.
    SampleScanNextTuple,
}

impl UnsupportedOp {
    /// The routine-table entry point name, as the host knows it.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rescan => "scan_rescan",
            Self::ParallelScanEstimate => "parallelscan_estimate",
            Self::ParallelScanInitialize => "parallelscan_initialize",
            Self::ParallelScanReinitialize => "parallelscan_reinitialize",
            Self::IndexFetchBegin => "index_fetch_begin",
            Self::IndexFetchReset => "index_fetch_reset",
            Self::IndexFetchEnd => "index_fetch_end",
            Self::IndexFetchTuple => "index_fetch_tuple",
            Self::FetchRowVersion => "tuple_fetch_row_version",
            Self::GetLatestTid => "tuple_get_latest_tid",
            Self::TupleTidValid => "tuple_tid_valid",
            Self::ComputeXidHorizon => "compute_xid_horizon_for_tuples",
            Self::TupleInsertSpeculative => "tuple_insert_speculative",
            Self::TupleCompleteSpeculative => "tuple_complete_speculative",
            Self::TupleDelete => "tuple_delete",
            Self::TupleUpdate => "tuple_update",
            Self::TupleLock => "tuple_lock",
            Self::RelationCopyData => "relation_copy_data",
            Self::IndexBuildRangeScan => "index_build_range_scan",
            Self::IndexValidateScan => "index_validate_scan",
            Self::BitmapScanNextBlock => "scan_bitmap_next_block",
            Self::BitmapScanNextTuple => "scan_bitmap_next_tuple",
            Self::SampleScanNextBlock => "scan_sample_next_block",
            Self::SampleScanNextTuple => "scan_sample_next_tuple",
        }
    }
}

impl fmt::Display for UnsupportedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse classification of a [`StrataError`].
///
/// Mirrors the taxonomy the adapter promises to its callers: declared
/// capability gaps, broken adapter invariants, shape mismatches on the
/// rewrite path, collaborator failures passed through, and host-requested
/// cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A declared capability gap of the append-only model.
    Unsupported,
    /// An adapter invariant was violated by the caller.
    InvariantViolation,
    /// Row shapes or relation structure do not line up.
    StructuralMismatch,
    /// An error from the columnar engine or metadata store, unmodified.
    Collaborator,
    /// The host requested cancellation of the current statement.
    Cancelled,
}

/// Primary error type for the strata table-access layer.
///
/// Structured variants for every failure the adapter itself can produce;
/// collaborator errors (engine, metadata store, storage manager) travel
/// through the same type so they cross the adapter unmodified.
#[derive(Debug)]
pub enum StrataError {
    // === Declared capability gaps ===
    /// Entry point outside the append-only model.
    NotImplemented {
        /// Which routine-table entry point was invoked.
        op: UnsupportedOp,
    },

    // === Invariant violations ===
    /// A writer is already active for another relation.
    WriterAlreadyActive {
        /// Relation id bound to the active writer.
        active: u32,
        /// Relation id the caller asked for.
        requested: u32,
    },

    /// Storage creation requested with a persistence mode other than permanent.
    UnsupportedPersistence { requested: String },

    // === Structural mismatches (rewrite path) ===
    /// Rewrite invoked with differing column counts.
    ColumnCountMismatch { source: usize, target: usize },

    /// Rewrite invoked with an index present or a sorted rewrite requested.
    IndexesNotSupported,

    /// A row does not match the tuple shape it was presented against.
    ArityMismatch { expected: usize, actual: usize },

    // === Metadata ===
    /// A metadata row that must exist is absent.
    MetadataMissing { storage: u64 },

    // === Out-of-line values ===
    /// An out-of-line datum could not be materialized before hitting the writer.
    OutOfLine { token: u64, detail: String },

    // === Cancellation ===
    /// The enclosing statement was aborted by the host.
    Cancelled,

    // === Collaborator-propagated ===
    /// I/O error from a collaborator.
    Io(std::io::Error),

    /// Internal logic error (should never happen).
    Internal(String),
}

// Hand-written instead of `#[derive(thiserror::Error)]`: the
// `ColumnCountMismatch::source` field name would otherwise be inferred as the
// error source, which `usize` cannot be.
impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented { op } => {
                write!(f, "{op} is not implemented by the columnar access method")
            }
            Self::WriterAlreadyActive { active, requested } => write!(
                f,
                "write state already active for relation {active}, cannot open one for relation {requested}"
            ),
            Self::UnsupportedPersistence { requested } => write!(
                f,
                "columnar storage only supports permanent persistence, got {requested}"
            ),
            Self::ColumnCountMismatch { source, target } => write!(
                f,
                "rewrite requires identical column counts: source has {source}, target has {target}"
            ),
            Self::IndexesNotSupported => {
                f.write_str("columnar access method does not support indexes")
            }
            Self::ArityMismatch { expected, actual } => write!(
                f,
                "row arity mismatch: shape has {expected} columns, row has {actual}"
            ),
            Self::MetadataMissing { storage } => {
                write!(f, "no columnar metadata for storage {storage}")
            }
            Self::OutOfLine { token, detail } => write!(
                f,
                "failed to materialize out-of-line value for token {token}: {detail}"
            ),
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for StrataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl StrataError {
    /// Classify this error into the adapter's declared taxonomy.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotImplemented { .. } => ErrorCategory::Unsupported,
            Self::WriterAlreadyActive { .. } | Self::UnsupportedPersistence { .. } => {
                ErrorCategory::InvariantViolation
            }
            Self::ColumnCountMismatch { .. }
            | Self::IndexesNotSupported
            | Self::ArityMismatch { .. } => ErrorCategory::StructuralMismatch,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::MetadataMissing { .. }
            | Self::OutOfLine { .. }
            | Self::Io(_)
            | Self::Internal(_) => ErrorCategory::Collaborator,
        }
    }

    /// Whether this error is a declared capability gap rather than a fault.
    pub const fn is_capability_gap(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }

    /// Create a not-implemented error for a routine-table entry point.
    pub const fn not_implemented(op: UnsupportedOp) -> Self {
        Self::NotImplemented { op }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `StrataError`.
pub type Result<T> = std::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_implemented_names_the_entry_point() {
        let err = StrataError::not_implemented(UnsupportedOp::Rescan);
        assert_eq!(
            err.to_string(),
            "scan_rescan is not implemented by the columnar access method"
        );
        assert!(err.is_capability_gap());
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }

    #[test]
    fn every_unsupported_op_has_a_distinct_name() {
        let ops = [
            UnsupportedOp::Rescan,
            UnsupportedOp::ParallelScanEstimate,
            UnsupportedOp::ParallelScanInitialize,
            UnsupportedOp::ParallelScanReinitialize,
            UnsupportedOp::IndexFetchBegin,
            UnsupportedOp::IndexFetchReset,
            UnsupportedOp::IndexFetchEnd,
            UnsupportedOp::IndexFetchTuple,
            UnsupportedOp::FetchRowVersion,
            UnsupportedOp::GetLatestTid,
            UnsupportedOp::TupleTidValid,
            UnsupportedOp::ComputeXidHorizon,
            UnsupportedOp::TupleInsertSpeculative,
            UnsupportedOp::TupleCompleteSpeculative,
            UnsupportedOp::TupleDelete,
            UnsupportedOp::TupleUpdate,
            UnsupportedOp::TupleLock,
            UnsupportedOp::RelationCopyData,
            UnsupportedOp::IndexBuildRangeScan,
            UnsupportedOp::IndexValidateScan,
            UnsupportedOp::BitmapScanNextBlock,
            UnsupportedOp::BitmapScanNextTuple,
            UnsupportedOp::SampleScanNextBlock,
            UnsupportedOp::SampleScanNextTuple,
        ];
        let mut names: Vec<&str> = ops.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ops.len());
    }

    #[test]
    fn writer_conflict_is_invariant_violation() {
        let err = StrataError::WriterAlreadyActive {
            active: 16384,
            requested: 16390,
        };
        assert_eq!(err.category(), ErrorCategory::InvariantViolation);
        assert_eq!(
            err.to_string(),
            "write state already active for relation 16384, cannot open one for relation 16390"
        );
    }

    #[test]
    fn persistence_is_invariant_violation() {
        let err = StrataError::UnsupportedPersistence {
            requested: "temporary".to_owned(),
        };
        assert_eq!(err.category(), ErrorCategory::InvariantViolation);
    }

    #[test]
    fn rewrite_errors_are_structural() {
        let err = StrataError::ColumnCountMismatch {
            source: 3,
            target: 2,
        };
        assert_eq!(err.category(), ErrorCategory::StructuralMismatch);
        assert_eq!(
            StrataError::IndexesNotSupported.category(),
            ErrorCategory::StructuralMismatch
        );
    }

    #[test]
    fn io_error_passes_through() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: StrataError = io_err.into();
        assert_eq!(err.category(), ErrorCategory::Collaborator);
        assert!(matches!(err, StrataError::Io(_)));
    }

    #[test]
    fn cancelled_has_its_own_category() {
        assert_eq!(StrataError::Cancelled.category(), ErrorCategory::Cancelled);
    }
}
