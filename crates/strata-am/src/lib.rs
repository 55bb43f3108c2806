//! Table-access adapter between a row-oriented relational host and an
//! append-only columnar storage engine.
//!
//! The host speaks rows: virtual tuple slots, sequential scans, relation
//! lifecycle callbacks, and a fixed routine-table contract. The engine
//! speaks append-only columnar sessions. This crate sits between them:
//!
//! - [`routine::ColumnarAccess`] is the full routine table, including a
//!   deterministic, named failure for every entry point the append-only
//!   model does not implement.
//! - [`write`] holds the exclusive write state: one open writer per
//!   process, created lazily on first insert, flushed on bulk-insert
//!   completion or statement teardown.
//! - [`scan`] wraps forward-only read sessions with idempotent close.
//! - [`meta`] bridges storage lifecycle to the durable metadata store,
//!   preserving per-storage layout across relocation.
//! - [`rewrite`] streams one relation into fresh storage, nulling dropped
//!   columns.
//! - [`hooks`] dispatches teardown and catalog-drop notifications to
//!   ordered observer lists.

pub mod hooks;
pub mod meta;
pub mod rewrite;
pub mod routine;
pub mod scan;
pub mod write;

pub use hooks::{DropEvent, LifecycleHooks, ObjectClass, ObserverList};
pub use meta::MetadataBridge;
pub use rewrite::{copy_for_compaction, RewriteStats};
pub use routine::{
    AnalyzeStats, Capability, ColumnarAccess, RelSizeEstimate, ACCESS_METHOD_NAME,
};
pub use scan::ScanSession;
pub use write::{WriteState, WriteStateManager};
