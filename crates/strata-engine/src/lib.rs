//! External collaborator seams for the strata table-access layer.
//!
//! The adapter core never talks to a concrete columnar engine, metadata
//! store, storage manager, or lock manager; it talks to the open traits in
//! [`traits`]. Hosts plug in their own implementations. [`memory`] provides
//! an in-memory implementation of all four seams for tests and embedded use.

pub mod memory;
pub mod traits;

pub use memory::MemoryEngine;
pub use traits::{
    ColumnarEngine, LockMode, MetadataStore, RelationLocker, RowReader, RowWriter, StorageManager,
};
