//! Core vocabulary for the strata columnar table-access layer.
//!
//! Identity newtypes ([`RelationId`], [`StorageId`]), the relation and tuple
//! shape model, the per-statement operation context ([`Cx`]), dynamically
//! typed values ([`value::Datum`]) and the virtual tuple slot
//! ([`value::TupleSlot`]).

pub mod cx;
pub mod options;
pub mod value;

pub use cx::Cx;
pub use options::{CompressionKind, StorageConfig, StorageOptions};
pub use value::{Datum, OutOfLineRef, OutOfLineStore, TupleSlot};

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Logical identity of a relation in the host catalog.
///
/// Stable for the lifetime of the relation; survives relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RelationId(NonZeroU32);

impl RelationId {
    /// Create a relation id from a raw u32. Returns `None` for 0, which the
    /// host reserves as the invalid id.
    #[inline]
    pub const fn new(n: u32) -> Option<Self> {
        match NonZeroU32::new(n) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a relation's current physical storage instance.
///
/// Unlike [`RelationId`] this changes whenever the relation's storage is
/// replaced (relocation-style truncate, full rewrite). Metadata rows are
/// keyed by this, never by the logical relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StorageId(u64);

impl StorageId {
    /// Create a storage id from a raw u64.
    #[inline]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get the raw u64 value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a column within a tuple shape. Zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ColumnIdx(pub usize);

impl fmt::Display for ColumnIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an index in the host catalog. The adapter never dereferences
/// one; it only needs to detect that an index exists and refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct IndexId(pub u32);

/// An opaque tuple identifier from the host's row-addressing scheme.
///
/// The columnar model has no physical row identifiers, so every entry point
/// that receives one of these fails with a named unsupported-operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TupleId(pub u64);

/// An opaque snapshot token from the host's transaction machinery.
///
/// Carried through scan open for contract fidelity but not used to filter
/// row visibility: the append-only model treats all committed data as
/// visible. This is a documented limitation, not per-row MVCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Snapshot(pub u64);

/// Persistence mode requested for new relation storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persistence {
    /// Ordinary durable storage. The only mode the columnar model supports.
    Permanent,
    /// Session-local storage, dropped at backend exit.
    Temporary,
    /// Crash-unsafe storage skipped by the write-ahead log.
    Unlogged,
}

impl fmt::Display for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Permanent => "permanent",
            Self::Temporary => "temporary",
            Self::Unlogged => "unlogged",
        };
        f.write_str(s)
    }
}

/// The storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit IEEE 754 float.
    Float,
    /// UTF-8 text.
    Text,
    /// Binary blob.
    Blob,
}

/// One column of a tuple shape.
///
/// Dropped columns stay in the shape as placeholders so positional indexes
/// remain stable; scans skip them and rewrites null them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name as known to the host catalog.
    pub name: String,
    /// Storage class.
    pub ty: ColumnType,
    /// Whether the column has been dropped.
    pub dropped: bool,
}

impl ColumnMeta {
    /// A live (non-dropped) column.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            dropped: false,
        }
    }

    /// A dropped-column placeholder.
    pub fn dropped(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            dropped: true,
        }
    }
}

/// Ordered list of typed, possibly-dropped columns describing one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleShape {
    columns: Vec<ColumnMeta>,
}

impl TupleShape {
    /// Build a shape from its columns.
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    /// Total column count, dropped placeholders included.
    #[inline]
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// All columns in order, dropped placeholders included.
    #[inline]
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// The column at `idx`, if any.
    #[inline]
    pub fn column(&self, idx: ColumnIdx) -> Option<&ColumnMeta> {
        self.columns.get(idx.0)
    }

    /// Indexes of every live (non-dropped) column, in shape order.
    pub fn live_columns(&self) -> Vec<ColumnIdx> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.dropped)
            .map(|(i, _)| ColumnIdx(i))
            .collect()
    }
}

/// A relation as the host hands it to the adapter.
///
/// The adapter does not own relations; the host catalog does. Relocation
/// gives a relation a fresh [`StorageId`] while its [`RelationId`] stays put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Logical identity.
    pub id: RelationId,
    /// Current physical storage identity.
    pub storage: StorageId,
    /// Relation name, for logging only.
    pub name: String,
    /// Name of the access method governing this relation.
    pub access_method: String,
    /// Column shape, dropped placeholders included.
    pub shape: TupleShape,
}

impl Relation {
    /// Rebind this relation description to a new storage instance.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageId) -> Self {
        self.storage = storage;
        self
    }
}

/// Durable per-storage layout record.
///
/// Keyed by [`StorageId`] in the external metadata store. `block_row_count`
/// is fixed at storage creation and preserved across relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMetadata {
    /// Target rows per block for this storage instance.
    pub block_row_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_col_shape() -> TupleShape {
        TupleShape::new(vec![
            ColumnMeta::new("id", ColumnType::Int),
            ColumnMeta::dropped("label", ColumnType::Text),
            ColumnMeta::new("val", ColumnType::Int),
        ])
    }

    #[test]
    fn relation_id_rejects_zero() {
        assert!(RelationId::new(0).is_none());
        assert_eq!(RelationId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn live_columns_skip_dropped() {
        let shape = three_col_shape();
        assert_eq!(shape.arity(), 3);
        assert_eq!(shape.live_columns(), vec![ColumnIdx(0), ColumnIdx(2)]);
    }

    #[test]
    fn with_storage_keeps_logical_identity() {
        let rel = Relation {
            id: RelationId::new(42).unwrap(),
            storage: StorageId::new(100),
            name: "t".to_owned(),
            access_method: "strata_columnar".to_owned(),
            shape: three_col_shape(),
        };
        let moved = rel.clone().with_storage(StorageId::new(200));
        assert_eq!(moved.id, rel.id);
        assert_eq!(moved.storage, StorageId::new(200));
    }

    #[test]
    fn metadata_round_trips_through_serde() {
        let meta = RelationMetadata {
            block_row_count: 10_000,
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: RelationMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
