//! Dynamically typed column values and the virtual tuple slot.
//!
//! A [`Datum`] is one column value. Values that still live out of line in
//! the host's secondary storage are represented by [`Datum::OutOfLine`] and
//! must be materialized ([`TupleSlot::flatten`]) before they reach the
//! columnar writer — the writer has no deferred-reference mechanism.

use std::fmt;
use std::sync::Arc;

use strata_error::{Result, StrataError};

use crate::ColumnIdx;

/// Resolver for out-of-line values.
///
/// Implemented by the host's secondary-storage machinery. `fetch` must
/// return a self-contained inline datum.
pub trait OutOfLineStore: Send + Sync {
    /// Materialize the value behind `token`.
    fn fetch(&self, token: u64) -> Result<Datum>;
}

/// A reference to a value stored out of line.
#[derive(Clone)]
pub struct OutOfLineRef {
    store: Arc<dyn OutOfLineStore>,
    token: u64,
}

impl OutOfLineRef {
    /// Create a reference resolvable through `store`.
    pub fn new(store: Arc<dyn OutOfLineStore>, token: u64) -> Self {
        Self { store, token }
    }

    /// The opaque token identifying the stored value.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Materialize the referenced value.
    pub fn fetch(&self) -> Result<Datum> {
        self.store.fetch(self.token)
    }
}

impl fmt::Debug for OutOfLineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutOfLineRef")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl PartialEq for OutOfLineRef {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && Arc::ptr_eq(&self.store, &other.store)
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit IEEE 754 float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob.
    Blob(Vec<u8>),
    /// A value still resident in the host's out-of-line storage.
    OutOfLine(OutOfLineRef),
}

impl Datum {
    /// Whether this datum still references out-of-line storage.
    #[inline]
    pub const fn is_out_of_line(&self) -> bool {
        matches!(self, Self::OutOfLine(_))
    }

    /// Approximate inline width in bytes, for size estimation.
    pub fn width(&self) -> u64 {
        match self {
            Self::Int(_) | Self::Float(_) => 8,
            Self::Text(s) => s.len() as u64,
            Self::Blob(b) => b.len() as u64,
            // Unknown until fetched; assume a pointer-sized slot.
            Self::OutOfLine(_) => 8,
        }
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<Vec<u8>> for Datum {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

/// A virtual tuple slot: one row's values and null flags, positionally
/// aligned with a [`crate::TupleShape`].
///
/// `None` in a slot position means SQL NULL. The slot is reused across rows
/// by a scan; [`TupleSlot::clear`] resets every position to null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TupleSlot {
    values: Vec<Option<Datum>>,
}

impl TupleSlot {
    /// An all-null slot with `arity` positions.
    pub fn with_arity(arity: usize) -> Self {
        Self {
            values: vec![None; arity],
        }
    }

    /// A slot built from explicit per-column values.
    pub fn from_values(values: Vec<Option<Datum>>) -> Self {
        Self { values }
    }

    /// Number of column positions.
    #[inline]
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Reset every position to null.
    pub fn clear(&mut self) {
        for v in &mut self.values {
            *v = None;
        }
    }

    /// The value at `idx`, or `None` for SQL NULL.
    #[inline]
    pub fn datum(&self, idx: ColumnIdx) -> Option<&Datum> {
        self.values.get(idx.0).and_then(|v| v.as_ref())
    }

    /// Whether the position at `idx` is SQL NULL.
    #[inline]
    pub fn is_null(&self, idx: ColumnIdx) -> bool {
        self.datum(idx).is_none()
    }

    /// Store `value` at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is outside the slot's arity.
    pub fn set(&mut self, idx: ColumnIdx, value: Option<Datum>) {
        self.values[idx.0] = value;
    }

    /// All positions in order.
    #[inline]
    pub fn values(&self) -> &[Option<Datum>] {
        &self.values
    }

    /// Whether any position still references out-of-line storage.
    pub fn has_out_of_line(&self) -> bool {
        self.values
            .iter()
            .any(|v| v.as_ref().is_some_and(Datum::is_out_of_line))
    }

    /// Materialize every out-of-line value into self-contained form.
    ///
    /// After a successful flatten, no position references out-of-line
    /// storage. A resolver that returns another out-of-line datum is a
    /// collaborator bug and is reported as an internal error.
    pub fn flatten(&mut self) -> Result<()> {
        for v in &mut self.values {
            if let Some(Datum::OutOfLine(r)) = v {
                let token = r.token();
                let fetched = r.fetch()?;
                if fetched.is_out_of_line() {
                    return Err(StrataError::internal(format!(
                        "out-of-line store returned a non-inline datum for token {token}"
                    )));
                }
                *v = Some(fetched);
            }
        }
        Ok(())
    }

    /// Approximate row width in bytes, for size estimation.
    pub fn width(&self) -> u64 {
        self.values
            .iter()
            .map(|v| v.as_ref().map_or(0, Datum::width))
            .sum()
    }
}
