//! Fixed-capacity, sentinel-padded history sequences.

use serde::{Deserialize, Serialize};

use crate::error::{CtxgenError, Result};
use crate::event::SENTINEL;

/// An ordered sequence of identifiers with a fixed capacity.
///
/// Slots `[0, length)` hold identifiers; every slot at or past `length` holds
/// [`SENTINEL`]. Both invariants are checked by every constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySequence {
    values: Vec<i64>,
    length: usize,
}

impl HistorySequence {
    /// Creates an empty, all-sentinel sequence.
    pub fn empty(capacity: usize) -> Self {
        Self {
            values: vec![SENTINEL; capacity],
            length: 0,
        }
    }

    /// Creates a sequence holding `ids`, padded up to `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`CtxgenError::CapacityExceeded`] if `ids` is longer than
    /// `capacity`.
    pub fn from_ids(capacity: usize, ids: &[i64]) -> Result<Self> {
        if ids.len() > capacity {
            return Err(CtxgenError::CapacityExceeded {
                length: ids.len(),
                capacity,
            });
        }
        let mut values = vec![SENTINEL; capacity];
        values[..ids.len()].copy_from_slice(ids);
        Ok(Self {
            values,
            length: ids.len(),
        })
    }

    /// Wraps an already padded buffer, checking the padding invariant.
    pub fn from_padded(values: Vec<i64>, length: usize) -> Result<Self> {
        if length > values.len() {
            return Err(CtxgenError::CapacityExceeded {
                length,
                capacity: values.len(),
            });
        }
        if let Some(offset) = values[length..].iter().position(|&v| v != SENTINEL) {
            return Err(CtxgenError::PaddingViolation {
                slot: length + offset,
                value: values[length + offset],
                length,
            });
        }
        Ok(Self { values, length })
    }

    /// Number of populated slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if no slot is populated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Fixed number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// The populated identifiers.
    pub fn ids(&self) -> &[i64] {
        &self.values[..self.length]
    }

    /// All slots, padding included.
    pub fn padded(&self) -> &[i64] {
        &self.values
    }

    /// Consumes the sequence and returns the padded buffer.
    pub fn into_padded(self) -> Vec<i64> {
        self.values
    }
}
