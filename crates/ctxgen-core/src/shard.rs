//! Contiguous row-range partitions of an event log.
//!
//! A [`Shard`] is a half-open range `[start, end)` of row indices. The shards
//! returned by [`partition`] cover `[0, total_rows)` exactly once, in order,
//! and are the unit of both parallel work and output files.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{CtxgenError, Result};
use crate::event::RowIndex;

/// Default number of rows per shard.
pub const DEFAULT_SHARD_WIDTH: usize = 1_000_000;

/// Descriptor of one unit of sharded work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shard {
    /// Position of this shard in the partition.
    pub index: usize,
    /// Total number of shards in the partition.
    pub count: usize,
    /// First row (inclusive).
    pub start: RowIndex,
    /// Last row (exclusive).
    pub end: RowIndex,
}

impl Shard {
    /// Number of rows covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the shard covers no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// The covered row indices.
    #[inline]
    pub fn rows(&self) -> Range<RowIndex> {
        self.start..self.end
    }

    /// Returns `true` if this is the only shard of its partition.
    #[inline]
    pub fn is_sole(&self) -> bool {
        self.count == 1
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shard {}/{} [{}, {})",
            self.index, self.count, self.start, self.end
        )
    }
}

/// Splits `[0, total_rows)` into `ceil(total_rows / width)` shards.
///
/// Every shard is `width` rows wide except possibly the last, which holds the
/// remainder. An empty log yields no shards.
///
/// # Errors
///
/// Returns [`CtxgenError::Config`] if `width` is zero.
pub fn partition(total_rows: usize, width: usize) -> Result<Vec<Shard>> {
    if width == 0 {
        return Err(CtxgenError::config("shard_width must be greater than 0"));
    }
    let count = total_rows.div_ceil(width);
    Ok((0..count)
        .map(|index| {
            let start = index * width;
            Shard {
                index,
                count,
                start,
                end: (start + width).min(total_rows),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers_exactly_once(shards: &[Shard], total: usize) {
        let mut next = 0;
        for shard in shards {
            assert_eq!(shard.start, next, "gap or overlap before {shard}");
            assert!(!shard.is_empty());
            next = shard.end;
        }
        assert_eq!(next, total);
    }

    #[test]
    fn test_partition_divisible() {
        let shards = partition(3_000, 1_000).unwrap();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(|s| s.len() == 1_000));
        assert!(shards.iter().all(|s| s.count == 3));
        assert_covers_exactly_once(&shards, 3_000);
    }

    #[test]
    fn test_partition_remainder() {
        let shards = partition(2_500, 1_000).unwrap();
        assert_eq!(shards.len(), 3);
        assert_eq!(shards[0].len(), 1_000);
        assert_eq!(shards[1].len(), 1_000);
        assert_eq!(shards[2].len(), 500);
        assert_covers_exactly_once(&shards, 2_500);
    }

    #[test]
    fn test_partition_small_log_is_one_shard() {
        let shards = partition(7, DEFAULT_SHARD_WIDTH).unwrap();
        assert_eq!(shards.len(), 1);
        assert!(shards[0].is_sole());
        assert_eq!(shards[0].rows(), 0..7);
    }

    #[test]
    fn test_partition_empty_and_invalid() {
        assert!(partition(0, 10).unwrap().is_empty());
        assert!(partition(10, 0).is_err());
    }

    #[test]
    fn test_shard_display() {
        let shard = partition(25, 10).unwrap()[2];
        assert_eq!(shard.to_string(), "shard 2/3 [20, 25)");
    }
}
