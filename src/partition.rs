//! Partitioning of the numeric blob identifier space.
//!
//! Blobs are stored under folders named by a numeric id. Dividing the id by
//! [`BUCKET_SIZE`] gives a listing prefix that covers up to a hundred folders,
//! which keeps each listing/diff cycle small.

use std::fmt;
use std::iter::FusedIterator;

/// Number of identifiers covered by one partition.
pub const BUCKET_SIZE: u64 = 100;

/// One bucket of the identifier space, used as a listing prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition(u64);

impl Partition {
    pub fn from_id(id: u64) -> Self {
        Self(id / BUCKET_SIZE)
    }

    pub fn index(&self) -> u64 {
        self.0
    }

    /// Listing prefix for this partition (its decimal representation).
    pub fn prefix(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lazy, finite walk over partitions from `max` down to `min`.
///
/// Visits `i = max, max - 100, ...` while `i >= min` and yields
/// `Partition::from_id(i)` for each step, so the final partition is emitted
/// even when `max - min` is not a multiple of the bucket size. Once exhausted
/// (or stopped) it never yields again.
#[derive(Debug, Clone)]
pub struct PartitionEnumerator {
    next_id: Option<u64>,
    min_id: u64,
}

impl PartitionEnumerator {
    pub fn new(max_id: u64, min_id: u64) -> Self {
        let next_id = if max_id >= min_id { Some(max_id) } else { None };
        Self { next_id, min_id }
    }

    /// Stop the walk. Subsequent calls to `next()` return `None`.
    pub fn stop(&mut self) {
        self.next_id = None;
    }
}

impl Iterator for PartitionEnumerator {
    type Item = Partition;

    fn next(&mut self) -> Option<Partition> {
        let id = self.next_id?;
        self.next_id = id
            .checked_sub(BUCKET_SIZE)
            .filter(|next| *next >= self.min_id);
        Some(Partition::from_id(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next_id {
            Some(id) => ((id - self.min_id) / BUCKET_SIZE + 1) as usize,
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PartitionEnumerator {}

impl FusedIterator for PartitionEnumerator {}
