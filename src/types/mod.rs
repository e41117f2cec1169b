use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// Path separator used by hierarchical listings and folder-style names.
pub const PATH_SEPARATOR: char = '/';

/// A blob name selected for transfer.
///
/// Created by the producer from one partition's diff and handed to exactly
/// one worker. Never mutated after it has been enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobItem {
    name: String,
}

impl JobItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Folder-style names come from hierarchical listings and are copied as a
    /// whole subtree.
    pub fn is_folder(&self) -> bool {
        self.name.ends_with(PATH_SEPARATOR)
    }
}

impl Display for JobItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Statistics sent through the stats channel during pipeline execution.
#[derive(Debug, PartialEq)]
pub enum MigrationStatistics {
    PartitionScanned {
        partition: String,
        source_count: usize,
        destination_count: usize,
        diff_count: usize,
    },
    JobEnqueued { name: String },
    TransferComplete { name: String },
    TransferError { name: String },
    TransferSkip { name: String },
}

/// Point-in-time copy of the counters in [`MigrationStatsReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationStats {
    pub partitions_scanned: u64,
    pub jobs_enqueued: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub transfers_skipped: u64,
}

impl Display for MigrationStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} partitions scanned, {} jobs enqueued, {} transfers completed, {} transfers failed",
            self.partitions_scanned,
            self.jobs_enqueued,
            self.transfers_completed,
            self.transfers_failed
        )?;
        if self.transfers_skipped > 0 {
            write!(f, ", {} transfers skipped", self.transfers_skipped)?;
        }
        Ok(())
    }
}

/// Run-wide counters shared by the producer and all workers.
#[derive(Debug, Default)]
pub struct MigrationStatsReport {
    partitions_scanned: AtomicU64,
    jobs_enqueued: AtomicU64,
    transfers_completed: AtomicU64,
    transfers_failed: AtomicU64,
    transfers_skipped: AtomicU64,
}

impl MigrationStatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_partitions_scanned(&self) {
        self.partitions_scanned.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_jobs_enqueued(&self) {
        self.jobs_enqueued.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_transfers_completed(&self) {
        self.transfers_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_transfers_failed(&self) {
        self.transfers_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_transfers_skipped(&self) {
        self.transfers_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MigrationStats {
        MigrationStats {
            partitions_scanned: self.partitions_scanned.load(Ordering::SeqCst),
            jobs_enqueued: self.jobs_enqueued.load(Ordering::SeqCst),
            transfers_completed: self.transfers_completed.load(Ordering::SeqCst),
            transfers_failed: self.transfers_failed.load(Ordering::SeqCst),
            transfers_skipped: self.transfers_skipped.load(Ordering::SeqCst),
        }
    }
}

/// Storage account shared key with secure zeroization.
///
/// The key is the base64 string shown in the Azure portal. It is cleared from
/// memory when dropped and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccountKey {
    key: String,
}

impl AccountKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn expose_secret(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl Debug for AccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("key", &"** redacted **")
            .finish()
    }
}
