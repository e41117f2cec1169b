//! Completion tracking for the worker pool.
//!
//! Every worker owns one clone of the exit [`Sender`]. A worker reports a
//! [`WorkerExit`] when its loop ends and then drops its sender. The tracker
//! counts reports until the last sender is gone, which happens exactly when
//! every worker has exited, and then fires a one-shot signal.

use async_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Sent by a worker when it leaves its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub worker_index: u16,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub transfers_skipped: u64,
}

/// Delivered once to the orchestrator after all workers have exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionReport {
    pub expected_workers: u16,
    pub exited_workers: u16,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub transfers_skipped: u64,
}

impl CompletionReport {
    /// False if some worker went away without reporting (it panicked).
    pub fn all_workers_reported(&self) -> bool {
        self.exited_workers == self.expected_workers
    }
}

/// Counts worker exits until every exit sender has been dropped.
#[derive(Debug)]
pub struct CompletionTracker {
    expected_workers: u16,
    receiver: Receiver<WorkerExit>,
}

/// Create the exit channel for `expected_workers` workers.
///
/// The returned sender must be cloned once per worker and then dropped by
/// the caller, otherwise the tracker never finishes.
pub fn completion_channel(expected_workers: u16) -> (Sender<WorkerExit>, CompletionTracker) {
    let (sender, receiver) = async_channel::unbounded();
    (
        sender,
        CompletionTracker {
            expected_workers,
            receiver,
        },
    )
}

impl CompletionTracker {
    /// Wait for all workers and fire `signal`.
    ///
    /// Consumes the tracker, so the signal fires at most once. If the
    /// orchestrator stopped waiting, the report is dropped.
    pub async fn track(self, signal: oneshot::Sender<CompletionReport>) {
        let mut report = CompletionReport {
            expected_workers: self.expected_workers,
            ..Default::default()
        };

        while let Ok(exit) = self.receiver.recv().await {
            report.exited_workers += 1;
            report.transfers_completed += exit.transfers_completed;
            report.transfers_failed += exit.transfers_failed;
            report.transfers_skipped += exit.transfers_skipped;
            debug!(
                worker_index = exit.worker_index,
                exited_workers = report.exited_workers,
                expected_workers = report.expected_workers,
                "worker exit reported."
            );
        }

        if !report.all_workers_reported() {
            warn!(
                exited_workers = report.exited_workers,
                expected_workers = report.expected_workers,
                "some workers exited without reporting."
            );
        }

        let _ = signal.send(report);
    }
}
