use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use tracing::{debug, error, info, trace};

use crate::completion::WorkerExit;
use crate::stage::Stage;
use crate::transfer::{TransferCommand, TransferInvoker};
use crate::types::{JobItem, MigrationStatistics, MigrationStatsReport};

/// Pipeline worker that takes jobs off the shared queue and runs one
/// transfer per job.
///
/// A failed transfer is logged and dropped; the worker moves on to the next
/// job. The loop ends when the queue is closed and drained, or when the
/// pipeline is cancelled. Either way the worker reports a [`WorkerExit`]
/// before it goes away.
pub struct TransferWorker {
    worker_index: u16,
    base: Stage,
    invoker: Arc<dyn TransferInvoker>,
    stats_report: Arc<MigrationStatsReport>,
    exit_sender: Sender<WorkerExit>,
    transfers_completed: u64,
    transfers_failed: u64,
    transfers_skipped: u64,
}

impl TransferWorker {
    pub fn new(
        base: Stage,
        worker_index: u16,
        invoker: Arc<dyn TransferInvoker>,
        stats_report: Arc<MigrationStatsReport>,
        exit_sender: Sender<WorkerExit>,
    ) -> Self {
        Self {
            worker_index,
            base,
            invoker,
            stats_report,
            exit_sender,
            transfers_completed: 0,
            transfers_failed: 0,
            transfers_skipped: 0,
        }
    }

    /// Main entry point: receive jobs until the queue is drained.
    pub async fn transfer(mut self) -> Result<()> {
        debug!(worker_index = self.worker_index, "transfer worker started.");

        let result = self.receive_and_transfer().await;

        let exit = WorkerExit {
            worker_index: self.worker_index,
            transfers_completed: self.transfers_completed,
            transfers_failed: self.transfers_failed,
            transfers_skipped: self.transfers_skipped,
        };
        if self.exit_sender.send(exit).await.is_err() {
            debug!(
                worker_index = self.worker_index,
                "completion tracker is gone. exit not reported."
            );
        }

        result
    }

    async fn receive_and_transfer(&mut self) -> Result<()> {
        let receiver = self
            .base
            .receiver
            .clone()
            .context("transfer worker has no job receiver.")?;

        loop {
            tokio::select! {
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(job) => {
                            self.process_job(job).await;
                        },
                        Err(_) => {
                            // closed and drained
                            debug!(worker_index = self.worker_index, "transfer worker has been completed.");
                            break;
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "transfer worker has been cancelled.");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn process_job(&mut self, job: JobItem) {
        let name = job.name().to_string();

        match self.run_transfer(&job).await {
            Ok(output) => {
                if self.invoker.is_dry_run() {
                    self.transfers_skipped += 1;
                    self.stats_report.increment_transfers_skipped();
                    info!(
                        worker_index = self.worker_index,
                        name = %name,
                        "transfer skipped (dry-run)."
                    );
                    self.base
                        .send_stats(MigrationStatistics::TransferSkip { name })
                        .await;
                    return;
                }

                self.transfers_completed += 1;
                self.stats_report.increment_transfers_completed();
                info!(
                    worker_index = self.worker_index,
                    name = %name,
                    "transfer completed."
                );
                trace!(worker_index = self.worker_index, output = %output, "transfer output.");
                self.base
                    .send_stats(MigrationStatistics::TransferComplete { name })
                    .await;
            }
            Err(e) => {
                self.transfers_failed += 1;
                self.stats_report.increment_transfers_failed();

                error!(
                    worker_index = self.worker_index,
                    name = %name,
                    error = format!("{e:#}"),
                    "transfer failed. job dropped."
                );
                self.base
                    .send_stats(MigrationStatistics::TransferError { name })
                    .await;
            }
        }
    }

    async fn run_transfer(&self, job: &JobItem) -> Result<String> {
        let command = TransferCommand::build(
            &self.base.config.transfer_program,
            job,
            &*self.base.source,
            &*self.base.destination,
        )?;
        debug!(
            worker_index = self.worker_index,
            command = %command.redacted(),
            "invoking transfer agent."
        );

        self.invoker.invoke(&command).await
    }
}
