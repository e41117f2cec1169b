//! Migration pipeline orchestrator.
//!
//! Creates and connects the pipeline stages:
//!
//! ```text
//! PartitionLister → [bounded job queue] → TransferWorker × N → CompletionTracker
//! ```
//!
//! The lister is the only producer. Workers share one MPMC queue. Each worker
//! owns a sender of the completion channel; the tracker fires a one-shot
//! signal once every sender has been dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::completion::{CompletionReport, WorkerExit, completion_channel};
use crate::config::Config;
use crate::lister::{PartitionLister, ProducerOutcome};
use crate::stage::Stage;
use crate::storage::{self, Storage};
use crate::transfer::{DryRunInvoker, ProcessInvoker, TransferInvoker};
use crate::types::error::{MigrateError, is_container_already_exists_error};
use crate::types::token::PipelineCancellationToken;
use crate::types::{JobItem, MigrationStatistics, MigrationStats, MigrationStatsReport};
use crate::worker::TransferWorker;

/// Orchestrator states, in the order a run passes through them.
///
/// `EarlyStop` is entered only when the total job cap is reached and is
/// immediately followed by `QueueClosed`. `Aborted` is terminal and replaces
/// the remaining states after a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Enumerating,
    EarlyStop,
    QueueClosed,
    AwaitingCompletion,
    Done,
    Aborted,
}

/// The core migration pipeline orchestrator.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// # use blobmig_rs::{Config, MigrationPipeline, create_pipeline_cancellation_token};
/// # let config: Config = todo!();
/// let cancellation_token = create_pipeline_cancellation_token();
/// let mut pipeline = MigrationPipeline::new(config, cancellation_token).await?;
/// pipeline.close_stats_sender();
/// pipeline.run().await;
/// if pipeline.has_error() {
///     eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
/// }
/// println!("{}", pipeline.get_migration_stats());
/// # Ok(())
/// # }
/// ```
pub struct MigrationPipeline {
    config: Config,
    source: Storage,
    destination: Storage,
    invoker: Arc<dyn TransferInvoker>,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<MigrationStatistics>,
    stats_receiver: Receiver<MigrationStatistics>,
    has_error: Arc<AtomicBool>,
    has_panic: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    ready: bool,
    states: Vec<PipelineState>,
    producer_outcome: Option<ProducerOutcome>,
    completion_report: Option<CompletionReport>,
    migration_stats_report: Arc<MigrationStatsReport>,
}

impl MigrationPipeline {
    /// Create a new MigrationPipeline.
    ///
    /// Signs access tokens for both accounts and picks the transfer agent:
    /// the external program, or a logging stand-in in dry-run mode.
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Result<Self> {
        let source = storage::create_storage(
            &config,
            config.source.clone(),
            cancellation_token.clone(),
        )
        .await?;
        let destination = storage::create_storage(
            &config,
            config.destination.clone(),
            cancellation_token.clone(),
        )
        .await?;

        let invoker: Arc<dyn TransferInvoker> = if config.dry_run {
            Arc::new(DryRunInvoker)
        } else {
            Arc::new(ProcessInvoker::new())
        };

        Ok(Self::with_components(
            config,
            source,
            destination,
            invoker,
            cancellation_token,
        ))
    }

    /// Create a pipeline from already built storages and transfer agent.
    pub fn with_components(
        config: Config,
        source: Storage,
        destination: Storage,
        invoker: Arc<dyn TransferInvoker>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        Self {
            config,
            source,
            destination,
            invoker,
            cancellation_token,
            stats_sender,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            has_panic: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            ready: true,
            states: vec![PipelineState::Init],
            producer_outcome: None,
            completion_report: None,
            migration_stats_report: Arc::new(MigrationStatsReport::new()),
        }
    }

    /// Run the migration pipeline.
    ///
    /// 1. Ensure the destination container exists
    /// 2. Start the workers and the completion tracker
    /// 3. Enumerate partitions and enqueue their diff
    /// 4. Close the queue and wait for the completion signal
    ///
    /// A fatal error cancels the pipeline token and ends the run in
    /// [`PipelineState::Aborted`] without waiting for running transfers.
    pub async fn run(&mut self) {
        assert!(self.ready, "MigrationPipeline::run() called more than once");
        self.ready = false;

        if let Err(e) = self.ensure_destination_container().await {
            self.record_error(e);
            self.abort();
            self.shutdown();
            return;
        }

        self.execute_pipeline().await;

        self.shutdown();
    }

    /// Check if any error occurred during the pipeline execution.
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    /// Check if any spawned task panicked during the pipeline execution.
    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    /// Consume and return all accumulated errors.
    ///
    /// Returns `None` if no errors occurred.
    pub fn get_errors_and_consume(&self) -> Option<Vec<anyhow::Error>> {
        if !self.has_error() {
            return None;
        }
        let mut error_list = self.errors.lock().unwrap();
        let mut errors = Vec::with_capacity(error_list.len());
        while let Some(e) = error_list.pop_front() {
            errors.push(e);
        }
        Some(errors)
    }

    /// Current orchestrator state.
    pub fn state(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Init)
    }

    /// Every state the pipeline has been in, oldest first.
    pub fn state_history(&self) -> &[PipelineState] {
        &self.states
    }

    /// Why the lister stopped. `None` before the lister finished or if it failed.
    pub fn producer_outcome(&self) -> Option<ProducerOutcome> {
        self.producer_outcome
    }

    /// Worker totals delivered by the completion signal.
    pub fn completion_report(&self) -> Option<CompletionReport> {
        self.completion_report
    }

    /// Get the stats receiver for progress reporting.
    pub fn get_stats_receiver(&self) -> Receiver<MigrationStatistics> {
        self.stats_receiver.clone()
    }

    /// Get a snapshot of the current migration statistics.
    pub fn get_migration_stats(&self) -> MigrationStats {
        self.migration_stats_report.snapshot()
    }

    /// Close the stats sender to signal the progress reporter to finish.
    ///
    /// Call this before `run()` if you don't need progress reporting.
    pub fn close_stats_sender(&self) {
        self.stats_sender.close();
    }

    // -----------------------------------------------------------------------
    // Internal methods
    // -----------------------------------------------------------------------

    /// Create the destination container. An existing container is fine.
    async fn ensure_destination_container(&self) -> Result<()> {
        if self.invoker.is_dry_run() {
            info!(
                account = self.destination.account_name(),
                container = self.destination.container_name(),
                "[dry-run] destination container creation skipped."
            );
            return Ok(());
        }

        match self.destination.create_container().await {
            Ok(()) => {
                info!(
                    account = self.destination.account_name(),
                    container = self.destination.container_name(),
                    "destination container created."
                );
                Ok(())
            }
            Err(e) if is_container_already_exists_error(&e) => {
                info!(
                    account = self.destination.account_name(),
                    container = self.destination.container_name(),
                    "destination container already exists."
                );
                Ok(())
            }
            Err(e) => Err(e.context(format!(
                "failed to create destination container {}/{}.",
                self.destination.account_name(),
                self.destination.container_name()
            ))),
        }
    }

    async fn execute_pipeline(&mut self) {
        let (job_sender, job_receiver) =
            async_channel::bounded::<JobItem>(self.config.job_queue_size as usize);
        let (exit_sender, tracker) = completion_channel(self.config.worker_size);
        let (completion_signal, completed) = oneshot::channel();

        tokio::spawn(tracker.track(completion_signal));
        self.spawn_workers(job_receiver, exit_sender);

        self.transition(PipelineState::Enumerating);
        let producer_handle = self.list_partitions(job_sender);

        let outcome = match producer_handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.has_panic.store(true, Ordering::SeqCst);
                self.record_error(anyhow!(MigrateError::Pipeline(format!(
                    "partition lister supervisor panicked: {e}"
                ))));
                None
            }
        };

        let Some(outcome) = outcome else {
            self.abort();
            return;
        };
        self.producer_outcome = Some(outcome);

        if outcome == ProducerOutcome::CapReached {
            self.transition(PipelineState::EarlyStop);
        }
        self.transition(PipelineState::QueueClosed);

        self.transition(PipelineState::AwaitingCompletion);
        match completed.await {
            Ok(report) => {
                debug!(
                    exited_workers = report.exited_workers,
                    transfers_completed = report.transfers_completed,
                    transfers_failed = report.transfers_failed,
                    "all transfer workers have exited."
                );
                self.completion_report = Some(report);
                self.transition(PipelineState::Done);
            }
            Err(_) => {
                self.record_error(anyhow!(MigrateError::Pipeline(
                    "completion signal was dropped.".to_string()
                )));
                self.abort();
            }
        }
    }

    fn transition(&mut self, state: PipelineState) {
        debug!(from = ?self.state(), to = ?state, "pipeline state changed.");
        self.states.push(state);
    }

    fn abort(&mut self) {
        self.cancellation_token.cancel();
        self.transition(PipelineState::Aborted);
        warn!("migration has been aborted.");
    }

    /// Record an error and set the error flag.
    fn record_error(&self, error: anyhow::Error) {
        error!(error = format!("{error:#}"), "fatal pipeline error.");
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }

    fn shutdown(&self) {
        self.close_stats_sender();
    }

    fn create_stage(
        &self,
        receiver: Option<Receiver<JobItem>>,
        sender: Option<Sender<JobItem>>,
    ) -> Stage {
        Stage::new(
            self.config.clone(),
            dyn_clone::clone_box(&*self.source),
            dyn_clone::clone_box(&*self.destination),
            receiver,
            sender,
            self.stats_sender.clone(),
            self.cancellation_token.clone(),
        )
    }

    /// Spawn the single producer.
    ///
    /// Uses the double-spawn pattern so a panic is recorded instead of lost.
    /// The supervisor yields `None` if the lister failed.
    fn list_partitions(&self, sender: Sender<JobItem>) -> JoinHandle<Option<ProducerOutcome>> {
        let stage = self.create_stage(None, Some(sender));
        let lister = PartitionLister::new(stage, self.migration_stats_report.clone());

        let has_error = self.has_error.clone();
        let has_panic = self.has_panic.clone();
        let error_list = self.errors.clone();
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let join_result = tokio::spawn(async move { lister.list_partitions().await }).await;

            match join_result {
                Ok(Ok(outcome)) => {
                    debug!(outcome = ?outcome, "partition lister completed successfully.");
                    Some(outcome)
                }
                Ok(Err(e)) => {
                    cancellation_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    error!(error = format!("{e:#}"), "partition lister failed.");
                    error_list.lock().unwrap().push_back(e);
                    None
                }
                Err(e) => {
                    cancellation_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    has_panic.store(true, Ordering::SeqCst);
                    error!("partition lister task panicked: {}", e);
                    error_list
                        .lock()
                        .unwrap()
                        .push_back(anyhow!(MigrateError::Pipeline(format!(
                            "partition lister task panicked: {e}"
                        ))));
                    None
                }
            }
        })
    }

    /// Spawn the worker pool.
    ///
    /// Each worker gets its own clone of `exit_sender`; the original is
    /// dropped here so the tracker finishes when the last worker is gone.
    fn spawn_workers(&self, job_receiver: Receiver<JobItem>, exit_sender: Sender<WorkerExit>) {
        for worker_index in 0..self.config.worker_size {
            let stage = self.create_stage(Some(job_receiver.clone()), None);
            let worker = TransferWorker::new(
                stage,
                worker_index,
                self.invoker.clone(),
                self.migration_stats_report.clone(),
                exit_sender.clone(),
            );

            let has_error = self.has_error.clone();
            let has_panic = self.has_panic.clone();
            let error_list = self.errors.clone();
            let cancellation_token = self.cancellation_token.clone();

            tokio::spawn(async move {
                let join_result = tokio::spawn(async move { worker.transfer().await }).await;

                match join_result {
                    Ok(Ok(())) => {
                        debug!(worker_index, "transfer worker completed successfully.");
                    }
                    Ok(Err(e)) => {
                        cancellation_token.cancel();
                        has_error.store(true, Ordering::SeqCst);
                        error!(worker_index, error = format!("{e:#}"), "transfer worker failed.");
                        error_list.lock().unwrap().push_back(e);
                    }
                    Err(e) => {
                        cancellation_token.cancel();
                        has_error.store(true, Ordering::SeqCst);
                        has_panic.store(true, Ordering::SeqCst);
                        error!(worker_index, "transfer worker task panicked: {}", e);
                        error_list
                            .lock()
                            .unwrap()
                            .push_back(anyhow!(MigrateError::Pipeline(format!(
                                "transfer worker panicked: {e}"
                            ))));
                    }
                }
            });
        }
    }
}
