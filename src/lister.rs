use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, trace};

use crate::diff::diff;
use crate::partition::{Partition, PartitionEnumerator};
use crate::stage::{SendResult, Stage};
use crate::types::error::is_cancelled_error;
use crate::types::{JobItem, MigrationStatistics, MigrationStatsReport};

/// Why the producer stopped enqueuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerOutcome {
    /// Every partition down to the minimum id was scanned.
    Exhausted,
    /// The total job cap was reached; no further partitions were listed.
    CapReached,
    /// The pipeline was cancelled or the queue closed underneath us.
    Cancelled,
}

enum EnqueueResult {
    Sent,
    CapReached,
    Closed,
}

/// The single producer of the migration pipeline.
///
/// Walks partitions from `max_id` down to `min_id`, lists both containers for
/// each one, and pushes the source-only names onto the job queue. The push
/// waits while the queue is full, which is the only backpressure in the
/// pipeline.
///
/// ```text
/// PartitionLister → [job queue] → TransferWorker × N → CompletionTracker
/// ```
pub struct PartitionLister {
    stage: Stage,
    stats_report: Arc<MigrationStatsReport>,
    enqueued: u64,
}

impl PartitionLister {
    pub fn new(stage: Stage, stats_report: Arc<MigrationStatsReport>) -> Self {
        Self {
            stage,
            stats_report,
            enqueued: 0,
        }
    }

    /// Enumerate partitions and enqueue their diff.
    ///
    /// Any listing failure is returned as an error. The queue is closed when
    /// this returns, whatever the outcome.
    pub async fn list_partitions(mut self) -> Result<ProducerOutcome> {
        debug!(
            max_id = self.stage.config.max_id,
            min_id = self.stage.config.min_id,
            total = self.stage.config.total,
            "partition listing has started."
        );

        let result = self.enqueue_partitions().await;
        self.stage.close_sender();

        match result {
            Ok(outcome) => {
                debug!(
                    outcome = ?outcome,
                    enqueued = self.enqueued,
                    "partition listing has been completed."
                );
                Ok(outcome)
            }
            Err(e) if is_cancelled_error(&e) => {
                info!("partition listing has been cancelled.");
                Ok(ProducerOutcome::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    async fn enqueue_partitions(&mut self) -> Result<ProducerOutcome> {
        if self.stage.config.total == 0 {
            info!("total job count is zero. nothing to list.");
            return Ok(ProducerOutcome::CapReached);
        }

        let mut partitions =
            PartitionEnumerator::new(self.stage.config.max_id, self.stage.config.min_id);

        while let Some(partition) = partitions.next() {
            if self.stage.cancellation_token.is_cancelled() {
                return Ok(ProducerOutcome::Cancelled);
            }

            let jobs = self.diff_partition(partition).await?;

            for name in jobs {
                match self.enqueue(JobItem::new(name)).await? {
                    EnqueueResult::Sent => {}
                    EnqueueResult::CapReached => {
                        partitions.stop();
                        info!(
                            total = self.stage.config.total,
                            partition = %partition,
                            "total job count reached. stop listing."
                        );
                        return Ok(ProducerOutcome::CapReached);
                    }
                    EnqueueResult::Closed => return Ok(ProducerOutcome::Cancelled),
                }
            }
        }

        Ok(ProducerOutcome::Exhausted)
    }

    async fn diff_partition(&self, partition: Partition) -> Result<Vec<String>> {
        let prefix = partition.prefix();
        let hierarchical = self.stage.config.folder;

        let source_names = self
            .stage
            .source
            .list_names(&prefix, hierarchical)
            .await
            .with_context(|| {
                format!(
                    "failed to list {}/{} partition {prefix}.",
                    self.stage.source.account_name(),
                    self.stage.source.container_name()
                )
            })?;
        let destination_names = self
            .stage
            .destination
            .list_names(&prefix, hierarchical)
            .await
            .with_context(|| {
                format!(
                    "failed to list {}/{} partition {prefix}.",
                    self.stage.destination.account_name(),
                    self.stage.destination.container_name()
                )
            })?;

        let source_count = source_names.len();
        let destination_count = destination_names.len();
        let jobs = diff(source_names, &destination_names);

        self.stats_report.increment_partitions_scanned();
        self.stage
            .send_stats(MigrationStatistics::PartitionScanned {
                partition: prefix.clone(),
                source_count,
                destination_count,
                diff_count: jobs.len(),
            })
            .await;

        info!(
            partition = %prefix,
            source_count,
            destination_count,
            diff_count = jobs.len(),
            "partition scanned."
        );

        Ok(jobs)
    }

    /// Push one job, then check the cap.
    async fn enqueue(&mut self, job: JobItem) -> Result<EnqueueResult> {
        let name = job.name().to_string();

        if self.stage.send(job).await? == SendResult::Closed {
            return Ok(EnqueueResult::Closed);
        }

        self.enqueued += 1;
        self.stats_report.increment_jobs_enqueued();
        self.stage
            .send_stats(MigrationStatistics::JobEnqueued { name: name.clone() })
            .await;
        trace!(name = %name, enqueued = self.enqueued, "job enqueued.");

        if self.enqueued >= self.stage.config.total {
            return Ok(EnqueueResult::CapReached);
        }
        Ok(EnqueueResult::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_utils::{MockStorage, init_dummy_tracing_subscriber, make_test_config};
    use crate::types::error::MigrateError;
    use crate::types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
    use async_channel::Receiver;

    struct Fixture {
        lister: PartitionLister,
        receiver: Receiver<JobItem>,
        stats_report: Arc<MigrationStatsReport>,
        cancellation_token: PipelineCancellationToken,
    }

    fn fixture(
        config: Config,
        source: MockStorage,
        destination: MockStorage,
        queue_size: usize,
    ) -> Fixture {
        let (sender, receiver) = async_channel::bounded(queue_size);
        let (stats_sender, _) = async_channel::unbounded();
        let cancellation_token = create_pipeline_cancellation_token();
        let stats_report = Arc::new(MigrationStatsReport::new());

        let stage = Stage::new(
            config,
            Box::new(source),
            Box::new(destination),
            None,
            Some(sender),
            stats_sender,
            cancellation_token.clone(),
        );

        Fixture {
            lister: PartitionLister::new(stage, stats_report.clone()),
            receiver,
            stats_report,
            cancellation_token,
        }
    }

    fn config(max_id: u64, min_id: u64, total: u64) -> Config {
        let mut config = make_test_config();
        config.max_id = max_id;
        config.min_id = min_id;
        config.total = total;
        config
    }

    async fn drain(receiver: &Receiver<JobItem>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(job) = receiver.recv().await {
            names.push(job.name().to_string());
        }
        names
    }

    #[tokio::test]
    async fn enqueues_diff_in_partition_order() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive")
            .with_names("2", &["2/c"])
            .with_names("1", &["1/a", "1/b"]);
        let destination = MockStorage::new("newarchive", "archive").with_names("1", &["1/a"]);

        let f = fixture(config(250, 100, 10), source.clone(), destination.clone(), 10);
        let outcome = f.lister.list_partitions().await.unwrap();

        assert_eq!(outcome, ProducerOutcome::Exhausted);
        assert_eq!(drain(&f.receiver).await, vec!["2/c", "1/b"]);
        assert_eq!(source.listed_prefixes(), vec!["2", "1"]);
        assert_eq!(destination.listed_prefixes(), vec!["2", "1"]);
        assert_eq!(f.stats_report.snapshot().partitions_scanned, 2);
        assert_eq!(f.stats_report.snapshot().jobs_enqueued, 2);
    }

    #[tokio::test]
    async fn cap_stops_listing_further_partitions() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive")
            .with_names("3", &["3/a", "3/b", "3/c"])
            .with_names("2", &["2/a"]);
        let destination = MockStorage::new("newarchive", "archive");

        let f = fixture(config(300, 100, 2), source.clone(), destination, 10);
        let outcome = f.lister.list_partitions().await.unwrap();

        assert_eq!(outcome, ProducerOutcome::CapReached);
        assert_eq!(drain(&f.receiver).await, vec!["3/a", "3/b"]);
        assert_eq!(source.listed_prefixes(), vec!["3"]);
        assert_eq!(f.stats_report.snapshot().jobs_enqueued, 2);
    }

    #[tokio::test]
    async fn cap_reached_on_last_job_of_a_partition() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive")
            .with_names("2", &["2/a"])
            .with_names("1", &["1/a"]);
        let destination = MockStorage::new("newarchive", "archive");

        let f = fixture(config(200, 100, 1), source.clone(), destination, 10);

        assert_eq!(
            f.lister.list_partitions().await.unwrap(),
            ProducerOutcome::CapReached
        );
        assert_eq!(source.listed_prefixes(), vec!["2"]);
    }

    #[tokio::test]
    async fn zero_total_enqueues_nothing() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive").with_names("1", &["1/a"]);
        let destination = MockStorage::new("newarchive", "archive");

        let f = fixture(config(100, 100, 0), source.clone(), destination.clone(), 10);

        assert_eq!(
            f.lister.list_partitions().await.unwrap(),
            ProducerOutcome::CapReached
        );
        assert!(drain(&f.receiver).await.is_empty());
        assert!(source.listed_prefixes().is_empty());
        assert!(destination.listed_prefixes().is_empty());
        assert_eq!(f.stats_report.snapshot().jobs_enqueued, 0);
    }

    #[tokio::test]
    async fn uses_folder_toggle_for_listing_mode() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive");
        let destination = MockStorage::new("newarchive", "archive");

        let mut config = config(100, 100, 10);
        config.folder = false;
        let f = fixture(config, source.clone(), destination.clone(), 10);
        f.lister.list_partitions().await.unwrap();

        assert_eq!(source.listed_hierarchical(), vec![false]);
        assert_eq!(destination.listed_hierarchical(), vec![false]);
    }

    #[tokio::test]
    async fn inverted_range_lists_nothing() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive");
        let f = fixture(
            config(100, 200, 10),
            source.clone(),
            MockStorage::new("newarchive", "archive"),
            10,
        );

        assert_eq!(
            f.lister.list_partitions().await.unwrap(),
            ProducerOutcome::Exhausted
        );
        assert!(source.listed_prefixes().is_empty());
        assert!(f.receiver.is_closed());
    }

    #[tokio::test]
    async fn listing_error_is_returned_and_queue_closed() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive")
            .with_names("2", &["2/a"])
            .failing_on("1");

        let f = fixture(
            config(200, 100, 10),
            source,
            MockStorage::new("newarchive", "archive"),
            10,
        );
        let err = f.lister.list_partitions().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MigrateError>(),
            Some(MigrateError::Listing(_))
        ));
        assert!(err.to_string().contains("partition 1"));
        assert_eq!(drain(&f.receiver).await, vec!["2/a"]);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        init_dummy_tracing_subscriber();

        let source = MockStorage::new("oldarchive", "archive").with_names("1", &["1/a"]);
        let f = fixture(
            config(100, 100, 10),
            source.clone(),
            MockStorage::new("newarchive", "archive"),
            10,
        );
        f.cancellation_token.cancel();

        assert_eq!(
            f.lister.list_partitions().await.unwrap(),
            ProducerOutcome::Cancelled
        );
        assert!(source.listed_prefixes().is_empty());
    }

    #[tokio::test]
    async fn blocked_push_waits_for_a_free_slot() {
        init_dummy_tracing_subscriber();

        let source =
            MockStorage::new("oldarchive", "archive").with_names("1", &["1/a", "1/b", "1/c"]);
        let f = fixture(
            config(100, 100, 10),
            source,
            MockStorage::new("newarchive", "archive"),
            1,
        );

        let stats_report = f.stats_report.clone();
        let handle = tokio::spawn(f.lister.list_partitions());

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(stats_report.snapshot().jobs_enqueued, 1);
        assert!(!handle.is_finished());

        assert_eq!(f.receiver.recv().await.unwrap().name(), "1/a");
        assert_eq!(drain(&f.receiver).await, vec!["1/b", "1/c"]);
        assert_eq!(handle.await.unwrap().unwrap(), ProducerOutcome::Exhausted);
    }
}
