use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::config::Config;
use crate::storage::Storage;
use crate::types::token::PipelineCancellationToken;
use crate::types::{JobItem, MigrationStatistics};

/// Result of pushing a job onto the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

/// Shared context passed to the producer and each worker.
///
/// - The producer has only a `sender` (it is the queue's single writer)
/// - Workers have only a `receiver` (MPMC: all workers share one queue)
///
/// Both storages are carried so that workers can sign the two URLs of a
/// transfer and the producer can list both sides of a partition.
pub struct Stage {
    pub config: Config,
    pub source: Storage,
    pub destination: Storage,
    pub receiver: Option<Receiver<JobItem>>,
    pub sender: Option<Sender<JobItem>>,
    pub stats_sender: Sender<MigrationStatistics>,
    pub cancellation_token: PipelineCancellationToken,
}

impl Stage {
    pub fn new(
        config: Config,
        source: Storage,
        destination: Storage,
        receiver: Option<Receiver<JobItem>>,
        sender: Option<Sender<JobItem>>,
        stats_sender: Sender<MigrationStatistics>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            config,
            source,
            destination,
            receiver,
            sender,
            stats_sender,
            cancellation_token,
        }
    }

    /// Push a job onto the queue, waiting while it is full.
    ///
    /// Returns `SendResult::Closed` if the queue has been closed or the
    /// pipeline is cancelled while waiting for a free slot.
    pub async fn send(&self, job: JobItem) -> Result<SendResult> {
        let sender = self.sender.as_ref().context("stage has no job sender.")?;

        tokio::select! {
            result = sender.send(job) => {
                if let Err(e) = result {
                    return if !sender.is_closed() {
                        Err(anyhow!(e).context("async_channel::Sender::send() failed."))
                    } else {
                        Ok(SendResult::Closed)
                    };
                }
                Ok(SendResult::Success)
            }
            _ = self.cancellation_token.cancelled() => Ok(SendResult::Closed),
        }
    }

    /// Close the job queue. Workers drain what is buffered and exit.
    pub fn close_sender(&self) {
        if let Some(sender) = self.sender.as_ref() {
            sender.close();
        }
    }

    /// Send a statistics event. Dropped if nobody listens.
    pub async fn send_stats(&self, stats: MigrationStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}
