// Displays live migration progress using indicatif and a moving average of
// transfers per second. Reads MigrationStatistics from the stats channel.

use async_channel::Receiver;
use blobmig_rs::MigrationStatistics;
use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Totals counted by [`show_indicator`] until the stats channel closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorSummary {
    pub partitions_scanned: u64,
    pub jobs_enqueued: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    pub transfers_skipped: u64,
}

impl IndicatorSummary {
    fn record(&mut self, stats: &MigrationStatistics) -> bool {
        match stats {
            MigrationStatistics::PartitionScanned { .. } => self.partitions_scanned += 1,
            MigrationStatistics::JobEnqueued { .. } => self.jobs_enqueued += 1,
            MigrationStatistics::TransferComplete { .. } => {
                self.transfers_completed += 1;
                return true;
            }
            MigrationStatistics::TransferError { .. } => self.transfers_failed += 1,
            MigrationStatistics::TransferSkip { .. } => self.transfers_skipped += 1,
        }
        false
    }
}

/// Moving average window in seconds (samples).
const MOVING_AVERAGE_PERIOD_SECS: usize = 10;

/// How often (in seconds) to refresh the progress display.
const REFRESH_INTERVAL: f32 = 1.0;

/// Spawn a background task that counts migration statistics and, if
/// `show_progress` is set, keeps a one-line progress display updated.
///
/// The task ends when `stats_receiver` is closed. The progress line is
/// cleared at that point; the summary line is printed by the caller only
/// when the run succeeded.
pub fn show_indicator(
    stats_receiver: Receiver<MigrationStatistics>,
    show_progress: bool,
    dry_run: bool,
) -> JoinHandle<IndicatorSummary> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }
    if !show_progress {
        progress_text.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_transferred_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut summary = IndicatorSummary::default();

        loop {
            let mut period_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(stats) = stats_receiver.try_recv() {
                    if summary.record(&stats) {
                        period_count += 1;
                    }
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    let elapsed = start_time.elapsed();

                    info!(
                        message = "migration summary",
                        partitions_scanned = summary.partitions_scanned,
                        jobs_enqueued = summary.jobs_enqueued,
                        transfers_completed = summary.transfers_completed,
                        transfers_failed = summary.transfers_failed,
                        transfers_skipped = summary.transfers_skipped,
                        duration_sec = elapsed.as_secs_f64(),
                    );

                    progress_text.finish_and_clear();
                    return summary;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            if !dry_run {
                ma_transferred_count.add_sample(period_count);
            }

            progress_text.set_message(format!(
                "scanned {} partitions,  enqueued {:>3} jobs,  transferred {:>3} | {:>3} transfers/sec,  failed {},  skipped {},  elapsed {}",
                summary.partitions_scanned,
                HumanCount(summary.jobs_enqueued),
                HumanCount(summary.transfers_completed),
                HumanCount(ma_transferred_count.get_average()),
                summary.transfers_failed,
                summary.transfers_skipped,
                HumanDuration(start_time.elapsed()),
            ));
        }
    })
}
