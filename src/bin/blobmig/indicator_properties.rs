// Property-based tests for the progress indicator: it must finish for any
// sequence of statistics once the channel closes, and count each event once.

#[cfg(test)]
mod tests {
    use crate::indicator::show_indicator;
    use blobmig_rs::MigrationStatistics;
    use proptest::prelude::*;
    use std::time::Duration;

    fn arb_stats_sequence() -> impl Strategy<Value = Vec<MigrationStatistics>> {
        prop::collection::vec(
            prop_oneof![
                (1u64..=4800u64, 0usize..100, 0usize..100).prop_map(
                    |(partition, source_count, destination_count)| {
                        MigrationStatistics::PartitionScanned {
                            partition: partition.to_string(),
                            source_count,
                            destination_count,
                            diff_count: source_count.saturating_sub(destination_count),
                        }
                    }
                ),
                "[0-9]{1,4}/[a-z]{1,8}".prop_map(|name| MigrationStatistics::JobEnqueued { name }),
                "[0-9]{1,4}/[a-z]{1,8}"
                    .prop_map(|name| MigrationStatistics::TransferComplete { name }),
                "[0-9]{1,4}/[a-z]{1,8}".prop_map(|name| MigrationStatistics::TransferError { name }),
                "[0-9]{1,4}/[a-z]{1,8}".prop_map(|name| MigrationStatistics::TransferSkip { name }),
            ],
            0..50,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_indicator_counts_every_event(
            stats in arb_stats_sequence(),
            show_progress in proptest::bool::ANY,
            dry_run in proptest::bool::ANY,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let event_count = stats.len() as u64;

            let summary = runtime.block_on(async move {
                let (sender, receiver) = async_channel::unbounded();
                for stat in stats {
                    sender.send(stat).await.unwrap();
                }
                drop(sender);

                tokio::time::timeout(
                    Duration::from_secs(5),
                    show_indicator(receiver, show_progress, dry_run),
                )
                .await
                .expect("indicator should complete within timeout")
                .expect("indicator task should not panic")
            });

            prop_assert_eq!(
                summary.partitions_scanned
                    + summary.jobs_enqueued
                    + summary.transfers_completed
                    + summary.transfers_failed
                    + summary.transfers_skipped,
                event_count
            );
        }
    }
}
