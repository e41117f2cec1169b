/*!
# Overview
blobmig-rs migrates blobs between two Azure Blob Storage accounts.
It walks a numeric identifier space partition by partition, lists both
containers, and copies only what the destination is still missing.

## Features
- **Partitioned diff**: each partition is listed on both sides and reduced
  to the source-only names, so re-running after an abort is safe
- **Bounded worker pool**: a single lister feeds N transfer workers through
  a bounded queue; a full queue stops the lister
- **Total job cap**: stop listing once enough jobs have been enqueued
- **External transfer agent**: every job is one azcopy invocation with
  account SAS signed URLs
- **Dry-run mode**: list, diff and log the commands without copying

## As a Library
The blobmig CLI is a thin wrapper over the blobmig-rs library.

Example usage
=============

```toml
[dependencies]
blobmig-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use blobmig_rs::config::args::build_config_from_args;
use blobmig_rs::{MigrationPipeline, create_pipeline_cancellation_token};

#[tokio::main]
async fn main() {
    let args = vec![
        "blobmig",
        "--source-account",
        "oldarchive",
        "--destination-account",
        "newarchive",
        "--source-container",
        "archive",
        "--source-key",
        "c291cmNlLWtleQ==",
        "--destination-key",
        "ZGVzdGluYXRpb24ta2V5",
        "--dry-run",
    ];

    let config = build_config_from_args(args).unwrap();
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = MigrationPipeline::new(config, cancellation_token)
        .await
        .unwrap();
    pipeline.close_stats_sender();
    pipeline.run().await;

    if pipeline.has_error() {
        eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
    println!("{}", pipeline.get_migration_stats());
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod completion;
pub mod config;
pub mod diff;
pub mod lister;
pub mod partition;
pub mod pipeline;
pub mod stage;
pub mod storage;
pub mod transfer;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use config::args::CLIArgs;
pub use pipeline::{MigrationPipeline, PipelineState};
pub use types::error::{MigrateError, exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
pub use types::{MigrationStatistics, MigrationStats};
