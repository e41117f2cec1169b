pub mod args;

use std::path::PathBuf;

use crate::types::AccountKey;

/// Main configuration for the blobmig-rs migration pipeline.
///
/// Holds everything a [`MigrationPipeline`](crate::MigrationPipeline) needs:
/// both storage accounts, the identifier range to walk, the worker pool and
/// queue sizes, the total job cap and the transfer agent to invoke.
///
/// # Quick Start
///
/// ```
/// use blobmig_rs::Config;
/// use blobmig_rs::types::AccountKey;
///
/// let config = Config::for_accounts(
///     ("oldarchive", AccountKey::new("c291cmNl")),
///     ("newarchive", AccountKey::new("ZGVzdA==")),
///     "archive",
/// );
/// assert_eq!(config.worker_size, 5);
/// assert_eq!(config.total, 10_000);
/// assert!(config.folder);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub source: AccountConfig,
    pub destination: AccountConfig,
    pub worker_size: u16,
    pub total: u64,
    pub max_id: u64,
    pub min_id: u64,
    pub folder: bool,
    pub job_queue_size: u32,
    pub max_results: u32,
    pub token_validity_hours: u32,
    pub transfer_program: PathBuf,
    pub dry_run: bool,
    pub show_no_progress: bool,
    pub tracing_config: Option<TracingConfig>,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

/// One side of the migration: a storage account and the container in it.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub account_name: String,
    pub container: String,
    /// Overrides `https://<account>.blob.core.windows.net`, e.g. for Azurite.
    pub endpoint_url: Option<String>,
    pub account_key: AccountKey,
}

impl AccountConfig {
    pub fn new(account_name: &str, account_key: AccountKey, container: &str) -> Self {
        Self {
            account_name: account_name.to_string(),
            container: container.to_string(),
            endpoint_url: None,
            account_key,
        }
    }
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

impl Config {
    /// Create a `Config` with the CLI defaults for the given accounts.
    ///
    /// The same container name is used on both sides.
    pub fn for_accounts(
        source: (&str, AccountKey),
        destination: (&str, AccountKey),
        container: &str,
    ) -> Self {
        Config {
            source: AccountConfig::new(source.0, source.1, container),
            destination: AccountConfig::new(destination.0, destination.1, container),
            worker_size: args::DEFAULT_WORKER_SIZE,
            total: args::DEFAULT_TOTAL,
            max_id: args::DEFAULT_MAX_ID,
            min_id: args::DEFAULT_MIN_ID,
            folder: args::DEFAULT_FOLDER,
            job_queue_size: args::DEFAULT_JOB_QUEUE_SIZE,
            max_results: args::DEFAULT_MAX_RESULTS,
            token_validity_hours: args::DEFAULT_TOKEN_VALIDITY_HOURS,
            transfer_program: PathBuf::from(args::DEFAULT_TRANSFER_PROGRAM),
            dry_run: false,
            show_no_progress: false,
            tracing_config: None,
            auto_complete_shell: None,
        }
    }
}
