use crate::config::{AccountConfig, Config, TracingConfig};
use crate::types::AccountKey;
use crate::types::error::MigrateError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::PathBuf;

mod value_parser;


use value_parser::storage_name::{check_account_name, check_container_name};
use value_parser::url::check_endpoint_url;

// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

pub(crate) const DEFAULT_WORKER_SIZE: u16 = 5;
pub(crate) const DEFAULT_TOTAL: u64 = 10_000;
pub(crate) const DEFAULT_MAX_ID: u64 = 480_000;
pub(crate) const DEFAULT_MIN_ID: u64 = 100;
pub(crate) const DEFAULT_FOLDER: bool = true;
pub(crate) const DEFAULT_JOB_QUEUE_SIZE: u32 = 10;
pub(crate) const DEFAULT_MAX_RESULTS: u32 = 100;
pub(crate) const DEFAULT_TOKEN_VALIDITY_HOURS: u32 = 48;
pub(crate) const DEFAULT_TRANSFER_PROGRAM: &str = "azcopy";
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;

const MAX_RESULTS_LIMIT: u32 = 5000;

const SOURCE_KEY_ENV: &str = "AZURE_SOURCE_KEY";
const DESTINATION_KEY_ENV: &str = "AZURE_DIST_KEY";

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_INVALID_KEY: &str = "Storage account key must be base64 encoded";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_TOTAL_ZERO: &str = "Total must be at least 1.";
const ERROR_MESSAGE_ID_RANGE: &str = "Max id must be greater than or equal to min id.";
const ERROR_MESSAGE_JOB_QUEUE_SIZE_ZERO: &str = "Job queue size must be at least 1.";
const ERROR_MESSAGE_MAX_RESULTS_OUT_OF_RANGE: &str = "Max results must be between 1 and 5000.";
const ERROR_MESSAGE_TOKEN_VALIDITY_ZERO: &str = "Token validity hours must be at least 1.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// blobmig - Partitioned blob container migration driven by azcopy.
///
/// Walks numeric folder partitions from --max-id down to --min-id, copies
/// every entry missing from the destination container and stops after
/// --total jobs have been queued.
///
/// Example:
///   AZURE_SOURCE_KEY=... AZURE_DIST_KEY=... blobmig \
///     --source-account oldarchive --destination-account newarchive \
///     --source-container archive --dry-run
#[derive(Parser, Clone, Debug)]
#[command(name = "blobmig", version, about, long_about = None)]
pub struct CLIArgs {
    // -----------------------------------------------------------------------
    // Source options
    // -----------------------------------------------------------------------
    /// Source storage account name.
    #[arg(
        long,
        env,
        value_parser = check_account_name,
        default_value_if("auto_complete_shell", clap::builder::ArgPredicate::IsPresent, "ignored"),
        required = false,
        required_unless_present = "auto_complete_shell",
        help_heading = "Source"
    )]
    pub source_account: String,

    /// Source container name.
    #[arg(
        long,
        env,
        value_parser = check_container_name,
        default_value_if("auto_complete_shell", clap::builder::ArgPredicate::IsPresent, "ignored"),
        required = false,
        required_unless_present = "auto_complete_shell",
        help_heading = "Source"
    )]
    pub source_container: String,

    /// Source blob service endpoint. Default: https://<account>.blob.core.windows.net
    #[arg(long, env, value_parser = check_endpoint_url, help_heading = "Source")]
    pub source_endpoint_url: Option<String>,

    /// Source storage account key (base64).
    #[arg(
        long,
        env = SOURCE_KEY_ENV,
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new(),
        help_heading = "Source"
    )]
    pub source_key: Option<String>,

    // -----------------------------------------------------------------------
    // Destination options
    // -----------------------------------------------------------------------
    /// Destination storage account name.
    #[arg(
        long,
        env,
        value_parser = check_account_name,
        default_value_if("auto_complete_shell", clap::builder::ArgPredicate::IsPresent, "ignored"),
        required = false,
        required_unless_present = "auto_complete_shell",
        help_heading = "Destination"
    )]
    pub destination_account: String,

    /// Destination container name. Default: same as --source-container
    #[arg(long, env, value_parser = check_container_name, help_heading = "Destination")]
    pub destination_container: Option<String>,

    /// Destination blob service endpoint. Default: https://<account>.blob.core.windows.net
    #[arg(long, env, value_parser = check_endpoint_url, help_heading = "Destination")]
    pub destination_endpoint_url: Option<String>,

    /// Destination storage account key (base64).
    #[arg(
        long,
        env = DESTINATION_KEY_ENV,
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new(),
        help_heading = "Destination"
    )]
    pub destination_key: Option<String>,

    // -----------------------------------------------------------------------
    // Migration options
    // -----------------------------------------------------------------------
    /// Highest blob identifier to migrate. Partitions are walked downwards from here.
    #[arg(long, env, visible_alias = "max", default_value_t = DEFAULT_MAX_ID, help_heading = "Migration")]
    pub max_id: u64,

    /// Lowest blob identifier to migrate.
    #[arg(long, env, visible_alias = "min", default_value_t = DEFAULT_MIN_ID, help_heading = "Migration")]
    pub min_id: u64,

    /// Stop enumerating after this many jobs have been queued.
    #[arg(long, env, default_value_t = DEFAULT_TOTAL, help_heading = "Migration")]
    pub total: u64,

    /// Compare folder-level prefixes (true) or individual blobs (false).
    #[arg(
        long,
        env,
        default_value_t = DEFAULT_FOLDER,
        action = clap::ArgAction::Set,
        help_heading = "Migration"
    )]
    pub folder: bool,

    /// Simulation mode. Lists and diffs partitions but does not start transfers.
    #[arg(short = 'd', long, env, default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    pub dry_run: bool,

    /// Don't show the progress bar.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of concurrent transfer workers. Default: 5.
    #[arg(long, env, visible_alias = "worker", default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    /// Job queue capacity. The lister blocks while the queue is full. Default: 10.
    #[arg(long, env, default_value_t = DEFAULT_JOB_QUEUE_SIZE, help_heading = "Performance")]
    pub job_queue_size: u32,

    /// Max entries per listing request (1-5000). Default: 100.
    #[arg(long, env, default_value_t = DEFAULT_MAX_RESULTS, help_heading = "Performance")]
    pub max_results: u32,

    // -----------------------------------------------------------------------
    // Transfer options
    // -----------------------------------------------------------------------
    /// Transfer agent executable. Looked up in PATH unless a path is given.
    #[arg(long, env, default_value = DEFAULT_TRANSFER_PROGRAM, help_heading = "Transfer")]
    pub transfer_program: PathBuf,

    /// Lifetime of the generated access tokens in hours. Default: 48.
    #[arg(long, env, default_value_t = DEFAULT_TOKEN_VALIDITY_HOURS, help_heading = "Transfer")]
    pub token_validity_hours: u32,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use blobmig_rs::config::args::parse_from_args;
///
/// let args = vec![
///     "blobmig",
///     "--source-account", "oldarchive",
///     "--destination-account", "newarchive",
///     "--source-container", "archive",
///     "--dry-run",
/// ];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.dry_run);
/// assert!(cli_args.destination_container.is_none());
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if self.total == 0 {
            return Err(ERROR_MESSAGE_TOTAL_ZERO.to_string());
        }
        if self.max_id < self.min_id {
            return Err(ERROR_MESSAGE_ID_RANGE.to_string());
        }
        if self.job_queue_size == 0 {
            return Err(ERROR_MESSAGE_JOB_QUEUE_SIZE_ZERO.to_string());
        }
        if self.max_results == 0 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(ERROR_MESSAGE_MAX_RESULTS_OUT_OF_RANGE.to_string());
        }
        if self.token_validity_hours == 0 {
            return Err(ERROR_MESSAGE_TOKEN_VALIDITY_ZERO.to_string());
        }
        Ok(())
    }

    fn build_account_key(key: &Option<String>, env_name: &str) -> Result<AccountKey, String> {
        let Some(key) = key else {
            return Err(
                MigrateError::MissingCredential(format!("{env_name} environment variable is not set"))
                    .to_string(),
            );
        };
        if STANDARD.decode(key.trim()).is_err() {
            return Err(ERROR_MESSAGE_INVALID_KEY.to_string());
        }
        Ok(AccountKey::new(key.trim()))
    }

    fn build_account_configs(&self) -> Result<(AccountConfig, AccountConfig), String> {
        // Completion generation must not require credentials.
        let (source_key, destination_key) = if self.auto_complete_shell.is_some() {
            (AccountKey::new(""), AccountKey::new(""))
        } else {
            (
                Self::build_account_key(&self.source_key, SOURCE_KEY_ENV)?,
                Self::build_account_key(&self.destination_key, DESTINATION_KEY_ENV)?,
            )
        };

        let destination_container = self
            .destination_container
            .clone()
            .unwrap_or_else(|| self.source_container.clone());

        let mut source = AccountConfig::new(&self.source_account, source_key, &self.source_container);
        source.endpoint_url = self.source_endpoint_url.clone();

        let mut destination = AccountConfig::new(
            &self.destination_account,
            destination_key,
            &destination_container,
        );
        destination.endpoint_url = self.destination_endpoint_url.clone();

        Ok((source, destination))
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let (source, destination) = args.build_account_configs()?;
        let tracing_config = args.build_tracing_config();

        Ok(Config {
            source,
            destination,
            worker_size: args.worker_size,
            total: args.total,
            max_id: args.max_id,
            min_id: args.min_id,
            folder: args.folder,
            job_queue_size: args.job_queue_size,
            max_results: args.max_results,
            token_validity_hours: args.token_validity_hours,
            transfer_program: args.transfer_program,
            dry_run: args.dry_run,
            show_no_progress: args.show_no_progress,
            tracing_config,
            auto_complete_shell: args.auto_complete_shell,
        })
    }
}
