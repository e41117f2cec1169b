use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, info, trace};

use blobmig_rs::config::Config;
use blobmig_rs::{
    CLIArgs, MigrationPipeline, create_pipeline_cancellation_token, exit_code_from_error,
};

mod ctrl_c_handler;
pub mod indicator;
#[cfg(test)]
mod indicator_properties;
mod tracing_init;
pub mod ui_config;

/// blobmig - partitioned diff-and-copy migration between two Azure Blob
/// Storage containers.
///
/// This binary is a thin wrapper over the blobmig-rs library.
///
/// The runtime must be dropped before the process exits so that transfer
/// agents still running after a fatal error are killed.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> ExitCode {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "blobmig",
            &mut std::io::stdout(),
        );

        return ExitCode::SUCCESS;
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(e: &anyhow::Error) -> u8 {
    u8::try_from(exit_code_from_error(e)).unwrap_or(1)
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(config: Config) -> Result<()> {
    let cancellation_token = create_pipeline_cancellation_token();

    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!("migration pipeline start.");

    let mut pipeline = MigrationPipeline::new(config.clone(), cancellation_token).await?;
    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        config.dry_run,
    );

    pipeline.run().await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    if pipeline.has_error() {
        let mut errors = pipeline.get_errors_and_consume().unwrap_or_default();
        for err in &errors {
            error!("{:#}", err);
        }
        error!(duration_sec = duration_sec, "blobmig failed.");

        if errors.is_empty() {
            return Err(anyhow!("blobmig failed."));
        }
        return Err(errors.swap_remove(0));
    }

    let stats = pipeline.get_migration_stats();
    if ui_config::is_show_result_needed(&config) {
        println!("{stats}");
    }

    info!(
        duration_sec = duration_sec,
        state = ?pipeline.state(),
        "blobmig has been completed."
    );

    Ok(())
}
