use std::process::Stdio;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use crate::storage::sas::redact_signature;
use crate::transfer::{TransferCommand, TransferInvoker};
use crate::types::error::MigrateError;

/// Runs the transfer agent as a child process and waits for it to exit.
///
/// stdout and stderr are captured and returned together. There is no
/// timeout. The child is killed if the invocation future is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut output = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&String::from_utf8_lossy(stderr));
    }
    redact_signature(&output)
}

#[async_trait]
impl TransferInvoker for ProcessInvoker {
    async fn invoke(&self, command: &TransferCommand) -> Result<String> {
        trace!(command = %command.redacted(), "starting transfer agent.");

        let output = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                MigrateError::Transfer(format!(
                    "failed to start {}: {e}",
                    command.program().display()
                ))
            })?;

        let combined = combined_output(&output.stdout, &output.stderr);
        if !output.status.success() {
            return Err(MigrateError::Transfer(format!("{}: {combined}", output.status)).into());
        }

        Ok(combined)
    }
}
