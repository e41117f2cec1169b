use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::transfer::{TransferCommand, TransferInvoker};

/// Logs the command that would run and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunInvoker;

#[async_trait]
impl TransferInvoker for DryRunInvoker {
    async fn invoke(&self, command: &TransferCommand) -> Result<String> {
        info!(command = %command.redacted(), "[dry-run] transfer skipped.");
        Ok(String::new())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
