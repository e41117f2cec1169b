//! Transfer commands and the agent that executes them.
//!
//! A [`TransferCommand`] is built for each job from the two storages' signed
//! URLs and handed to a [`TransferInvoker`]. [`ProcessInvoker`] runs the
//! external transfer agent (azcopy); [`DryRunInvoker`] only logs what would run.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::StorageTrait;
use crate::storage::sas::redact_signature;
use crate::types::JobItem;

pub mod dry_run;
pub mod process;

pub use dry_run::DryRunInvoker;
pub use process::ProcessInvoker;

const COPY_SUBCOMMAND: &str = "copy";
const RECURSIVE_FLAG: &str = "--recursive";
const SINGLE_OBJECT_FLAGS: [&str; 2] = [
    "--s2s-preserve-access-tier=false",
    "--include-directory-stub=false",
];

/// How a job is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Copy one blob to the same path in the destination container.
    SingleObject,
    /// Copy a folder subtree into the destination container root.
    Folder,
}

impl TransferMode {
    /// A trailing separator alone selects folder mode.
    pub fn for_job(job: &JobItem) -> Self {
        if job.is_folder() {
            TransferMode::Folder
        } else {
            TransferMode::SingleObject
        }
    }
}

/// A fully built transfer agent invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl TransferCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build the copy command for `job`.
    ///
    /// Folder jobs copy `<source>/<folder>/` into the destination container
    /// root, which recreates the folder there. Single objects are copied to
    /// the same path.
    pub fn build(
        program: &Path,
        job: &JobItem,
        source: &dyn StorageTrait,
        destination: &dyn StorageTrait,
    ) -> Result<Self> {
        let source_url = source.signed_blob_url(job.name())?;

        let mut args = vec![COPY_SUBCOMMAND.to_string(), source_url.to_string()];
        match TransferMode::for_job(job) {
            TransferMode::Folder => {
                args.push(destination.signed_root_url().to_string());
                args.push(RECURSIVE_FLAG.to_string());
            }
            TransferMode::SingleObject => {
                args.push(destination.signed_blob_url(job.name())?.to_string());
                args.push(RECURSIVE_FLAG.to_string());
                args.extend(SINGLE_OBJECT_FLAGS.iter().map(|flag| flag.to_string()));
            }
        }

        Ok(Self::new(program, args))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Command line with access token signatures replaced, safe to log.
    pub fn redacted(&self) -> String {
        redact_signature(&self.to_string())
    }
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransferCommand")
            .field(&self.redacted())
            .finish()
    }
}

/// Executes a transfer command and returns its captured output.
///
/// Implementations must not retry; failures are reported to the worker,
/// which logs and drops the job.
#[async_trait]
pub trait TransferInvoker: Send + Sync {
    async fn invoke(&self, command: &TransferCommand) -> Result<String>;

    /// Whether the invoker actually copies data.
    fn is_dry_run(&self) -> bool {
        false
    }
}
