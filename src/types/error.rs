use anyhow::Error;
use thiserror::Error;

/// Application-level error types for blobmig-rs.
///
/// These classify failures that occur during setup, listing and transfer.
/// Most functions return `anyhow::Result` and wrap one of these variants so
/// callers can downcast to decide how to react.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Non-error conditions (Cancelled, ContainerAlreadyExists)
/// - 1: General errors (Signing, Listing, Transfer, InvalidBlobPath, Pipeline)
/// - 2: Configuration errors (InvalidConfig, MissingCredential)
#[derive(Error, Debug, PartialEq)]
pub enum MigrateError {
    /// Configuration error.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required credential was not supplied.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Access token could not be generated.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Listing or container request rejected by the storage service.
    #[error("Listing error: {0}")]
    Listing(String),

    /// The container already exists. Raised by container creation and
    /// treated as success by the pipeline.
    #[error("Container already exists: {0}")]
    ContainerAlreadyExists(String),

    /// Blob path that cannot be turned into a URL.
    #[error("Invalid blob path: {0}")]
    InvalidBlobPath(String),

    /// Transfer agent could not be started or exited unsuccessfully.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Operation cancelled by user.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// General pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl MigrateError {
    /// Get the appropriate process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MigrateError::Cancelled | MigrateError::ContainerAlreadyExists(_) => 0,
            MigrateError::InvalidConfig(_) | MigrateError::MissingCredential(_) => 2,
            _ => 1,
        }
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<MigrateError>() {
        return *err == MigrateError::Cancelled;
    }
    false
}

/// Check if an anyhow::Error wraps the container-already-exists conflict.
pub fn is_container_already_exists_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<MigrateError>(),
        Some(MigrateError::ContainerAlreadyExists(_))
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<MigrateError>() {
        return err.exit_code();
    }
    1
}
