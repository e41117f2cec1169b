use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use dyn_clone::DynClone;
use ::url::Url;

use crate::config::{AccountConfig, Config};
use crate::types::error::MigrateError;
use crate::types::token::PipelineCancellationToken;

pub mod azure;
pub mod sas;
pub mod url;

use sas::AccessToken;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Factory trait for creating Storage instances.
#[async_trait]
pub trait StorageFactory {
    async fn create(
        account: AccountConfig,
        max_results: u32,
        access_token: AccessToken,
        cancellation_token: PipelineCancellationToken,
    ) -> Result<Storage>;
}

/// Operations the migration pipeline needs from one container.
///
/// Listing failures are treated as unrecoverable errors by the caller.
#[async_trait]
pub trait StorageTrait: DynClone {
    fn account_name(&self) -> &str;

    fn container_name(&self) -> &str;

    /// List every name under `prefix`, following continuation markers until
    /// the service reports no further pages.
    ///
    /// With `hierarchical` set only the immediate child folders (names ending
    /// in `/`) are returned, otherwise the blob names.
    async fn list_names(&self, prefix: &str, hierarchical: bool) -> Result<Vec<String>>;

    /// Create the container.
    ///
    /// Fails with [`MigrateError::ContainerAlreadyExists`] if it exists.
    async fn create_container(&self) -> Result<()>;

    /// Signed URL for a blob or folder inside the container.
    fn signed_blob_url(&self, blob_path: &str) -> Result<Url>;

    /// Signed URL of the container root.
    fn signed_root_url(&self) -> Url;
}

dyn_clone::clone_trait_object!(StorageTrait);

/// Sign an access token for `account` and create its storage.
///
/// The token is valid for `config.token_validity_hours` and is not renewed.
pub async fn create_storage(
    config: &Config,
    account: AccountConfig,
    cancellation_token: PipelineCancellationToken,
) -> Result<Storage> {
    if account.account_key.is_empty() {
        return Err(MigrateError::MissingCredential(format!(
            "account key for {}",
            account.account_name
        ))
        .into());
    }

    let expiry = Utc::now()
        .checked_add_signed(TimeDelta::hours(i64::from(config.token_validity_hours)))
        .ok_or_else(|| {
            MigrateError::InvalidConfig(format!(
                "token validity of {} hours is out of range",
                config.token_validity_hours
            ))
        })?;

    let access_token = sas::generate_account_sas(&account.account_name, &account.account_key, expiry)
        .with_context(|| format!("failed to sign access token for {}.", account.account_name))?;

    tracing::debug!(
        account = %account.account_name,
        expiry = %access_token.expiry(),
        "access token generated."
    );

    azure::AzureStorageFactory::create(
        account,
        config.max_results,
        access_token,
        cancellation_token,
    )
    .await
}
