use std::num::NonZeroU32;

use anyhow::Result;
use async_trait::async_trait;
use azure_core::StatusCode;
use azure_core::error::{Error as AzureError, ErrorKind};
use azure_core::request_options::MaxResults;
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::{ClientBuilder, ContainerClient};
use futures::StreamExt;
use url::Url;

use crate::config::AccountConfig;
use crate::storage::sas::AccessToken;
use crate::storage::url::ContainerEndpoint;
use crate::storage::{Storage, StorageFactory, StorageTrait};
use crate::types::PATH_SEPARATOR;
use crate::types::error::MigrateError;
use crate::types::token::PipelineCancellationToken;

const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";

fn describe(e: &AzureError) -> String {
    match e.kind() {
        ErrorKind::HttpResponse { status, error_code } => format!(
            "status {status}, error code {}",
            error_code.as_deref().unwrap_or("unknown")
        ),
        _ => e.to_string(),
    }
}

fn is_container_already_exists(e: &AzureError) -> bool {
    matches!(
        e.kind(),
        ErrorKind::HttpResponse { status, error_code }
            if *status == StatusCode::Conflict
                && error_code.as_deref() == Some(CONTAINER_ALREADY_EXISTS)
    )
}

/// Factory for Azure Blob Storage containers.
pub struct AzureStorageFactory;

#[async_trait]
impl StorageFactory for AzureStorageFactory {
    async fn create(
        account: AccountConfig,
        max_results: u32,
        access_token: AccessToken,
        cancellation_token: PipelineCancellationToken,
    ) -> Result<Storage> {
        let max_results = NonZeroU32::new(max_results).ok_or_else(|| {
            MigrateError::InvalidConfig("max results must be at least 1".to_string())
        })?;

        let endpoint = ContainerEndpoint::new(
            &account.account_name,
            account.endpoint_url.as_deref(),
            &account.container,
            access_token,
        )?;

        let location = match account.endpoint_url.clone() {
            Some(uri) => CloudLocation::Custom {
                account: account.account_name.clone(),
                uri,
            },
            None => CloudLocation::Public {
                account: account.account_name.clone(),
            },
        };
        let credentials = StorageCredentials::access_key(
            account.account_name.clone(),
            account.account_key.expose_secret().to_string(),
        );
        let client = ClientBuilder::with_location(location, credentials)
            .container_client(account.container.clone());

        Ok(Box::new(AzureBlobStorage {
            account_name: account.account_name,
            container: account.container,
            endpoint,
            max_results,
            client,
            cancellation_token,
        }))
    }
}

/// Blob container accessed through the blob service SDK.
///
/// Listing and container creation authenticate with the shared key. The
/// account SAS in `endpoint` is only handed to the transfer agent.
#[derive(Clone)]
struct AzureBlobStorage {
    account_name: String,
    container: String,
    endpoint: ContainerEndpoint,
    max_results: NonZeroU32,
    client: ContainerClient,
    cancellation_token: PipelineCancellationToken,
}

#[async_trait]
impl StorageTrait for AzureBlobStorage {
    fn account_name(&self) -> &str {
        &self.account_name
    }

    fn container_name(&self) -> &str {
        &self.container
    }

    async fn list_names(&self, prefix: &str, hierarchical: bool) -> Result<Vec<String>> {
        let mut request = self
            .client
            .list_blobs()
            .prefix(prefix.to_string())
            .max_results(MaxResults::new(self.max_results));
        if hierarchical {
            request = request.delimiter(PATH_SEPARATOR.to_string());
        }
        let mut pages = request.into_stream();

        let mut names = Vec::new();
        loop {
            let page = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!(prefix = prefix, "listing cancelled.");
                    return Err(MigrateError::Cancelled.into());
                }
                page = pages.next() => page,
            };
            let Some(page) = page else {
                break;
            };

            let page = page.map_err(|e| {
                MigrateError::Listing(format!(
                    "{}/{} prefix {prefix:?}: {}",
                    self.account_name,
                    self.container,
                    describe(&e)
                ))
            })?;

            if hierarchical {
                names.extend(page.blobs.prefixes().map(|folder| folder.name.clone()));
            } else {
                names.extend(page.blobs.blobs().map(|blob| blob.name.clone()));
            }

            tracing::trace!(
                account = %self.account_name,
                prefix = prefix,
                listed = names.len(),
                "listing page received."
            );
        }

        Ok(names)
    }

    async fn create_container(&self) -> Result<()> {
        match self.client.create().await {
            Ok(_) => {
                tracing::info!(
                    account = %self.account_name,
                    container = %self.container,
                    "container created."
                );
                Ok(())
            }
            Err(e) if is_container_already_exists(&e) => {
                Err(MigrateError::ContainerAlreadyExists(self.container.clone()).into())
            }
            Err(e) => Err(MigrateError::Listing(format!(
                "create container {}/{}: {}",
                self.account_name,
                self.container,
                describe(&e)
            ))
            .into()),
        }
    }

    fn signed_blob_url(&self, blob_path: &str) -> Result<Url> {
        self.endpoint.signed_blob_url(blob_path)
    }

    fn signed_root_url(&self) -> Url {
        self.endpoint.signed_root_url()
    }
}
