//! Shared integration test infrastructure for blobmig-rs.
//!
//! Provides `AzureMock`, a wiremock server standing in for one storage
//! account's blob service, a recording `TransferInvoker`, and helpers that
//! build a [`Config`] through the same argument parser the CLI uses.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use blobmig_rs::config::args::build_config_from_args;
use blobmig_rs::storage::{self, Storage};
use blobmig_rs::transfer::{TransferCommand, TransferInvoker};
use blobmig_rs::{Config, MigrationPipeline, PipelineCancellationToken};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CONTAINER: &str = "archive";
pub const SOURCE_ACCOUNT: &str = "oldarchive";
pub const DESTINATION_ACCOUNT: &str = "newarchive";

pub fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// One storage account's blob service.
///
/// Listing mocks are matched by prefix. Any prefix without a mounted listing
/// returns an empty page.
pub struct AzureMock {
    pub server: MockServer,
    pub account: String,
}

impl AzureMock {
    pub async fn start(account: &str) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/{account}/{CONTAINER}")))
            .and(query_param("comp", "list"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-ms-request-id", "00000000-0000-0000-0000-000000000000").insert_header("date", "Mon, 04 Mar 2024 05:06:07 GMT").set_body_string(page("")))
            .with_priority(10)
            .mount(&server)
            .await;

        Self {
            server,
            account: account.to_string(),
        }
    }

    pub fn endpoint_url(&self) -> String {
        format!("{}/{}", self.server.uri(), self.account)
    }

    /// Serve hierarchical listing entries (folder names) for `prefix`.
    pub async fn with_folders(&self, prefix: &str, folders: &[&str]) -> &Self {
        let entries: String = folders
            .iter()
            .map(|folder| format!("<BlobPrefix><Name>{folder}</Name></BlobPrefix>"))
            .collect();
        self.mount_listing(prefix, &entries).await;
        self
    }

    /// Serve flat listing entries (blob names) for `prefix`.
    pub async fn with_blobs(&self, prefix: &str, blobs: &[&str]) -> &Self {
        let entries: String = blobs
            .iter()
            .map(|blob| blob_entry(blob))
            .collect();
        self.mount_listing(prefix, &entries).await;
        self
    }

    /// Reject every listing request with `status`.
    pub async fn failing_listing(&self, status: u16) -> &Self {
        Mock::given(method("GET"))
            .and(query_param("comp", "list"))
            .respond_with(ResponseTemplate::new(status).insert_header("x-ms-error-code", "AuthenticationFailed"))
            .with_priority(1)
            .mount(&self.server)
            .await;
        self
    }

    /// Answer Create Container with `status` and an optional error code.
    pub async fn with_create_container(
        &self,
        status: u16,
        error_code: Option<&str>,
        expected_calls: u64,
    ) -> &Self {
        let mut response = ResponseTemplate::new(status);
        if let Some(code) = error_code {
            response = response.insert_header("x-ms-error-code", code);
        }

        Mock::given(method("PUT"))
            .and(path(format!("/{}/{CONTAINER}", self.account)))
            .and(query_param("restype", "container"))
            .respond_with(response)
            .expect(expected_calls)
            .mount(&self.server)
            .await;
        self
    }

    async fn mount_listing(&self, prefix: &str, entries: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/{CONTAINER}", self.account)))
            .and(query_param("comp", "list"))
            .and(query_param("prefix", prefix))
            .respond_with(ResponseTemplate::new(200).insert_header("x-ms-request-id", "00000000-0000-0000-0000-000000000000").insert_header("date", "Mon, 04 Mar 2024 05:06:07 GMT").set_body_string(page(entries)))
            .mount(&self.server)
            .await;
    }
}

fn page(entries: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <EnumerationResults ServiceEndpoint=\"http://127.0.0.1/\" ContainerName=\"{CONTAINER}\">\
         <Blobs>{entries}</Blobs><NextMarker></NextMarker></EnumerationResults>"
    )
}

fn blob_entry(name: &str) -> String {
    format!(
        "<Blob><Name>{name}</Name><Properties>\
         <Creation-Time>Mon, 04 Mar 2024 05:06:07 GMT</Creation-Time>\
         <Last-Modified>Mon, 04 Mar 2024 05:06:07 GMT</Last-Modified>\
         <Etag>0x8DC3C1B2A3F4E5D</Etag>\
         <Content-Length>1024</Content-Length>\
         <Content-Type>video/mp4</Content-Type>\
         <BlobType>BlockBlob</BlobType>\
         <AccessTier>Hot</AccessTier>\
         <AccessTierInferred>true</AccessTierInferred>\
         <LeaseStatus>unlocked</LeaseStatus>\
         <LeaseState>available</LeaseState>\
         <ServerEncrypted>true</ServerEncrypted>\
         </Properties></Blob>"
    )
}

/// Build a config for the two mock accounts through the CLI parser.
pub fn build_config(source: &AzureMock, destination: &AzureMock, extra_args: &[&str]) -> Config {
    let source_endpoint = source.endpoint_url();
    let destination_endpoint = destination.endpoint_url();

    let mut args = vec![
        "blobmig",
        "--source-account",
        SOURCE_ACCOUNT,
        "--destination-account",
        DESTINATION_ACCOUNT,
        "--source-container",
        CONTAINER,
        "--source-key",
        "c291cmNlLWtleQ==",
        "--destination-key",
        "ZGVzdGluYXRpb24ta2V5",
        "--source-endpoint-url",
        &source_endpoint,
        "--destination-endpoint-url",
        &destination_endpoint,
        "--worker-size",
        "2",
    ];
    args.extend_from_slice(extra_args);

    build_config_from_args(args).unwrap()
}

/// Create both storages and a pipeline that hands commands to `invoker`.
pub async fn pipeline_with_invoker(
    config: Config,
    invoker: Arc<dyn TransferInvoker>,
    cancellation_token: PipelineCancellationToken,
) -> MigrationPipeline {
    let source: Storage = storage::create_storage(
        &config,
        config.source.clone(),
        cancellation_token.clone(),
    )
    .await
    .unwrap();
    let destination: Storage = storage::create_storage(
        &config,
        config.destination.clone(),
        cancellation_token.clone(),
    )
    .await
    .unwrap();

    MigrationPipeline::with_components(config, source, destination, invoker, cancellation_token)
}

/// Records every command it is given and reports success.
#[derive(Clone, Default)]
pub struct RecordingInvoker {
    invoked: Arc<Mutex<Vec<TransferCommand>>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoked(&self) -> Vec<TransferCommand> {
        self.invoked.lock().unwrap().clone()
    }

    /// `(source path, destination path)` of every invoked command, sorted.
    pub fn invoked_paths(&self) -> Vec<(String, String)> {
        let mut paths: Vec<(String, String)> = self
            .invoked()
            .iter()
            .map(|command| {
                let source = url::Url::parse(&command.args()[1]).unwrap();
                let destination = url::Url::parse(&command.args()[2]).unwrap();
                (source.path().to_string(), destination.path().to_string())
            })
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl TransferInvoker for RecordingInvoker {
    async fn invoke(&self, command: &TransferCommand) -> Result<String> {
        self.invoked.lock().unwrap().push(command.clone());
        Ok("Final Job Status: Completed".to_string())
    }
}
