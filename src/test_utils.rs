//! Shared test utilities for the blobmig library crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use url::Url;

use crate::config::Config;
use crate::storage::StorageTrait;
use crate::storage::url::validate_blob_path;
use crate::transfer::{TransferCommand, TransferInvoker};
use crate::types::AccountKey;
use crate::types::error::MigrateError;

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit tests.
///
/// Key defaults: `worker_size=2`, `job_queue_size=10`, `total=10000`,
/// ids `480000..=100`, folder mode.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::for_accounts(
        ("oldarchive", AccountKey::new("c291cmNlLWtleQ==")),
        ("newarchive", AccountKey::new("ZGVzdGluYXRpb24ta2V5")),
        "archive",
    );
    config.worker_size = 2;
    config
}

/// In-memory container keyed by listing prefix.
///
/// Records every listing call so tests can assert which partitions were
/// visited, in which order and in which mode.
#[derive(Clone)]
pub(crate) struct MockStorage {
    account_name: String,
    container: String,
    names: Arc<HashMap<String, Vec<String>>>,
    listed: Arc<Mutex<Vec<(String, bool)>>>,
    failing_prefix: Option<String>,
    container_exists: bool,
    create_container_fails: bool,
    create_container_calls: Arc<AtomicU32>,
}

impl MockStorage {
    pub(crate) fn new(account_name: &str, container: &str) -> Self {
        Self {
            account_name: account_name.to_string(),
            container: container.to_string(),
            names: Arc::new(HashMap::new()),
            listed: Arc::new(Mutex::new(Vec::new())),
            failing_prefix: None,
            container_exists: false,
            create_container_fails: false,
            create_container_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn with_names(mut self, prefix: &str, names: &[&str]) -> Self {
        Arc::make_mut(&mut self.names).insert(
            prefix.to_string(),
            names.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    pub(crate) fn failing_on(mut self, prefix: &str) -> Self {
        self.failing_prefix = Some(prefix.to_string());
        self
    }

    pub(crate) fn with_existing_container(mut self) -> Self {
        self.container_exists = true;
        self
    }

    pub(crate) fn with_failing_create_container(mut self) -> Self {
        self.create_container_fails = true;
        self
    }

    pub(crate) fn listed_prefixes(&self) -> Vec<String> {
        self.listed
            .lock()
            .unwrap()
            .iter()
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }

    pub(crate) fn listed_hierarchical(&self) -> Vec<bool> {
        self.listed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, hierarchical)| *hierarchical)
            .collect()
    }

    pub(crate) fn create_container_calls(&self) -> u32 {
        self.create_container_calls.load(Ordering::SeqCst)
    }

    fn container_root(&self) -> Url {
        Url::parse(&format!(
            "https://{}.blob.core.windows.net/{}/",
            self.account_name, self.container
        ))
        .unwrap()
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    fn account_name(&self) -> &str {
        &self.account_name
    }

    fn container_name(&self) -> &str {
        &self.container
    }

    async fn list_names(&self, prefix: &str, hierarchical: bool) -> Result<Vec<String>> {
        self.listed
            .lock()
            .unwrap()
            .push((prefix.to_string(), hierarchical));

        if self.failing_prefix.as_deref() == Some(prefix) {
            return Err(MigrateError::Listing(format!("status 403 listing {prefix}")).into());
        }

        Ok(self.names.get(prefix).cloned().unwrap_or_default())
    }

    async fn create_container(&self) -> Result<()> {
        self.create_container_calls.fetch_add(1, Ordering::SeqCst);

        if self.create_container_fails {
            return Err(MigrateError::Listing("status 403 creating container".to_string()).into());
        }
        if self.container_exists {
            return Err(MigrateError::ContainerAlreadyExists(self.container.clone()).into());
        }
        Ok(())
    }

    fn signed_blob_url(&self, blob_path: &str) -> Result<Url> {
        validate_blob_path(blob_path)?;
        let mut url = self.container_root().join(blob_path)?;
        url.set_query(Some(&format!("sig={}", self.account_name)));
        Ok(url)
    }

    fn signed_root_url(&self) -> Url {
        let mut url = self.container_root();
        url.set_query(Some(&format!("sig={}", self.account_name)));
        url
    }
}

/// Records every command and fails those whose source URL contains one of
/// the configured fragments.
#[derive(Clone, Default)]
pub(crate) struct RecordingInvoker {
    invoked: Arc<Mutex<Vec<TransferCommand>>>,
    failing: Vec<String>,
}

impl RecordingInvoker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    pub(crate) fn invoked(&self) -> Vec<TransferCommand> {
        self.invoked.lock().unwrap().clone()
    }

    /// Source URL paths of the invoked commands, without the container.
    pub(crate) fn invoked_names(&self) -> Vec<String> {
        self.invoked()
            .iter()
            .map(|command| {
                let source = Url::parse(&command.args()[1]).unwrap();
                source
                    .path()
                    .split_once("/archive/")
                    .map(|(_, name)| name.to_string())
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[async_trait]
impl TransferInvoker for RecordingInvoker {
    async fn invoke(&self, command: &TransferCommand) -> Result<String> {
        self.invoked.lock().unwrap().push(command.clone());

        let source = &command.args()[1];
        if self.failing.iter().any(|fragment| source.contains(fragment)) {
            return Err(MigrateError::Transfer("exit status: 1: copy failed".to_string()).into());
        }
        Ok("Final Job Status: Completed".to_string())
    }
}

/// Blocks every invocation until the test releases a permit.
#[derive(Clone)]
pub(crate) struct GatedInvoker {
    gate: Arc<Semaphore>,
    started: Arc<AtomicU32>,
    finished: Arc<AtomicU32>,
}

impl GatedInvoker {
    pub(crate) fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            started: Arc::new(AtomicU32::new(0)),
            finished: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub(crate) fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> u32 {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferInvoker for GatedInvoker {
    async fn invoke(&self, _command: &TransferCommand) -> Result<String> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await?.forget();
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(String::new())
    }
}
