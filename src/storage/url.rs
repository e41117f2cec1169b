use anyhow::Result;
use url::Url;

use crate::storage::sas::AccessToken;
use crate::types::PATH_SEPARATOR;
use crate::types::error::MigrateError;

const MAX_BLOB_PATH_LEN: usize = 1024;

/// Builds signed URLs for one container.
///
/// The base is `https://<account>.blob.core.windows.net` unless an endpoint
/// override is configured (Azurite, sovereign clouds, tests).
#[derive(Debug, Clone)]
pub struct ContainerEndpoint {
    container_url: Url,
    token: AccessToken,
}

impl ContainerEndpoint {
    pub fn new(
        account_name: &str,
        endpoint_url: Option<&str>,
        container: &str,
        token: AccessToken,
    ) -> Result<Self> {
        let base = match endpoint_url {
            Some(endpoint) => endpoint.to_string(),
            None => format!("https://{account_name}.blob.core.windows.net"),
        };

        let mut container_url = Url::parse(&base)
            .map_err(|e| MigrateError::InvalidConfig(format!("endpoint {base}: {e}")))?;
        container_url
            .path_segments_mut()
            .map_err(|_| MigrateError::InvalidConfig(format!("endpoint {base} cannot be a base")))?
            .pop_if_empty()
            .push(container);

        Ok(Self {
            container_url,
            token,
        })
    }

    /// Signed URL of the container root, with a trailing separator.
    pub fn signed_root_url(&self) -> Url {
        let mut url = self.container_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("");
        }
        url.set_query(Some(self.token.query()));
        url
    }

    /// Signed URL of a blob or folder inside the container.
    pub fn signed_blob_url(&self, blob_path: &str) -> Result<Url> {
        validate_blob_path(blob_path)?;

        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| MigrateError::InvalidBlobPath(blob_path.to_string()))?
            .extend(blob_path.split(PATH_SEPARATOR));
        url.set_query(Some(self.token.query()));

        Ok(url)
    }
}

/// Reject paths that would not round-trip to the same blob name.
///
/// A single trailing separator is allowed and marks a folder.
pub fn validate_blob_path(blob_path: &str) -> Result<()> {
    let invalid = |reason: &str| MigrateError::InvalidBlobPath(format!("{blob_path:?}: {reason}"));

    if blob_path.is_empty() {
        return Err(invalid("empty").into());
    }
    if blob_path.len() > MAX_BLOB_PATH_LEN {
        return Err(invalid("too long").into());
    }
    if blob_path.starts_with(PATH_SEPARATOR) {
        return Err(invalid("leading separator").into());
    }
    if blob_path.contains('\\') {
        return Err(invalid("backslash").into());
    }
    if blob_path.chars().any(char::is_control) {
        return Err(invalid("control character").into());
    }

    let trimmed = blob_path
        .strip_suffix(PATH_SEPARATOR)
        .unwrap_or(blob_path);
    for segment in trimmed.split(PATH_SEPARATOR) {
        match segment {
            "" => return Err(invalid("empty segment").into()),
            "." | ".." => return Err(invalid("relative segment").into()),
            _ => {}
        }
    }

    Ok(())
}
