//! Account shared access signatures.
//!
//! Tokens are generated locally from the account key, so no request is made
//! to the service. One token per account is created at startup and shared
//! read-only by the lister and every worker.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::types::AccountKey;
use crate::types::error::MigrateError;

/// Signed storage service version of the account SAS.
const SERVICE_VERSION: &str = "2021-08-06";

// read, write, list, add, create
const SIGNED_PERMISSIONS: &str = "rwlac";
const SIGNED_SERVICES: &str = "b";
// container and object
const SIGNED_RESOURCE_TYPES: &str = "co";
const SIGNED_PROTOCOLS: &str = "https,http";

const REDACTED: &str = "REDACTED";

/// A signed, time-limited query string granting access to one account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    query: String,
    expiry: DateTime<Utc>,
}

impl AccessToken {
    /// The query string without a leading `?`.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("query", &redact_signature(&self.query))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Generate an account SAS for the blob service valid until `expiry`.
pub fn generate_account_sas(
    account_name: &str,
    account_key: &AccountKey,
    expiry: DateTime<Utc>,
) -> Result<AccessToken> {
    let key = STANDARD
        .decode(account_key.expose_secret().trim())
        .map_err(|e| {
            MigrateError::Signing(format!("account key for {account_name} is not base64: {e}"))
        })?;

    let signed_expiry = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();

    // start, ip and encryption scope are left empty
    let string_to_sign = format!(
        "{account_name}\n{SIGNED_PERMISSIONS}\n{SIGNED_SERVICES}\n{SIGNED_RESOURCE_TYPES}\n\n{signed_expiry}\n\n{SIGNED_PROTOCOLS}\n{SERVICE_VERSION}\n\n"
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| MigrateError::Signing(format!("invalid account key length: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let query = format!(
        "sv={}&ss={}&srt={}&sp={}&se={}&spr={}&sig={}",
        SERVICE_VERSION,
        SIGNED_SERVICES,
        SIGNED_RESOURCE_TYPES,
        SIGNED_PERMISSIONS,
        urlencoding::encode(&signed_expiry),
        urlencoding::encode(SIGNED_PROTOCOLS),
        urlencoding::encode(&signature),
    );

    Ok(AccessToken { query, expiry })
}

/// Replace the value of every `sig=` parameter in `text`.
pub fn redact_signature(text: &str) -> String {
    let mut redacted = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(position) = rest.find("sig=") {
        let value_start = position + "sig=".len();
        redacted.push_str(&rest[..value_start]);
        redacted.push_str(REDACTED);

        let value_len = rest[value_start..]
            .find(|c: char| c == '&' || c == '"' || c.is_whitespace())
            .unwrap_or(rest.len() - value_start);
        rest = &rest[value_start + value_len..];
    }
    redacted.push_str(rest);

    redacted
}
