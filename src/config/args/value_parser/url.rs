use url::Url;

const INVALID_SCHEME: &str = "URL scheme must be https:// or http://";
const INVALID_ENDPOINT_QUERY: &str = "Endpoint URL must not contain a query or fragment";

/// Accepts a blob service endpoint such as `http://127.0.0.1:10000/devstoreaccount1`.
///
/// The container and the access token are appended later, so a query string
/// or fragment here would be silently lost.
pub fn check_endpoint_url(url: &str) -> Result<String, String> {
    let parsed = Url::parse(url).map_err(|e| e.to_string())?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(INVALID_SCHEME.to_string());
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(INVALID_ENDPOINT_QUERY.to_string());
    }

    Ok(url.trim_end_matches('/').to_string())
}
