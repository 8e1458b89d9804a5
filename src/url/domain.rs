use url::Url;

use crate::{CrawlError, Result};

/// Checks whether two URLs share a host.
///
/// The comparison is an exact case-insensitive match on the host component
/// (plus any explicit port). Subdomains are distinct hosts:
/// `www.example.com` is NOT the same as `example.com`.
pub fn is_same_domain(base_url: &str, check_url: &str) -> bool {
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(_) => return false,
    };

    let check = match Url::parse(check_url) {
        Ok(u) => u,
        Err(_) => return false,
    };

    match (base.host_str(), check.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b) && base.port() == check.port(),
        _ => false,
    }
}

/// Checks whether a URL is a well-formed http or https URL.
pub fn is_valid_http(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(u) => u.scheme() == "http" || u.scheme() == "https",
        Err(_) => false,
    }
}

/// Extracts the host (with any explicit port) from a URL.
///
/// # Returns
///
/// * `Ok(String)` - e.g. `example.com` or `127.0.0.1:8080`
/// * `Err(CrawlError)` - URL is malformed or has no host
pub fn host_of(raw: &str) -> Result<String> {
    let url = Url::parse(raw).map_err(|e| CrawlError::UrlParse(e.to_string()))?;

    let host = url
        .host_str()
        .ok_or_else(|| CrawlError::UrlParse(format!("URL has no host: {}", raw)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
