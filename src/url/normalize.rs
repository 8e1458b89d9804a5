use url::Url;

use crate::{CrawlError, Result};

/// Normalizes a URL into the canonical form used for deduplication.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Remove the fragment (everything after #)
/// 3. Empty path becomes /
/// 4. Remove trailing slash (except for the root /)
/// 5. Query string is preserved as-is
///
/// # Examples
///
/// ```
/// use webcrawler::url::normalize_url;
///
/// let url = normalize_url("https://example.com/page/#section").unwrap();
/// assert_eq!(url, "https://example.com/page");
/// ```
pub fn normalize_url(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw).map_err(|e| CrawlError::UrlParse(e.to_string()))?;

    url.set_fragment(None);

    // The url crate guarantees a leading "/" for http(s) paths, so only the
    // trailing-slash rule needs work here.
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    Ok(url.to_string())
}

/// Resolves a possibly-relative href against a base URL and normalizes it.
///
/// # Arguments
///
/// * `base` - The page the href was found on
/// * `href` - The raw href attribute value
///
/// # Returns
///
/// * `Ok(String)` - Absolute, normalized URL
/// * `Err(CrawlError)` - Base or href could not be parsed
pub fn resolve_url(base: &Url, href: &str) -> Result<String> {
    let resolved = base
        .join(href)
        .map_err(|e| CrawlError::UrlParse(e.to_string()))?;
    normalize_url(resolved.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#x").unwrap();
        assert_eq!(result, "https://example.com/page");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result, "https://example.com/page");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.com").unwrap();
        assert_eq!(result, "https://example.com/");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("https://example.com/").unwrap();
        assert_eq!(result, "https://example.com/");
    }

    #[test]
    fn test_deep_trailing_slash() {
        let result = normalize_url("https://example.com/a/b/c/").unwrap();
        assert_eq!(result, "https://example.com/a/b/c");
    }

    #[test]
    fn test_query_preserved() {
        let result = normalize_url("https://example.com/p?q=1").unwrap();
        assert_eq!(result, "https://example.com/p?q=1");
    }

    #[test]
    fn test_query_preserved_with_trailing_slash() {
        let result = normalize_url("https://example.com/p/?q=1&b=2").unwrap();
        assert_eq!(result, "https://example.com/p?q=1&b=2");
    }

    #[test]
    fn test_idempotent() {
        let urls = [
            "https://example.com/page#x",
            "https://example.com/page/",
            "https://example.com",
            "https://example.com/a/b/c/",
            "https://example.com/p?q=1",
            "http://example.com:8080/x/y/",
        ];
        for raw in urls {
            let once = normalize_url(raw).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "normalization of {} is not idempotent", raw);
        }
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
        assert!(normalize_url("").is_err());
    }

    #[test]
    fn test_resolve_relative() {
        let base = Url::parse("https://e.com/a/b/c").unwrap();
        assert_eq!(resolve_url(&base, "../d").unwrap(), "https://e.com/a/d");
    }

    #[test]
    fn test_resolve_absolute_path() {
        let base = Url::parse("https://example.com/deep/page").unwrap();
        assert_eq!(
            resolve_url(&base, "/other").unwrap(),
            "https://example.com/other"
        );
    }

    #[test]
    fn test_resolve_absolute_url() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(
            resolve_url(&base, "https://other.com/p/").unwrap(),
            "https://other.com/p"
        );
    }

    #[test]
    fn test_resolve_strips_fragment() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(
            resolve_url(&base, "/page#top").unwrap(),
            "https://example.com/page"
        );
    }
}
