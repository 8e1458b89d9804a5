//! HTML link extraction
//!
//! Pulls candidate outbound URLs from anchor tags, resolves them against
//! the page URL, and normalizes them so downstream comparison is pure
//! string equality.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use crate::url::{is_valid_http, resolve_url};
use crate::{CrawlError, Result};

/// Extracts all valid links from an HTML page.
///
/// # Link Rules
///
/// An `<a href>` value is kept when, after trimming ASCII whitespace, it
/// is not empty, not a `javascript:`/`mailto:`/`tel:`/`data:` reference,
/// and not a same-page fragment. Survivors are resolved against
/// `base_url`, normalized, and restricted to http/https. Duplicates of an
/// already-collected link are dropped, preserving first-encounter order.
/// Individually malformed hrefs are skipped silently.
///
/// # Arguments
///
/// * `base_url` - The URL of the page being parsed
/// * `body` - Raw HTML bytes
pub fn extract_links(base_url: &str, body: &[u8]) -> Result<Vec<String>> {
    let base = Url::parse(base_url).map_err(|e| CrawlError::Parse(e.to_string()))?;

    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let selector =
        Selector::parse("a[href]").map_err(|e| CrawlError::Parse(format!("{:?}", e)))?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let href = href.trim();
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
            || (href.starts_with('#') && href.len() > 1)
        {
            continue;
        }

        let Ok(absolute) = resolve_url(&base, href) else {
            continue;
        };

        if !is_valid_http(&absolute) {
            continue;
        }

        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }

    Ok(links)
}
