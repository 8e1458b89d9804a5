//! A polite, concurrent, single-host web crawler.
//!
//! Given a seed HTTP(S) URL, this crate discovers every reachable page on
//! the same host and emits one [`PageResult`] per page, with discovered
//! links partitioned into same-host and external. It respects robots.txt,
//! enforces a global request rate, and never revisits a URL.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod frontier;
pub mod robots;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations.
///
/// Per-page failures travel inside [`crawler::PageResult`], so the variants
/// here must stay cheap to clone.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CrawlError {
    #[error("invalid seed URL: {0}")]
    InvalidSeed(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("frontier backend connection failed: {0}")]
    BackendConnect(String),

    #[error("frontier error: {0}")]
    Frontier(String),

    #[error("failed to parse URL: {0}")]
    UrlParse(String),

    #[error("{0}")]
    Fetch(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("HTML parse failed: {0}")]
    Parse(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::CrawlOptions;
pub use crawler::{Crawler, FetchResult, Fetcher, MockFetcher, PageResult};
pub use dedup::BloomDedup;
pub use frontier::{Frontier, MemoryFrontier, RedisFrontier};
pub use robots::RobotsChecker;
pub use url::{is_same_domain, normalize_url, resolve_url};
