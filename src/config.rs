//! Crawler configuration
//!
//! Everything the orchestrator needs to know is collected in one options
//! record, filled in by the CLI front-end (or by tests directly).

use std::time::Duration;

use crate::{CrawlError, Result};

/// Options controlling a crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Number of concurrent workers.
    pub workers: usize,

    /// Requests per second (before any robots.txt crawl-delay applies).
    pub rate_limit: f64,

    /// Maximum number of URLs to crawl (0 = unlimited).
    pub max_urls: i64,

    /// User agent string, also used as the robots.txt group key.
    pub user_agent: String,

    /// Overall per-request deadline.
    pub timeout: Duration,

    /// Use a Redis-backed frontier for distributed crawling.
    pub use_redis: bool,

    /// Redis server address (host:port).
    pub redis_addr: String,

    /// Capacity of the in-memory frontier.
    pub frontier_capacity: usize,

    /// Hard cap on response body bytes read per fetch.
    pub max_body_size: usize,

    /// Expected number of distinct URLs, sizes the dedup filter.
    pub bloom_expected_items: usize,

    /// Target false-positive rate for the dedup filter.
    pub bloom_false_positive_rate: f64,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            rate_limit: 5.0,
            max_urls: 0,
            user_agent: format!("webcrawler/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            use_redis: false,
            redis_addr: "localhost:6379".to_string(),
            frontier_capacity: 100_000,
            max_body_size: 10 * 1024 * 1024,
            bloom_expected_items: 1_000_000,
            bloom_false_positive_rate: 0.01,
        }
    }
}

impl CrawlOptions {
    /// Checks the options for values the crawler cannot run with.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Options are usable
    /// * `Err(CrawlError::InvalidOptions)` - A value is out of range
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CrawlError::InvalidOptions(
                "workers must be at least 1".to_string(),
            ));
        }

        if self.max_urls < 0 {
            return Err(CrawlError::InvalidOptions(
                "max-urls must not be negative".to_string(),
            ));
        }

        if !self.rate_limit.is_finite() || self.rate_limit <= 0.0 {
            return Err(CrawlError::InvalidOptions(format!(
                "rate must be a positive number, got {}",
                self.rate_limit
            )));
        }

        if self.frontier_capacity == 0 {
            return Err(CrawlError::InvalidOptions(
                "frontier capacity must be at least 1".to_string(),
            ));
        }

        if self.bloom_expected_items == 0
            || self.bloom_false_positive_rate <= 0.0
            || self.bloom_false_positive_rate >= 1.0
        {
            return Err(CrawlError::InvalidOptions(
                "bloom filter parameters out of range".to_string(),
            ));
        }

        Ok(())
    }
}
