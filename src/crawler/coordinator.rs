//! Crawl orchestration
//!
//! The coordinator owns the worker pool. Workers share one frontier, one
//! dedup filter, one rate-limited fetcher, and one robots policy, and
//! emit a [`PageResult`] per crawled page onto a bounded channel. The
//! channel applies back-pressure on purpose: a slow consumer throttles
//! the crawl.
//!
//! Lifecycle: the crawl ends when the frontier has drained, the URL
//! budget is exhausted, or the cancellation token fires. The result
//! channel closes exactly once, after every worker has halted.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::fetcher::{Fetcher, HttpFetcher};
use super::parser::extract_links;
use crate::config::CrawlOptions;
use crate::dedup::BloomDedup;
use crate::frontier::{Frontier, MemoryFrontier, RedisFrontier};
use crate::robots::RobotsChecker;
use crate::url::{host_of, is_same_domain, is_valid_http, normalize_url};
use crate::{CrawlError, Result};

/// How long an idle worker waits on the frontier before re-checking the
/// drain condition.
const POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// The outcome of crawling a single page.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Normalized URL of the page.
    pub url: String,

    /// When the crawl of this page started.
    pub timestamp: DateTime<Utc>,

    /// All links found on the page, in document order.
    pub links: Vec<String>,

    /// Links on the seed's host; these are scheduled for crawling.
    pub same_host: Vec<String>,

    /// Links pointing elsewhere; reported but never fetched.
    pub external: Vec<String>,

    /// Fetch or parse failure, if any.
    pub error: Option<CrawlError>,
}

impl PageResult {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            timestamp: Utc::now(),
            links: Vec::new(),
            same_host: Vec::new(),
            external: Vec::new(),
            error: None,
        }
    }
}

/// Orchestrates a single-host crawl from one seed URL.
pub struct Crawler {
    opts: CrawlOptions,
    seed: String,
    frontier: Arc<dyn Frontier>,
    dedup: BloomDedup,
    fetcher: Arc<dyn Fetcher>,
    robots: RobotsChecker,
    /// Claimed crawl slots; bounded by `max_urls` when a budget is set.
    crawled: AtomicI64,
    /// Pages popped but whose children are not yet pushed. Guards the
    /// drain check against workers that are mid-crawl.
    in_flight: AtomicI64,
}

impl Crawler {
    /// Creates a crawler with the real HTTP fetcher and the frontier
    /// backend selected by the options.
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to run
    /// * `Err(CrawlError::InvalidSeed)` - Seed is malformed or not http(s)
    /// * `Err(CrawlError::InvalidOptions)` - An option is out of range
    /// * `Err(CrawlError::BackendConnect)` - Redis selected but unreachable
    pub async fn new(seed_url: &str, opts: CrawlOptions) -> Result<Self> {
        opts.validate()?;
        let seed = validate_seed(seed_url)?;

        let frontier: Arc<dyn Frontier> = if opts.use_redis {
            let host = host_of(&seed).map_err(|e| CrawlError::InvalidSeed(e.to_string()))?;
            let key = format!("crawler:{}", host);
            Arc::new(RedisFrontier::connect(&opts.redis_addr, &key).await?)
        } else {
            Arc::new(MemoryFrontier::new(opts.frontier_capacity))
        };

        let fetcher = Arc::new(HttpFetcher::new(&opts)?);
        Ok(Self::assemble(seed, opts, frontier, fetcher))
    }

    /// Creates a crawler around a caller-supplied fetcher and an in-memory
    /// frontier. This is the deterministic-test entry point.
    pub fn with_fetcher(
        seed_url: &str,
        opts: CrawlOptions,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        opts.validate()?;
        let seed = validate_seed(seed_url)?;
        let frontier = Arc::new(MemoryFrontier::new(opts.frontier_capacity));
        Ok(Self::assemble(seed, opts, frontier, fetcher))
    }

    fn assemble(
        seed: String,
        opts: CrawlOptions,
        frontier: Arc<dyn Frontier>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            dedup: BloomDedup::new(opts.bloom_expected_items, opts.bloom_false_positive_rate),
            robots: RobotsChecker::new(&opts.user_agent),
            crawled: AtomicI64::new(0),
            in_flight: AtomicI64::new(0),
            seed,
            opts,
            frontier,
            fetcher,
        }
    }

    /// The normalized seed URL.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Number of crawl slots currently claimed; once the crawl has
    /// finished, the number of URLs actually crawled.
    pub fn crawled_count(&self) -> i64 {
        self.crawled.load(Ordering::SeqCst)
    }

    /// Starts the crawl and returns the stream of page results.
    ///
    /// The receiver yields one [`PageResult`] per crawled page and closes
    /// when the crawl is done or cancelled. Callers that want to inspect
    /// the crawler afterwards keep their own `Arc` clone.
    pub fn run(self: Arc<Self>, cancel: CancellationToken) -> mpsc::Receiver<PageResult> {
        let (tx, rx) = mpsc::channel(self.opts.workers * 2);
        tokio::spawn(self.run_inner(cancel, tx));
        rx
    }

    async fn run_inner(self: Arc<Self>, cancel: CancellationToken, tx: mpsc::Sender<PageResult>) {
        // Robots policy must be in place before any page fetch, and its
        // crawl-delay overrides the configured rate.
        if let Err(e) = self.robots.fetch(&cancel, &self.seed).await {
            tracing::warn!("Skipping robots.txt: {}", e);
        }

        let delay = self.robots.crawl_delay();
        if delay > Duration::ZERO {
            tracing::info!("robots.txt declares a crawl delay of {:?}", delay);
            self.fetcher.set_rate(1.0 / delay.as_secs_f64(), 1).await;
        }

        self.dedup.seen_or_add(&self.seed);
        if let Err(e) = self.frontier.push(&cancel, &self.seed).await {
            tracing::error!("Failed to enqueue seed URL: {}", e);
            return;
        }

        let worker_cancel = cancel.child_token();
        let mut workers = Vec::with_capacity(self.opts.workers);
        for id in 0..self.opts.workers {
            let this = Arc::clone(&self);
            let cancel = worker_cancel.clone();
            let tx = tx.clone();
            workers.push(tokio::spawn(async move { this.worker(id, cancel, tx).await }));
        }
        // Workers hold the remaining senders, so the result channel closes
        // exactly when the last worker halts.
        drop(tx);

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker panicked: {}", e);
            }
        }

        if let Err(e) = self.frontier.close().await {
            tracing::warn!("Failed to close frontier: {}", e);
        }

        tracing::info!("Crawl finished: {} URLs crawled", self.crawled_count());
    }

    async fn worker(
        self: Arc<Self>,
        id: usize,
        cancel: CancellationToken,
        tx: mpsc::Sender<PageResult>,
    ) {
        let budget = self.opts.max_urls;

        loop {
            // Claim a budget slot BEFORE popping, so racing workers can
            // never overshoot the cap. The slot is released on every path
            // that does not actually crawl a page.
            if budget > 0 {
                loop {
                    let current = self.crawled.load(Ordering::SeqCst);
                    if current >= budget {
                        tracing::debug!("Worker {} exiting: budget exhausted", id);
                        return;
                    }
                    if self
                        .crawled
                        .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        break;
                    }
                }
            }

            let url = match self.frontier.pop_with_timeout(&cancel, POLL_TIMEOUT).await {
                Ok(Some(url)) => url,
                Ok(None) => {
                    if budget > 0 {
                        self.crawled.fetch_sub(1, Ordering::SeqCst);
                    }
                    // Drained only if nothing is queued AND no worker holds
                    // a page whose children may still be pushed.
                    if self.frontier.size().await == 0
                        && self.in_flight.load(Ordering::SeqCst) == 0
                    {
                        tracing::debug!("Worker {} exiting: frontier drained", id);
                        return;
                    }
                    continue;
                }
                Err(_) => {
                    if budget > 0 {
                        self.crawled.fetch_sub(1, Ordering::SeqCst);
                    }
                    tracing::debug!("Worker {} exiting: cancelled", id);
                    return;
                }
            };

            self.in_flight.fetch_add(1, Ordering::SeqCst);

            if !self.robots.is_allowed(&url) {
                tracing::debug!("robots.txt disallows {}", url);
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if budget > 0 {
                    // The slot was not spent on a real page.
                    self.crawled.fetch_sub(1, Ordering::SeqCst);
                }
                continue;
            }

            let result = self.crawl_url(&cancel, &url).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            tokio::select! {
                sent = tx.send(result) => {
                    if sent.is_err() {
                        tracing::debug!("Worker {} exiting: consumer hung up", id);
                        return;
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }
    }

    /// Fetches one page, extracts its links, partitions them by host, and
    /// schedules unseen same-host links.
    async fn crawl_url(&self, cancel: &CancellationToken, url: &str) -> PageResult {
        tracing::debug!("Crawling {}", url);
        let mut result = PageResult::new(url);

        let fetched = self.fetcher.fetch(cancel, url).await;
        if let Some(error) = fetched.error {
            result.error = Some(error);
            return result;
        }

        if !(200..300).contains(&fetched.status) {
            result.error = Some(CrawlError::Status(fetched.status));
            return result;
        }

        // Non-HTML pages are leaves: a success with zero children.
        if !fetched.content_type.to_lowercase().contains("text/html") {
            return result;
        }

        let links = match extract_links(url, &fetched.body) {
            Ok(links) => links,
            Err(e) => {
                result.error = Some(e);
                return result;
            }
        };

        for link in links {
            if is_same_domain(&self.seed, &link) {
                if !self.dedup.seen_or_add(&link) {
                    if let Err(e) = self.frontier.push(cancel, &link).await {
                        // The link stays in the result; it is only dropped
                        // from the crawl schedule.
                        tracing::debug!("Failed to enqueue {}: {}", link, e);
                    }
                }
                result.same_host.push(link.clone());
            } else {
                result.external.push(link.clone());
            }
            result.links.push(link);
        }

        result
    }
}

fn validate_seed(seed_url: &str) -> Result<String> {
    let seed = normalize_url(seed_url).map_err(|e| CrawlError::InvalidSeed(e.to_string()))?;
    if !is_valid_http(&seed) {
        return Err(CrawlError::InvalidSeed(format!(
            "URL must be http or https: {}",
            seed_url
        )));
    }
    Ok(seed)
}
