//! Crawl frontier - the queue of URLs waiting to be fetched
//!
//! Two interchangeable backends implement one behavioral contract: a
//! bounded in-memory queue for single-process crawls, and a Redis list for
//! distributed crawls. The orchestrator only ever sees the trait.

mod memory;
mod redis;

pub use memory::MemoryFrontier;
pub use redis::RedisFrontier;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// FIFO queue of pending URLs shared by all workers.
///
/// Ordering is FIFO within the frontier itself; concurrent pushers race,
/// so callers must not assume a global BFS or DFS order.
#[async_trait]
pub trait Frontier: Send + Sync {
    /// Appends a URL to the tail.
    ///
    /// Blocks while a bounded in-memory queue is full; never blocks on the
    /// distributed backend. Fails with [`crate::CrawlError::Cancelled`]
    /// after [`Frontier::close`] or when the token fires.
    async fn push(&self, cancel: &CancellationToken, url: &str) -> Result<()>;

    /// Removes the URL at the head, waiting until one is available or the
    /// token fires.
    async fn pop(&self, cancel: &CancellationToken) -> Result<String>;

    /// Like [`Frontier::pop`], but gives up after `timeout`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(url))` - An item was dequeued
    /// * `Ok(None)` - The wait elapsed with no item; this is NOT an error
    ///   and drives the orchestrator's drain detection
    /// * `Err(CrawlError::Cancelled)` - The token fired
    async fn pop_with_timeout(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<Option<String>>;

    /// Best-effort current queue depth; may be momentarily stale.
    async fn size(&self) -> i64;

    /// Closes the frontier. Idempotent; later pushes fail, while already
    /// queued items can still be popped from the in-memory backend.
    async fn close(&self) -> Result<()>;
}
