//! In-memory frontier backed by a bounded channel

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::Frontier;
use crate::{CrawlError, Result};

/// Bounded multi-producer multi-consumer URL queue.
///
/// Pushers block when the queue is full, poppers block when it is empty;
/// both waits abort promptly on cancellation. The single channel receiver
/// sits behind an async mutex so any worker can pop.
pub struct MemoryFrontier {
    tx: StdMutex<Option<mpsc::Sender<String>>>,
    rx: Mutex<mpsc::Receiver<String>>,
    size: AtomicI64,
}

impl MemoryFrontier {
    /// Creates a frontier holding at most `capacity` queued URLs.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx: StdMutex::new(Some(tx)),
            rx: Mutex::new(rx),
            size: AtomicI64::new(0),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.tx.lock().expect("frontier lock poisoned").clone()
    }
}

#[async_trait]
impl Frontier for MemoryFrontier {
    async fn push(&self, cancel: &CancellationToken, url: &str) -> Result<()> {
        let Some(tx) = self.sender() else {
            return Err(CrawlError::Cancelled);
        };

        tokio::select! {
            sent = tx.send(url.to_string()) => match sent {
                Ok(()) => {
                    self.size.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                Err(_) => Err(CrawlError::Cancelled),
            },
            _ = cancel.cancelled() => Err(CrawlError::Cancelled),
        }
    }

    async fn pop(&self, cancel: &CancellationToken) -> Result<String> {
        let mut rx = tokio::select! {
            guard = self.rx.lock() => guard,
            _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
        };

        tokio::select! {
            item = rx.recv() => match item {
                Some(url) => {
                    self.size.fetch_sub(1, Ordering::SeqCst);
                    Ok(url)
                }
                // Closed and fully drained.
                None => Err(CrawlError::Cancelled),
            },
            _ = cancel.cancelled() => Err(CrawlError::Cancelled),
        }
    }

    async fn pop_with_timeout(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<Option<String>> {
        match tokio::time::timeout(timeout, self.pop(cancel)).await {
            Ok(Ok(url)) => Ok(Some(url)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn size(&self) -> i64 {
        self.size.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        // Dropping the sender lets queued items drain while rejecting new
        // pushes. Taking it twice is harmless.
        self.tx.lock().expect("frontier lock poisoned").take();
        Ok(())
    }
}
