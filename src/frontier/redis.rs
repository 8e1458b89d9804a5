//! Redis-backed frontier for distributed crawling
//!
//! Several crawler processes pointed at the same host share one Redis list
//! (`crawler:<seed-host>`). Push is RPUSH, pop is a server-side blocking
//! BLPOP, so idle workers wait on Redis rather than polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use tokio_util::sync::CancellationToken;

use super::Frontier;
use crate::{CrawlError, Result};

/// Shared-list frontier on a Redis server.
pub struct RedisFrontier {
    pool: Pool,
    key: String,
    closed: AtomicBool,
}

impl RedisFrontier {
    /// Connects to Redis at `addr` (host:port) and verifies the server
    /// responds to PING within 5 seconds.
    ///
    /// # Returns
    ///
    /// * `Ok(RedisFrontier)` - Connection verified
    /// * `Err(CrawlError::BackendConnect)` - Server unreachable
    pub async fn connect(addr: &str, key: &str) -> Result<Self> {
        let cfg = Config::from_url(format!("redis://{}", addr));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CrawlError::BackendConnect(e.to_string()))?;

        let ping = async {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| CrawlError::BackendConnect(e.to_string()))?;
            deadpool_redis::redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map_err(|e| CrawlError::BackendConnect(e.to_string()))
        };

        match tokio::time::timeout(Duration::from_secs(5), ping).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(CrawlError::BackendConnect(format!(
                    "no PING response from {} within 5s",
                    addr
                )))
            }
        }

        tracing::info!("Connected to Redis frontier at {} (key: {})", addr, key);

        Ok(Self {
            pool,
            key: key.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CrawlError::Frontier(e.to_string()))
    }
}

#[async_trait]
impl Frontier for RedisFrontier {
    async fn push(&self, cancel: &CancellationToken, url: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CrawlError::Cancelled);
        }

        let op = async {
            let mut conn = self.conn().await?;
            deadpool_redis::redis::cmd("RPUSH")
                .arg(&self.key)
                .arg(url)
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| CrawlError::Frontier(e.to_string()))
        };

        tokio::select! {
            result = op => result,
            _ = cancel.cancelled() => Err(CrawlError::Cancelled),
        }
    }

    async fn pop(&self, cancel: &CancellationToken) -> Result<String> {
        // BLPOP with timeout 0 blocks until an item arrives; cancellation
        // abandons the pooled connection mid-wait.
        let op = async {
            let mut conn = self.conn().await?;
            let reply: Option<(String, String)> = deadpool_redis::redis::cmd("BLPOP")
                .arg(&self.key)
                .arg(0)
                .query_async(&mut conn)
                .await
                .map_err(|e| CrawlError::Frontier(e.to_string()))?;
            match reply {
                Some((_, url)) => Ok(url),
                None => Err(CrawlError::Cancelled),
            }
        };

        tokio::select! {
            result = op => result,
            _ = cancel.cancelled() => Err(CrawlError::Cancelled),
        }
    }

    async fn pop_with_timeout(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let op = async {
            let mut conn = self.conn().await?;
            let reply: Option<(String, String)> = deadpool_redis::redis::cmd("BLPOP")
                .arg(&self.key)
                .arg(timeout.as_secs_f64())
                .query_async(&mut conn)
                .await
                .map_err(|e| CrawlError::Frontier(e.to_string()))?;
            // A nil reply means the server-side wait elapsed.
            Ok(reply.map(|(_, url)| url))
        };

        tokio::select! {
            result = op => result,
            _ = cancel.cancelled() => Err(CrawlError::Cancelled),
        }
    }

    async fn size(&self) -> i64 {
        let result = async {
            let mut conn = self.conn().await?;
            deadpool_redis::redis::cmd("LLEN")
                .arg(&self.key)
                .query_async::<_, i64>(&mut conn)
                .await
                .map_err(|e| CrawlError::Frontier(e.to_string()))
        }
        .await;

        match result {
            Ok(len) => len,
            Err(e) => {
                tracing::warn!("LLEN failed for {}: {}", self.key, e);
                0
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
