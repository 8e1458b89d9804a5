//! HTTP fetcher implementation
//!
//! All page fetching goes through the [`Fetcher`] trait so that tests can
//! substitute canned responses. The real implementation wraps reqwest
//! with a shared token bucket, a redirect cap, and a hard body-size cap.
//! `fetch` never fails outright: every problem is recorded on the
//! returned [`FetchResult`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::redirect;
use tokio_util::sync::CancellationToken;

use super::limiter::TokenBucket;
use crate::config::CrawlOptions;
use crate::{CrawlError, Result};

/// Maximum redirect hops followed before surfacing the response as-is.
const MAX_REDIRECTS: usize = 10;

/// Result of fetching a single URL.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// The URL that was requested.
    pub url: String,

    /// HTTP status code; 0 when the request never completed.
    pub status: u16,

    /// Raw Content-Type header value.
    pub content_type: String,

    /// Response body, read only for 2xx responses and capped at the
    /// configured maximum.
    pub body: Vec<u8>,

    /// Transport-level failure, if any.
    pub error: Option<CrawlError>,
}

impl FetchResult {
    fn failed(url: &str, error: CrawlError) -> Self {
        Self {
            url: url.to_string(),
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Contract between the orchestrator and the HTTP layer.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieves the content at `url`. Never panics or errors; failures
    /// land in [`FetchResult::error`].
    async fn fetch(&self, cancel: &CancellationToken, url: &str) -> FetchResult;

    /// Adjusts the request rate, used when robots.txt declares a
    /// crawl-delay. Implementations without a limiter ignore this.
    async fn set_rate(&self, _rps: f64, _burst: u32) {}
}

/// Rate-limited fetcher backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: TokenBucket,
    max_body_size: usize,
}

impl HttpFetcher {
    /// Builds the HTTP client from the crawl options.
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Ready to fetch
    /// * `Err(CrawlError::Fetch)` - TLS or client construction failed
    pub fn new(opts: &CrawlOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        // Follow up to MAX_REDIRECTS hops; past that, hand back the last
        // redirect response instead of erroring out.
        let policy = redirect::Policy::custom(|attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(opts.user_agent.clone())
            .default_headers(headers)
            .timeout(opts.timeout)
            .redirect(policy)
            .gzip(true)
            .build()
            .map_err(|e| CrawlError::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            limiter: TokenBucket::new(opts.rate_limit, 1),
            max_body_size: opts.max_body_size,
        })
    }

    async fn fetch_once(&self, url: &str) -> FetchResult {
        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => return FetchResult::failed(url, CrawlError::Fetch(e.to_string())),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let mut result = FetchResult {
            url: url.to_string(),
            status,
            content_type,
            body: Vec::new(),
            error: None,
        };

        // Bodies of error responses are never needed downstream.
        if (200..300).contains(&status) {
            match read_body_capped(response, self.max_body_size).await {
                Ok(body) => result.body = body,
                Err(e) => result.error = Some(e),
            }
        }

        result
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, cancel: &CancellationToken, url: &str) -> FetchResult {
        if let Err(e) = self.limiter.acquire(cancel).await {
            return FetchResult::failed(url, e);
        }

        tokio::select! {
            result = self.fetch_once(url) => result,
            _ = cancel.cancelled() => FetchResult::failed(url, CrawlError::Cancelled),
        }
    }

    async fn set_rate(&self, rps: f64, burst: u32) {
        tracing::info!("Adjusting request rate to {:.3} req/s", rps);
        self.limiter.set_rate(rps, burst).await;
    }
}

/// Reads a response body up to `limit` bytes, truncating silently.
///
/// The cap is enforced on bytes actually received, so a lying or absent
/// Content-Length header cannot exhaust memory.
pub(crate) async fn read_body_capped(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>> {
    let mut body: Vec<u8> = Vec::new();

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let remaining = limit - body.len();
                if chunk.len() >= remaining {
                    body.extend_from_slice(&chunk[..remaining]);
                    return Ok(body);
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => return Ok(body),
            Err(e) => return Err(CrawlError::Fetch(e.to_string())),
        }
    }
}

/// Fetcher returning canned responses, for tests.
///
/// URLs with no registered response get a bare 404. Every call is logged
/// so tests can assert on what was (not) fetched.
pub struct MockFetcher {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, FetchResult>,
    calls: Vec<String>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockState::default()),
        }
    }

    /// Registers a full response for a URL.
    pub fn add_response(&self, url: &str, result: FetchResult) {
        let mut state = self.inner.lock().expect("mock lock poisoned");
        state.responses.insert(url.to_string(), result);
    }

    /// Registers a 200 text/html response with the given body.
    pub fn add_html(&self, url: &str, html: &str) {
        self.add_response(
            url,
            FetchResult {
                url: url.to_string(),
                status: 200,
                content_type: "text/html".to_string(),
                body: html.as_bytes().to_vec(),
                error: None,
            },
        );
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().expect("mock lock poisoned").calls.clone()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, _cancel: &CancellationToken, url: &str) -> FetchResult {
        let mut state = self.inner.lock().expect("mock lock poisoned");
        state.calls.push(url.to_string());

        match state.responses.get(url) {
            Some(result) => result.clone(),
            None => FetchResult {
                url: url.to_string(),
                status: 404,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_options() -> CrawlOptions {
        CrawlOptions {
            rate_limit: 1000.0,
            user_agent: "TestBot/1.0".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", "TestBot/1.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html></html>")
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_options()).unwrap();
        let cancel = CancellationToken::new();
        let result = fetcher.fetch(&cancel, &format!("{}/page", server.uri())).await;

        assert!(result.error.is_none());
        assert_eq!(result.status, 200);
        assert_eq!(result.content_type, "text/html; charset=utf-8");
        assert_eq!(result.body, b"<html></html>");
    }

    #[tokio::test]
    async fn test_non_2xx_body_not_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_options()).unwrap();
        let cancel = CancellationToken::new();
        let result = fetcher
            .fetch(&cancel, &format!("{}/missing", server.uri()))
            .await;

        assert!(result.error.is_none());
        assert_eq!(result.status, 404);
        assert!(result.body.is_empty());
    }

    #[tokio::test]
    async fn test_body_cap_truncates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("x".repeat(4096))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let opts = CrawlOptions {
            max_body_size: 1024,
            ..test_options()
        };
        let fetcher = HttpFetcher::new(&opts).unwrap();
        let cancel = CancellationToken::new();
        let result = fetcher.fetch(&cancel, &format!("{}/big", server.uri())).await;

        assert!(result.error.is_none());
        assert_eq!(result.body.len(), 1024);
    }

    #[tokio::test]
    async fn test_connection_error_recorded() {
        let fetcher = HttpFetcher::new(&test_options()).unwrap();
        let cancel = CancellationToken::new();
        let result = fetcher.fetch(&cancel, "http://127.0.0.1:9/page").await;

        assert!(matches!(result.error, Some(CrawlError::Fetch(_))));
        assert_eq!(result.status, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let fetcher = HttpFetcher::new(&test_options()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // The bucket starts with one free token, so drain it first to force
        // the limiter wait where cancellation is observed.
        let _ = fetcher.fetch(&cancel, "http://127.0.0.1:9/a").await;
        let result = fetcher.fetch(&cancel, "http://127.0.0.1:9/b").await;
        assert_eq!(result.error, Some(CrawlError::Cancelled));
    }

    #[tokio::test]
    async fn test_redirects_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/end"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/end"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("arrived")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_options()).unwrap();
        let cancel = CancellationToken::new();
        let result = fetcher
            .fetch(&cancel, &format!("{}/start", server.uri()))
            .await;

        assert_eq!(result.status, 200);
        assert_eq!(result.body, b"arrived");
    }

    #[tokio::test]
    async fn test_mock_fetcher_canned_and_default() {
        let mock = MockFetcher::new();
        mock.add_html("https://example.com/", "<html></html>");
        let cancel = CancellationToken::new();

        let hit = mock.fetch(&cancel, "https://example.com/").await;
        assert_eq!(hit.status, 200);
        assert_eq!(hit.content_type, "text/html");

        let miss = mock.fetch(&cancel, "https://example.com/other").await;
        assert_eq!(miss.status, 404);

        assert_eq!(
            mock.calls(),
            vec!["https://example.com/", "https://example.com/other"]
        );
    }
}
