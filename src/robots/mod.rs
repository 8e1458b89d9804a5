//! Robots.txt fetching and policy checks
//!
//! The crawler targets a single host, so robots.txt is fetched exactly
//! once at startup and the parsed policy is then queried concurrently by
//! every worker. Fetching is best-effort: any failure, non-200 status, or
//! unreadable body leaves the checker in permissive mode.

mod parser;

use std::sync::RwLock;
use std::time::Duration;

use robotstxt::DefaultMatcher;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{CrawlError, Result};

/// Body cap for robots.txt itself.
const MAX_ROBOTS_BODY: usize = 512 * 1024;

/// Single-writer, many-reader robots.txt policy holder.
pub struct RobotsChecker {
    user_agent: String,
    state: RwLock<RobotsState>,
}

#[derive(Default)]
struct RobotsState {
    /// Raw robots.txt body; `None` means allow everything.
    body: Option<String>,
    crawl_delay: Option<Duration>,
}

impl RobotsChecker {
    /// Creates a checker in permissive mode for the given user agent.
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            state: RwLock::new(RobotsState::default()),
        }
    }

    /// Fetches and installs `scheme://host/robots.txt` for the seed URL.
    ///
    /// Always returns `Ok` unless the base URL itself is malformed: a site
    /// without a usable robots.txt is crawled permissively.
    pub async fn fetch(&self, cancel: &CancellationToken, base_url: &str) -> Result<()> {
        let base = Url::parse(base_url).map_err(|e| CrawlError::UrlParse(e.to_string()))?;
        let host = base
            .host_str()
            .ok_or_else(|| CrawlError::UrlParse(format!("URL has no host: {}", base_url)))?;

        let robots_url = match base.port() {
            Some(port) => format!("{}://{}:{}/robots.txt", base.scheme(), host, port),
            None => format!("{}://{}/robots.txt", base.scheme(), host),
        };

        tracing::debug!("Fetching robots.txt from {}", robots_url);

        let body = tokio::select! {
            body = fetch_robots_body(&robots_url, &self.user_agent) => body,
            _ = cancel.cancelled() => None,
        };

        let mut state = self.state.write().expect("robots lock poisoned");
        match body {
            Some(content) => {
                state.crawl_delay = parser::crawl_delay(&content, &self.user_agent)
                    .filter(|secs| *secs > 0.0)
                    .map(Duration::from_secs_f64);
                state.body = Some(content);
                tracing::debug!(
                    "Installed robots.txt policy (crawl delay: {:?})",
                    state.crawl_delay
                );
            }
            None => {
                state.body = None;
                state.crawl_delay = None;
                tracing::debug!("No usable robots.txt, crawling permissively");
            }
        }

        Ok(())
    }

    /// Checks whether the configured user agent may fetch `url`.
    ///
    /// Permissive when no policy is installed; `false` when the URL cannot
    /// be parsed.
    pub fn is_allowed(&self, url: &str) -> bool {
        let state = self.state.read().expect("robots lock poisoned");

        let Some(body) = &state.body else {
            return true;
        };

        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(body, &self.user_agent, parsed.as_str())
    }

    /// The declared crawl delay, or zero when none applies.
    pub fn crawl_delay(&self) -> Duration {
        self.state
            .read()
            .expect("robots lock poisoned")
            .crawl_delay
            .unwrap_or(Duration::ZERO)
    }
}

/// Downloads robots.txt, returning `None` on any failure or non-200 status.
async fn fetch_robots_body(robots_url: &str, user_agent: &str) -> Option<String> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(10))
        .build()
        .ok()?;

    let response = match client.get(robots_url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!("robots.txt fetch failed: {}", e);
            return None;
        }
    };

    if response.status() != reqwest::StatusCode::OK {
        tracing::debug!("robots.txt returned status {}", response.status());
        return None;
    }

    let bytes = crate::crawler::read_body_capped(response, MAX_ROBOTS_BODY)
        .await
        .ok()?;

    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn checker_for(server: &MockServer, user_agent: &str) -> RobotsChecker {
        let checker = RobotsChecker::new(user_agent);
        let cancel = CancellationToken::new();
        checker.fetch(&cancel, &server.uri()).await.unwrap();
        checker
    }

    #[tokio::test]
    async fn test_disallow_rules_applied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "User-agent: TestBot\nDisallow: /blocked/\nDisallow: /private/\nCrawl-delay: 2\n\nUser-agent: *\nDisallow: /admin\n",
            ))
            .mount(&server)
            .await;

        let checker = checker_for(&server, "TestBot").await;
        let base = server.uri();

        assert!(checker.is_allowed(&format!("{}/", base)));
        assert!(checker.is_allowed(&format!("{}/page", base)));
        assert!(!checker.is_allowed(&format!("{}/blocked/", base)));
        assert!(!checker.is_allowed(&format!("{}/blocked/page", base)));
        assert!(!checker.is_allowed(&format!("{}/private/x", base)));
        // Only TestBot's own group applies, so the * rules do not.
        assert!(checker.is_allowed(&format!("{}/admin", base)));

        assert_eq!(checker.crawl_delay(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wildcard_group_for_other_agents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "User-agent: SomeoneElse\nDisallow: /\n\nUser-agent: *\nDisallow: /admin\n",
            ))
            .mount(&server)
            .await;

        let checker = checker_for(&server, "TestBot").await;
        let base = server.uri();

        assert!(checker.is_allowed(&format!("{}/page", base)));
        assert!(!checker.is_allowed(&format!("{}/admin", base)));
    }

    #[tokio::test]
    async fn test_missing_robots_is_permissive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let checker = checker_for(&server, "TestBot").await;

        assert!(checker.is_allowed(&format!("{}/anything", server.uri())));
        assert_eq!(checker.crawl_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_permissive() {
        let checker = RobotsChecker::new("TestBot");
        let cancel = CancellationToken::new();
        // Nothing listens on this port.
        checker
            .fetch(&cancel, "http://127.0.0.1:9/")
            .await
            .unwrap();

        assert!(checker.is_allowed("http://127.0.0.1:9/page"));
    }

    #[tokio::test]
    async fn test_unparseable_url_is_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /x\n"))
            .mount(&server)
            .await;

        let checker = checker_for(&server, "TestBot").await;
        assert!(!checker.is_allowed("::not a url::"));
    }

    #[tokio::test]
    async fn test_no_fetch_means_allow_all() {
        let checker = RobotsChecker::new("TestBot");
        assert!(checker.is_allowed("https://example.com/anywhere"));
        assert_eq!(checker.crawl_delay(), Duration::ZERO);
    }
}
