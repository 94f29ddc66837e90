//! HTTP fetching for the crawler

use super::{HostRateLimiter, RobotsRules};
use crate::config::CrawlConfig;
use crate::error::{Error, FetchErrorKind, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Raw HTML retrieved for a URL
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status_code: u16,
    pub html: String,
}

/// Fetches pages with a fixed user agent, a bounded timeout and per-host
/// politeness. Never retries; a failure is reported once and the caller
/// moves on.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    user_agent: String,
    respect_robots_txt: bool,
    robots_cache: Arc<RwLock<HashMap<String, RobotsRules>>>,
    rate_limiter: HostRateLimiter,
}

impl Fetcher {
    /// Create a new fetcher
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            respect_robots_txt: config.respect_robots_txt,
            robots_cache: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter: HostRateLimiter::new(config.rate_limit_per_host),
        })
    }

    /// Fetch a single URL
    ///
    /// Non-2xx answers, timeouts, connection failures and robots.txt denials
    /// all come back as [`Error::Fetch`].
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed_url = Url::parse(url)
            .map_err(|e| Error::fetch(url, FetchErrorKind::Other(e.to_string())))?;
        let host = parsed_url
            .host_str()
            .ok_or_else(|| Error::fetch(url, FetchErrorKind::Other("URL has no host".to_string())))?
            .to_string();

        if self.respect_robots_txt {
            let rules = self.robots_for(&host, &parsed_url).await;
            if !rules.is_allowed(url, &self.user_agent) {
                return Err(Error::fetch(url, FetchErrorKind::Disallowed));
            }
        }

        self.rate_limiter.wait(&host).await;

        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, classify(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, FetchErrorKind::Status(status.as_u16())));
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| Error::fetch(url, classify(&e)))?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status_code: status.as_u16(),
            html,
        })
    }

    async fn robots_for(&self, host: &str, url: &Url) -> RobotsRules {
        {
            let cache = self.robots_cache.read().await;
            if let Some(rules) = cache.get(host) {
                return rules.clone();
            }
        }

        let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        let robots_url = format!("{}://{}{}/robots.txt", url.scheme(), host, port);
        debug!("Fetching robots.txt from {}", robots_url);

        let rules = match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                let text = response.text().await.unwrap_or_default();
                RobotsRules::parse(&text)
            }
            // No robots.txt or error - allow all
            _ => RobotsRules::allow_all(),
        };

        let mut cache = self.robots_cache.write().await;
        cache.insert(host.to_string(), rules.clone());
        rules
    }
}

fn classify(err: &reqwest::Error) -> FetchErrorKind {
    if err.is_timeout() {
        FetchErrorKind::Timeout
    } else if err.is_connect() {
        FetchErrorKind::Connect
    } else if let Some(status) = err.status() {
        FetchErrorKind::Status(status.as_u16())
    } else {
        FetchErrorKind::Other(err.to_string())
    }
}
