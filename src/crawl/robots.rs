//! robots.txt parsing and handling

use robotstxt::DefaultMatcher;
use tracing::debug;

/// Parsed robots.txt rules for one host
#[derive(Debug, Clone)]
pub struct RobotsRules {
    content: String,
}

impl RobotsRules {
    /// Parse robots.txt content
    pub fn parse(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules used when a host serves no robots.txt
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
        }
    }

    /// Check if a URL is allowed for a user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        // Matching works on the product token ("SiteGraph-Crawler"), not "name/version"
        let product = user_agent.split('/').next().unwrap_or(user_agent).trim();

        let mut matcher = DefaultMatcher::default();
        let allowed = matcher.one_agent_allowed_by_robots(&self.content, product, url);

        if !allowed {
            debug!("robots.txt disallows {} for {}", url, product);
        }

        allowed
    }
}
