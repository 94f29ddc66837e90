//! Sitemap XML parsing for seeding crawls
//!
//! Supports:
//! - Standard sitemap.xml format
//! - Sitemap index files (sitemapindex)
//! - Plain text URL lists

use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Well-known sitemap locations tried when none is given
const DEFAULT_SITEMAP_PATHS: [&str; 2] = ["/sitemap.xml", "/sitemap_index.xml"];

/// Sitemap parser
pub struct SitemapParser {
    client: Client,
    max_sitemaps: usize,
}

/// Result of parsing a sitemap
#[derive(Debug, PartialEq)]
enum ParseResult {
    /// A urlset containing page URLs
    UrlSet(Vec<String>),
    /// A sitemap index containing links to other sitemaps
    SitemapIndex(Vec<String>),
}

impl SitemapParser {
    /// Create a new sitemap parser
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            // Limit recursion for sitemap indexes
            max_sitemaps: 50,
        })
    }

    /// Resolve seed URLs for `start_url` from the site's well-known sitemaps.
    ///
    /// Only URLs on the start URL's host are returned, at most `limit` of them.
    /// A site without a sitemap yields an empty list.
    pub async fn discover_seeds(&self, start_url: &str, limit: usize) -> Result<Vec<String>> {
        let start = Url::parse(start_url)?;
        let mut seeds = Vec::new();

        for sitemap_path in DEFAULT_SITEMAP_PATHS {
            let sitemap_url = start.join(sitemap_path)?;
            for loc in self.parse(sitemap_url.as_str()).await? {
                let same_host = Url::parse(&loc)
                    .map(|u| u.host_str() == start.host_str())
                    .unwrap_or(false);
                if same_host && !seeds.contains(&loc) {
                    seeds.push(loc);
                }
                if seeds.len() >= limit {
                    return Ok(seeds);
                }
            }
            if !seeds.is_empty() {
                break;
            }
        }

        info!("Resolved {} sitemap seeds for {}", seeds.len(), start_url);
        Ok(seeds)
    }

    /// Parse a sitemap URL and return all page URLs
    pub async fn parse(&self, sitemap_url: &str) -> Result<Vec<String>> {
        debug!("Parsing sitemap: {}", sitemap_url);

        let mut all_entries = Vec::new();
        let mut sitemaps_processed = 0;
        let mut sitemap_queue = vec![sitemap_url.to_string()];

        while let Some(url) = sitemap_queue.pop() {
            if sitemaps_processed >= self.max_sitemaps {
                warn!("Reached max sitemap limit ({}), stopping", self.max_sitemaps);
                break;
            }

            match self.fetch_and_parse(&url).await {
                Ok(ParseResult::UrlSet(entries)) => {
                    debug!("Found {} URLs in sitemap: {}", entries.len(), url);
                    all_entries.extend(entries);
                }
                Ok(ParseResult::SitemapIndex(sitemaps)) => {
                    debug!("Found sitemap index with {} sitemaps: {}", sitemaps.len(), url);
                    sitemap_queue.extend(sitemaps);
                }
                Err(e) => {
                    debug!("Skipping sitemap {}: {}", url, e);
                }
            }

            sitemaps_processed += 1;
        }

        Ok(all_entries)
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<ParseResult> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Parse(format!(
                "sitemap {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let content = response.text().await?;
        Ok(parse_sitemap(&content))
    }
}

fn parse_sitemap(content: &str) -> ParseResult {
    if content.contains("<sitemapindex") {
        ParseResult::SitemapIndex(extract_locs(content, "sitemap"))
    } else if content.contains("<urlset") {
        ParseResult::UrlSet(extract_locs(content, "url"))
    } else {
        ParseResult::UrlSet(
            content
                .lines()
                .map(str::trim)
                .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
                .filter(|line| Url::parse(line).is_ok())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Collect the valid `<loc>` of every `<block>` element
fn extract_locs(content: &str, block: &str) -> Vec<String> {
    let open = format!("<{}>", block);
    let close = format!("</{}>", block);

    content
        .split(open.as_str())
        .skip(1)
        .filter_map(|chunk| chunk.find(close.as_str()).map(|end| &chunk[..end]))
        .filter_map(|chunk| extract_tag(chunk, "loc"))
        .filter(|loc| Url::parse(loc).is_ok())
        .collect()
}

/// Extract text content from an XML tag
fn extract_tag(content: &str, tag: &str) -> Option<String> {
    let start_tag = format!("<{}>", tag);
    let end_tag = format!("</{}>", tag);

    content.find(&start_tag).and_then(|start| {
        let value_start = start + start_tag.len();
        content[value_start..]
            .find(&end_tag)
            .map(|end| content[value_start..value_start + end].trim().to_string())
    })
}
