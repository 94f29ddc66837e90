//! Crawl command implementation

use crate::config::Config;
use crate::crawl::{normalize_crawl_url, CrawlController, CrawlReport, CrawlRequest, Fetcher, SitemapParser};
use crate::error::{Error, Result};
use crate::progress::track_crawl;
use crate::store::SqliteStore;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Per-invocation overrides of the `[crawl]` config section
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Site id; derived from the URL host when absent
    pub site_id: Option<String>,
    pub max_depth: Option<u32>,
    pub max_pages: Option<u32>,
    /// Seed the frontier from the site's sitemap
    pub use_sitemap: bool,
    pub show_progress: bool,
}

/// Default site id for a URL: its lowercase host, plus the port if one is given
pub fn site_id_for_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Config(format!("URL has no host: {}", url)))?
        .to_lowercase();
    Ok(match parsed.port() {
        Some(port) => format!("{}-{}", host, port),
        None => host,
    })
}

/// Crawl `url` to completion. Ctrl-C cancels the crawl and keeps what was stored.
pub async fn cmd_crawl(
    config: &Config,
    store: &SqliteStore,
    url: &str,
    options: CrawlOptions,
) -> Result<CrawlReport> {
    let start_url = normalize_crawl_url(url)
        .ok_or_else(|| Error::Config(format!("Invalid start URL: {}", url)))?;
    let site_id = match options.site_id {
        Some(id) => id,
        None => site_id_for_url(&start_url)?,
    };
    let max_depth = options.max_depth.unwrap_or(config.crawl.max_depth);
    let page_limit = options.max_pages.unwrap_or(config.crawl.max_pages) as usize;

    let extra_seeds = if options.use_sitemap {
        let parser = SitemapParser::new(&config.crawl.user_agent)?;
        match parser.discover_seeds(&start_url, page_limit).await {
            Ok(seeds) => seeds,
            Err(e) => {
                warn!("Sitemap discovery failed for {}: {}", start_url, e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    info!(
        "Crawling {} as site '{}' ({} sitemap seeds)",
        start_url,
        site_id,
        extra_seeds.len()
    );

    let fetcher = Fetcher::new(&config.crawl)?;
    let controller = CrawlController::new(fetcher, Arc::new(store.clone()));
    let handle = controller
        .start(CrawlRequest {
            site_id,
            start_url,
            max_depth,
            page_limit,
            extra_seeds,
        })
        .await?;

    let crawl_id = handle.id().to_string();
    let tracker = options
        .show_progress
        .then(|| track_crawl(handle.subscribe(), page_limit));

    let wait = handle.wait();
    tokio::pin!(wait);
    let report = tokio::select! {
        report = &mut wait => report?,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling crawl {}", crawl_id);
            controller.cancel_crawl(&crawl_id).await?;
            wait.await?
        }
    };

    if let Some(tracker) = tracker {
        let _ = tracker.await;
    }

    Ok(report)
}

pub fn print_crawl_report(report: &CrawlReport) {
    println!("\n✓ Crawl {} of '{}' {}", report.crawl_id, report.site_id, report.state);
    println!("  Pages crawled: {}", report.pages_crawled);
    println!("  Pages failed: {}", report.pages_failed);
    println!("  Orphan pages: {}", report.orphan_count);
    if let Some(reason) = report.stop_reason {
        println!("  Stopped: {}", reason);
    }
}
