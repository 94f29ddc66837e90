//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{CrawlRun, GlobalStats, Site, SiteStats, SqliteStore};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Number of crawl runs listed by `status`
const RECENT_RUNS: usize = 5;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub embedding_backend: String,
    pub embedding_model: String,
    pub db_stats: GlobalStats,
    pub sites: Vec<Site>,
    pub site: Option<SiteStatus>,
    pub recent_runs: Vec<CrawlRun>,
}

/// Detail for one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatus {
    pub site: Site,
    pub stats: SiteStats,
}

/// Get system status, with per-site detail when `site_id` is given
pub async fn cmd_status(
    config: &Config,
    store: &SqliteStore,
    site_id: Option<&str>,
) -> Result<StatusInfo> {
    info!("Getting status");

    let site = match site_id {
        Some(id) => Some(SiteStatus {
            site: store.require_site(id).await?,
            stats: store.get_site_stats(id).await?,
        }),
        None => None,
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        embedding_backend: config.embedding.backend_url.clone(),
        embedding_model: config.embedding.model.clone(),
        db_stats: store.get_global_stats().await?,
        sites: store.list_sites().await?,
        site,
        recent_runs: store.latest_crawl_runs(site_id, RECENT_RUNS).await?,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 sitegraph Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!(
        "Embedding: {} via {}",
        status.embedding_model, status.embedding_backend
    );

    println!("\nDatabase Stats:");
    println!("  Sites: {}", status.db_stats.site_count);
    println!("  Pages: {}", status.db_stats.page_count);
    println!("  Links: {}", status.db_stats.link_count);

    match &status.site {
        Some(detail) => {
            let stats = &detail.stats;
            println!("\nSite '{}' ({})", detail.site.id, detail.site.root_url);
            println!(
                "  Pages: {} ({} crawled, {} failed, {} pending)",
                stats.page_count, stats.crawled_count, stats.failed_count, stats.pending_count
            );
            println!(
                "  Links: {} internal, {} external",
                stats.link_count, stats.external_link_count
            );
            println!("  Clusters: {}", stats.cluster_count);
            println!("  Orphans: {}", stats.orphan_count);
        }
        None if !status.sites.is_empty() => {
            println!("\nSites:");
            for site in &status.sites {
                println!("  • {} ({})", site.id, site.root_url);
            }
        }
        None => {
            println!("\nNo sites crawled yet. Use 'sitegraph crawl <url>' to start.");
        }
    }

    if !status.recent_runs.is_empty() {
        println!("\nRecent crawls:");
        for run in &status.recent_runs {
            println!(
                "  {} {} [{}] {} crawled, {} failed{}",
                run.started_at,
                run.site_id,
                run.state,
                run.pages_crawled,
                run.pages_failed,
                run.stop_reason
                    .as_deref()
                    .map(|r| format!(" ({})", r))
                    .unwrap_or_default()
            );
        }
    }
}
