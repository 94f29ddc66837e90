//! Rank command implementation

use crate::config::Config;
use crate::error::Result;
use crate::rank::RankEngine;
use crate::store::{SqliteStore, TopPage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of a ranking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankStats {
    pub site_id: String,
    pub pages_ranked: usize,
    pub avg_pr: f64,
    pub avg_tspr: f64,
    pub iterations_pr: usize,
    pub iterations_tspr: usize,
    pub converged: bool,
    pub pillars: BTreeMap<String, Vec<String>>,
    pub top_pages: Vec<TopPage>,
}

/// Compute pr/tspr for `site_id` and report the `limit` best pages by tspr
pub async fn cmd_rank(
    config: &Config,
    store: &SqliteStore,
    site_id: &str,
    limit: usize,
) -> Result<RankStats> {
    store.require_site(site_id).await?;

    let engine = RankEngine::new(Arc::new(store.clone()), config.rank.clone());
    let result = engine.run(site_id).await?;

    Ok(RankStats {
        site_id: site_id.to_string(),
        pages_ranked: result.scores.len(),
        avg_pr: result.avg_pr,
        avg_tspr: result.avg_tspr,
        iterations_pr: result.iterations_pr,
        iterations_tspr: result.iterations_tspr,
        converged: result.converged,
        pillars: result.pillars,
        top_pages: store.top_pages(site_id, limit).await?,
    })
}

pub fn print_rank_stats(stats: &RankStats) {
    println!("\n✓ Ranked {} pages of '{}'", stats.pages_ranked, stats.site_id);
    println!("  Average PageRank: {:.6}", stats.avg_pr);
    println!("  Average TSPR: {:.6}", stats.avg_tspr);
    println!(
        "  Iterations: {} (pr), {} (tspr){}",
        stats.iterations_pr,
        stats.iterations_tspr,
        if stats.converged { "" } else { ", not converged" }
    );

    println!("\n📌 Pillar pages\n");
    for (cluster, urls) in &stats.pillars {
        println!("  {}", cluster);
        for url in urls {
            println!("    • {}", url);
        }
    }

    if stats.top_pages.is_empty() {
        return;
    }

    println!("\n🏆 Top pages by TSPR\n");
    for (i, page) in stats.top_pages.iter().enumerate() {
        let title = if page.title.is_empty() {
            "(untitled)"
        } else {
            page.title.as_str()
        };
        println!(
            "{:>3}. {:.6}  {}  [{} in-links]",
            i + 1,
            page.tspr.unwrap_or_default(),
            title,
            page.in_links
        );
        println!("     {}", page.url);
    }
}
