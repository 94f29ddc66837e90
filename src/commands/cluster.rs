//! Cluster command implementation

use crate::cluster::ClusterEngine;
use crate::config::Config;
use crate::embed::create_embedder;
use crate::error::Result;
use crate::store::{ClusterSummary, SqliteStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Outcome of a clustering run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStats {
    pub site_id: String,
    pub k: usize,
    pub pages_clustered: usize,
    pub embedded: usize,
    pub cached: usize,
    pub iterations: usize,
    pub clusters: Vec<ClusterSummary>,
}

/// Embed and cluster the crawled pages of `site_id` into `k` groups
/// (`cluster.default_k` when not given).
pub async fn cmd_cluster(
    config: &Config,
    store: &SqliteStore,
    site_id: &str,
    k: Option<usize>,
) -> Result<ClusterStats> {
    store.require_site(site_id).await?;
    let k = k.unwrap_or(config.cluster.default_k);

    let embedder = create_embedder(&config.embedding)?;
    let engine = ClusterEngine::new(
        Arc::new(store.clone()),
        embedder,
        config.embedding.clone(),
        config.cluster.clone(),
    );
    let result = engine.run(site_id, k).await?;
    info!(
        "Clustered {} pages of '{}' into {} clusters",
        result.assignments.len(),
        site_id,
        result.clusters.len()
    );

    Ok(ClusterStats {
        site_id: site_id.to_string(),
        k,
        pages_clustered: result.assignments.len(),
        embedded: result.embedded,
        cached: result.cached,
        iterations: result.iterations,
        clusters: store.cluster_summaries(site_id).await?,
    })
}

/// Page count and average tspr of every cluster of `site_id`
pub async fn cmd_clusters(store: &SqliteStore, site_id: &str) -> Result<Vec<ClusterSummary>> {
    store.require_site(site_id).await?;
    store.cluster_summaries(site_id).await
}

pub fn print_cluster_stats(stats: &ClusterStats) {
    println!("\n✓ Clustering of '{}' complete", stats.site_id);
    println!("  Pages clustered: {}", stats.pages_clustered);
    println!(
        "  Embeddings: {} new, {} cached",
        stats.embedded, stats.cached
    );
    println!("  K-means iterations: {}", stats.iterations);
    print_cluster_summaries(&stats.clusters);
}

pub fn print_cluster_summaries(clusters: &[ClusterSummary]) {
    if clusters.is_empty() {
        println!("\nNo clusters. Run 'sitegraph cluster --site <id>' first.");
        return;
    }

    println!("\n🧩 Clusters\n");
    for cluster in clusters {
        let avg = cluster
            .avg_tspr
            .map(|v| format!("{:.6}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:>5} pages   avg tspr {}",
            cluster.label, cluster.page_count, avg
        );
    }
}
