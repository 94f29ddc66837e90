//! Page importance over the internal link graph
//!
//! Two scores per page:
//! - `pr`: classic PageRank with a uniform teleport
//! - `tspr`: topic-sensitive PageRank whose teleport is restricted to the
//!   pillar pages, the best linked pages of each cluster

mod pagerank;

pub use pagerank::*;

use crate::config::RankConfig;
use crate::error::{Error, Result};
use crate::store::{GraphStore, PageRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scores of one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageScore {
    pub page_id: String,
    pub url: String,
    pub pr: f64,
    pub tspr: f64,
    pub in_degree: usize,
    pub cluster_id: Option<String>,
    pub is_pillar: bool,
}

/// Outcome of [`RankEngine::run`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankResult {
    pub site_id: String,
    pub scores: Vec<PageScore>,
    /// Pillar URLs grouped by cluster id
    pub pillars: BTreeMap<String, Vec<String>>,
    pub avg_pr: f64,
    pub avg_tspr: f64,
    pub iterations_pr: usize,
    pub iterations_tspr: usize,
    pub converged: bool,
}

pub struct RankEngine {
    store: Arc<dyn GraphStore>,
    config: RankConfig,
}

impl RankEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: RankConfig) -> Self {
        Self { store, config }
    }

    /// Compute and persist `pr` and `tspr` for every page of `site_id`.
    ///
    /// Requires a prior clustering run: without clustered pages there are no
    /// pillars to seed the topic-sensitive pass and this fails with
    /// [`Error::PreconditionNotMet`].
    pub async fn run(&self, site_id: &str) -> Result<RankResult> {
        let pages = self.store.list_pages(site_id).await?;
        if !pages.iter().any(|p| p.cluster_id.is_some()) {
            return Err(Error::PreconditionNotMet(format!(
                "no clustered pages for site '{}'; run clustering first",
                site_id
            )));
        }

        let mut graph = LinkGraph::new(pages.iter().map(|p| p.url.clone()));
        for link in self.store.list_links(site_id).await? {
            graph.add_edge(&link.from_url, &link.to_url);
        }
        debug!(
            "Link graph for {}: {} pages, {} edges",
            site_id,
            graph.len(),
            graph.edge_count()
        );

        let pillars = select_pillars(&pages, &graph, self.config.pillars_per_cluster);
        let pillar_nodes: Vec<usize> = pillars
            .values()
            .flatten()
            .filter_map(|url| graph.index_of(url))
            .collect();
        if pillar_nodes.is_empty() {
            return Err(Error::PreconditionNotMet(format!(
                "no pillar pages found for site '{}'; run clustering first",
                site_id
            )));
        }

        let n = graph.len();
        let pr = pagerank(
            &graph,
            &uniform_teleport(n),
            self.config.damping,
            self.config.tolerance,
            self.config.max_iterations,
        );
        let tspr = pagerank(
            &graph,
            &seeded_teleport(n, &pillar_nodes),
            self.config.damping,
            self.config.tolerance,
            self.config.max_iterations,
        );
        let converged = pr.converged && tspr.converged;
        if !converged {
            warn!(
                "PageRank did not converge within {} iterations",
                self.config.max_iterations
            );
        }

        let scores: Vec<PageScore> = pages
            .iter()
            .map(|page| {
                let node = graph.index_of(&page.url).unwrap_or_default();
                PageScore {
                    page_id: page.id.clone(),
                    url: page.url.clone(),
                    pr: pr.scores[node],
                    tspr: tspr.scores[node].max(0.0),
                    in_degree: graph.in_degree(node),
                    cluster_id: page.cluster_id.clone(),
                    is_pillar: pillar_nodes.contains(&node),
                }
            })
            .collect();

        self.store.save_rank_scores(site_id, &scores).await?;

        let avg_pr = scores.iter().map(|s| s.pr).sum::<f64>() / n as f64;
        let avg_tspr = scores.iter().map(|s| s.tspr).sum::<f64>() / n as f64;

        info!(
            "Ranked {} pages of {} ({} pillars): avg pr {:.6}, avg tspr {:.6}",
            n,
            site_id,
            pillar_nodes.len(),
            avg_pr,
            avg_tspr
        );

        Ok(RankResult {
            site_id: site_id.to_string(),
            scores,
            pillars,
            avg_pr,
            avg_tspr,
            iterations_pr: pr.iterations,
            iterations_tspr: tspr.iterations,
            converged,
        })
    }
}

/// Top `per_cluster` pages of each cluster by internal in-degree, ties by URL
pub fn select_pillars(
    pages: &[PageRecord],
    graph: &LinkGraph,
    per_cluster: usize,
) -> BTreeMap<String, Vec<String>> {
    let mut members: BTreeMap<String, Vec<(usize, &str)>> = BTreeMap::new();
    for page in pages {
        let (Some(cluster), Some(node)) = (&page.cluster_id, graph.index_of(&page.url)) else {
            continue;
        };
        members
            .entry(cluster.clone())
            .or_default()
            .push((graph.in_degree(node), page.url.as_str()));
    }

    members
        .into_iter()
        .map(|(cluster, mut pages)| {
            pages.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
            let urls = pages
                .into_iter()
                .take(per_cluster)
                .map(|(_, url)| url.to_string())
                .collect();
            (cluster, urls)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parse::ExtractedPage;
    use crate::store::{ClusterAssignment, ClusterRecord, LinkRecord, Site, SqliteStore};
    use tempfile::TempDir;

    const URLS: [&str; 5] = [
        "https://x.test/",
        "https://x.test/a",
        "https://x.test/b",
        "https://x.test/c",
        "https://x.test/d",
    ];

    async fn linked_store() -> (SqliteStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("rank.db");
        let store = SqliteStore::connect(&config).await.unwrap();
        store.init_schema().await.unwrap();
        store
            .upsert_site(&Site::new("site", URLS[0]))
            .await
            .unwrap();

        for url in URLS {
            let page = ExtractedPage {
                text: format!("content of {url}"),
                ..Default::default()
            };
            let record = crate::store::PageRecord::crawled("site", url, 0, 200, &page);
            store.upsert_page(&record).await.unwrap();
        }

        // d is a dangling page; b links to itself
        let edges = [
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 0),
            (2, 0),
            (2, 2),
            (3, 4),
            (1, 2),
        ];
        for (from, to) in edges {
            let link = LinkRecord {
                from_url: URLS[from].to_string(),
                to_url: URLS[to].to_string(),
                anchor_text: String::new(),
            };
            store.upsert_link("site", &link).await.unwrap();
        }

        (store, tmp)
    }

    async fn assign_clusters(store: &SqliteStore, groups: &[&[usize]]) {
        let records: Vec<ClusterRecord> = groups
            .iter()
            .enumerate()
            .map(|(i, members)| ClusterRecord::new("site", i, &[0.0], members.len()).unwrap())
            .collect();
        let assignments: Vec<ClusterAssignment> = groups
            .iter()
            .enumerate()
            .flat_map(|(i, members)| {
                let cluster_id = records[i].id.clone();
                members.iter().map(move |&m| ClusterAssignment {
                    page_id: crate::crawl::page_id_for_url(URLS[m]),
                    cluster_id: cluster_id.clone(),
                })
            })
            .collect();
        store
            .replace_clusters("site", &records, &assignments)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ranking_requires_clusters() {
        let (store, _tmp) = linked_store().await;
        let engine = RankEngine::new(Arc::new(store), RankConfig::default());

        let err = engine.run("site").await.unwrap_err();
        assert!(matches!(err, Error::PreconditionNotMet(_)));
        assert!(err.to_string().contains("run clustering first"));
    }

    #[tokio::test]
    async fn test_scores_sum_to_one_and_persist() {
        let (store, _tmp) = linked_store().await;
        assign_clusters(&store, &[&[0, 1, 2], &[3, 4]]).await;

        let engine = RankEngine::new(Arc::new(store.clone()), RankConfig::default());
        let result = engine.run("site").await.unwrap();

        let pr_sum: f64 = result.scores.iter().map(|s| s.pr).sum();
        let tspr_sum: f64 = result.scores.iter().map(|s| s.tspr).sum();
        assert!((pr_sum - 1.0).abs() < 1e-3);
        assert!((tspr_sum - 1.0).abs() < 1e-3);
        assert!(result.scores.iter().all(|s| s.tspr >= 0.0));
        assert!((result.avg_pr - 0.2).abs() < 1e-3);
        assert!(result.iterations_pr > 0 && result.iterations_tspr > 0);

        let pages = store.list_pages("site").await.unwrap();
        assert!(pages.iter().all(|p| p.pr.is_some() && p.tspr.is_some()));

        let top = store.top_pages("site", 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_pillars_by_in_degree_with_url_ties() {
        let (store, _tmp) = linked_store().await;
        assign_clusters(&store, &[&[0, 1, 2], &[3, 4]]).await;

        let config = RankConfig {
            pillars_per_cluster: 1,
            ..RankConfig::default()
        };
        let result = RankEngine::new(Arc::new(store), config)
            .run("site")
            .await
            .unwrap();

        // Home and b both have in-degree 2 (b's self-link does not count)
        assert_eq!(result.pillars["site-cluster-1"], vec![URLS[0].to_string()]);
        // c and d both have in-degree 1; the URL breaks the tie
        assert_eq!(result.pillars["site-cluster-2"], vec![URLS[3].to_string()]);

        let pillar_count = result.scores.iter().filter(|s| s.is_pillar).count();
        assert_eq!(pillar_count, 2);
    }
}
