//! Site graph storage using SQLite
//!
//! This module handles all persistence for the pipeline:
//! - Sites and their pages (upsert by normalized URL)
//! - Internal and external links
//! - Embedding cache, clusters and rank scores
//! - Crawl run history
//!
//! The engines only see the [`GraphStore`] trait; reporting queries used by
//! the CLI live on [`SqliteStore`] directly.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::crawl::{normalize_url, page_id_for_url};
use crate::error::{Error, Result};
use crate::parse::ExtractedPage;
use crate::rank::PageScore;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Crawl status of a page row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pending,
    Crawled,
    Failed,
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStatus::Pending => write!(f, "pending"),
            PageStatus::Crawled => write!(f, "crawled"),
            PageStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PageStatus::Pending),
            "crawled" => Ok(PageStatus::Crawled),
            "failed" => Ok(PageStatus::Failed),
            _ => Err(Error::Other(format!("Unknown page status: {}", s))),
        }
    }
}

/// A crawled property
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub root_url: String,
    pub created_at: String,
}

impl Site {
    pub fn new(id: impl Into<String>, root_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            root_url: root_url.into(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A page of a site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    pub site_id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub word_count: i64,
    pub status: String,
    pub status_code: Option<i64>,
    pub error: Option<String>,
    pub depth: i64,
    pub crawled_at: Option<String>,
    pub cluster_id: Option<String>,
    pub pr: Option<f64>,
    pub tspr: Option<f64>,
    pub is_orphan: bool,
}

impl PageRecord {
    /// Row for a page that was fetched and extracted
    pub fn crawled(
        site_id: &str,
        url: &str,
        depth: u32,
        status_code: u16,
        page: &ExtractedPage,
    ) -> Self {
        let url = normalize_url(url);
        Self {
            id: page_id_for_url(&url),
            site_id: site_id.to_string(),
            url,
            title: page.title.clone(),
            text: page.text.clone(),
            word_count: page.word_count as i64,
            status: PageStatus::Crawled.to_string(),
            status_code: Some(i64::from(status_code)),
            error: None,
            depth: i64::from(depth),
            crawled_at: Some(Utc::now().to_rfc3339()),
            cluster_id: None,
            pr: None,
            tspr: None,
            is_orphan: false,
        }
    }

    /// Row for a page whose fetch failed
    pub fn failed(
        site_id: &str,
        url: &str,
        depth: u32,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        let url = normalize_url(url);
        Self {
            id: page_id_for_url(&url),
            site_id: site_id.to_string(),
            url,
            title: String::new(),
            text: String::new(),
            word_count: 0,
            status: PageStatus::Failed.to_string(),
            status_code: status_code.map(i64::from),
            error: Some(error.into()),
            depth: i64::from(depth),
            crawled_at: Some(Utc::now().to_rfc3339()),
            cluster_id: None,
            pr: None,
            tspr: None,
            is_orphan: false,
        }
    }

    pub fn get_status(&self) -> Result<PageStatus> {
        self.status.parse()
    }
}

/// A directed link between two URLs of a site
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LinkRecord {
    pub from_url: String,
    pub to_url: String,
    pub anchor_text: String,
}

/// A cluster produced by one clustering run
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: String,
    pub site_id: String,
    pub cluster_index: i64,
    pub label: String,
    pub page_count: i64,
    pub centroid_json: String,
    pub created_at: String,
}

impl ClusterRecord {
    /// Cluster `index` (zero-based) of `site_id`; ids and labels are one-based
    pub fn new(site_id: &str, index: usize, centroid: &[f32], page_count: usize) -> Result<Self> {
        let n = index + 1;
        Ok(Self {
            id: format!("{}-cluster-{}", site_id, n),
            site_id: site_id.to_string(),
            cluster_index: index as i64,
            label: format!("Cluster {}", n),
            page_count: page_count as i64,
            centroid_json: serde_json::to_string(centroid)?,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn centroid(&self) -> Vec<f32> {
        serde_json::from_str(&self.centroid_json).unwrap_or_default()
    }
}

/// Assignment of one page to one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub page_id: String,
    pub cluster_id: String,
}

/// A cached page embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub site_id: String,
    pub page_id: String,
    pub content_hash: String,
    pub model: String,
    pub vector: Vec<f32>,
}

#[derive(FromRow)]
struct EmbeddingRow {
    site_id: String,
    page_id: String,
    content_hash: String,
    model: String,
    vector_json: String,
}

/// A crawl run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CrawlRun {
    pub id: String,
    pub site_id: String,
    pub start_url: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub state: String,
    pub pages_crawled: i64,
    pub pages_failed: i64,
    pub stop_reason: Option<String>,
}

impl CrawlRun {
    pub fn new(id: &str, site_id: &str, start_url: &str, state: &str) -> Self {
        Self {
            id: id.to_string(),
            site_id: site_id.to_string(),
            start_url: start_url.to_string(),
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            state: state.to_string(),
            pages_crawled: 0,
            pages_failed: 0,
            stop_reason: None,
        }
    }
}

/// Persistence collaborator used by the crawl, cluster and rank engines.
///
/// Every write is an idempotent upsert so overlapping crawls of the same
/// site can race on a URL without duplicating rows.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_site(&self, site: &Site) -> Result<()>;

    /// Insert or fully update a page row
    async fn upsert_page(&self, page: &PageRecord) -> Result<()>;

    /// Mark a page failed, keeping any content from an earlier successful crawl
    async fn record_failed_page(&self, page: &PageRecord) -> Result<()>;

    /// Insert a `pending` row for a discovered URL unless one already exists
    async fn insert_pending_page(&self, site_id: &str, url: &str, depth: u32) -> Result<()>;

    async fn upsert_link(&self, site_id: &str, link: &LinkRecord) -> Result<()>;

    async fn upsert_external_link(&self, site_id: &str, link: &LinkRecord) -> Result<()>;

    async fn list_pages(&self, site_id: &str) -> Result<Vec<PageRecord>>;

    async fn list_links(&self, site_id: &str) -> Result<Vec<LinkRecord>>;

    async fn get_embedding(&self, site_id: &str, page_id: &str)
        -> Result<Option<StoredEmbedding>>;

    async fn save_embedding(&self, embedding: &StoredEmbedding) -> Result<()>;

    /// Drop every cluster and assignment of the site, then write the new ones
    async fn replace_clusters(
        &self,
        site_id: &str,
        clusters: &[ClusterRecord],
        assignments: &[ClusterAssignment],
    ) -> Result<()>;

    async fn list_clusters(&self, site_id: &str) -> Result<Vec<ClusterRecord>>;

    async fn save_rank_scores(&self, site_id: &str, scores: &[PageScore]) -> Result<()>;

    /// Recompute orphan flags; returns the number of orphan pages
    async fn refresh_orphans(&self, site_id: &str) -> Result<usize>;

    async fn start_crawl_run(&self, run: &CrawlRun) -> Result<()>;

    async fn complete_crawl_run(&self, run: &CrawlRun) -> Result<()>;
}

/// Per-cluster report row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: String,
    pub label: String,
    pub page_count: i64,
    pub avg_tspr: Option<f64>,
}

/// A page in the top-pages report
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TopPage {
    pub url: String,
    pub title: String,
    pub pr: Option<f64>,
    pub tspr: Option<f64>,
    pub cluster_id: Option<String>,
    pub in_links: i64,
}

/// Statistics for a single site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStats {
    pub page_count: usize,
    pub crawled_count: usize,
    pub failed_count: usize,
    pub pending_count: usize,
    pub link_count: usize,
    pub external_link_count: usize,
    pub cluster_count: usize,
    pub orphan_count: usize,
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub site_count: usize,
    pub page_count: usize,
    pub link_count: usize,
}

/// SQLite-backed graph store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_path = &config.paths.db_file;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Open the database at `db_path`, creating the schema if needed
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        let mut config = Config::default();
        config.paths.db_file = db_path.to_path_buf();

        let store = Self::connect(&config).await?;
        if !store.is_initialized().await? {
            store.init_schema().await?;
        }
        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='pages'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Reporting =====

    pub async fn get_site(&self, id: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// Look up a site, failing with [`Error::SiteNotFound`] if it is missing
    pub async fn require_site(&self, id: &str) -> Result<Site> {
        self.get_site(id)
            .await?
            .ok_or_else(|| Error::SiteNotFound(id.to_string()))
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// Crawled pages without inbound internal links
    pub async fn list_orphans(&self, site_id: &str) -> Result<Vec<PageRecord>> {
        let pages = sqlx::query_as::<_, PageRecord>(
            "SELECT * FROM pages WHERE site_id = ? AND is_orphan = 1 ORDER BY url",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pages)
    }

    /// Page count and average tspr per cluster
    pub async fn cluster_summaries(&self, site_id: &str) -> Result<Vec<ClusterSummary>> {
        let summaries = sqlx::query_as::<_, ClusterSummary>(
            r#"
            SELECT c.id, c.label, COUNT(p.id) AS page_count, AVG(p.tspr) AS avg_tspr
            FROM clusters c
            LEFT JOIN pages p ON p.site_id = c.site_id AND p.cluster_id = c.id
            WHERE c.site_id = ?
            GROUP BY c.id, c.label, c.cluster_index
            ORDER BY c.cluster_index
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    /// Ranked pages ordered by tspr, with inbound internal link counts
    pub async fn top_pages(&self, site_id: &str, limit: usize) -> Result<Vec<TopPage>> {
        let pages = sqlx::query_as::<_, TopPage>(
            r#"
            SELECT p.url, p.title, p.pr, p.tspr, p.cluster_id,
                (SELECT COUNT(*) FROM links l
                 WHERE l.site_id = p.site_id AND l.to_url = p.url AND l.from_url != p.url) AS in_links
            FROM pages p
            WHERE p.site_id = ? AND p.tspr IS NOT NULL
            ORDER BY p.tspr DESC, p.url
            LIMIT ?
            "#,
        )
        .bind(site_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(pages)
    }

    /// Most recent crawl runs, optionally restricted to one site
    pub async fn latest_crawl_runs(
        &self,
        site_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CrawlRun>> {
        let runs = match site_id {
            Some(site_id) => {
                sqlx::query_as::<_, CrawlRun>(
                    "SELECT * FROM crawl_runs WHERE site_id = ? ORDER BY started_at DESC LIMIT ?",
                )
                .bind(site_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CrawlRun>(
                    "SELECT * FROM crawl_runs ORDER BY started_at DESC LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(runs)
    }

    pub async fn get_site_stats(&self, site_id: &str) -> Result<SiteStats> {
        let (page_count, crawled, failed, pending, orphans): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                    COALESCE(SUM(status = 'crawled'), 0),
                    COALESCE(SUM(status = 'failed'), 0),
                    COALESCE(SUM(status = 'pending'), 0),
                    COALESCE(SUM(is_orphan), 0)
                FROM pages WHERE site_id = ?
                "#,
            )
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;

        let link_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;

        let external_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM external_links WHERE site_id = ?")
                .bind(site_id)
                .fetch_one(&self.pool)
                .await?;

        let cluster_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM clusters WHERE site_id = ?")
                .bind(site_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(SiteStats {
            page_count: page_count as usize,
            crawled_count: crawled as usize,
            failed_count: failed as usize,
            pending_count: pending as usize,
            link_count: link_count as usize,
            external_link_count: external_count as usize,
            cluster_count: cluster_count as usize,
            orphan_count: orphans as usize,
        })
    }

    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let site_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(&self.pool)
            .await?;

        let page_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await?;

        let link_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            site_count: site_count as usize,
            page_count: page_count as usize,
            link_count: link_count as usize,
        })
    }
}

#[async_trait]
impl GraphStore for SqliteStore {
    async fn upsert_site(&self, site: &Site) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sites (id, root_url, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET root_url = excluded.root_url
            "#,
        )
        .bind(&site.id)
        .bind(&site.root_url)
        .bind(&site.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_page(&self, page: &PageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (id, site_id, url, title, text, word_count, status, status_code, error, depth, crawled_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(site_id, id) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                text = excluded.text,
                word_count = excluded.word_count,
                status = excluded.status,
                status_code = excluded.status_code,
                error = excluded.error,
                depth = excluded.depth,
                crawled_at = excluded.crawled_at
            "#,
        )
        .bind(&page.id)
        .bind(&page.site_id)
        .bind(&page.url)
        .bind(&page.title)
        .bind(&page.text)
        .bind(page.word_count)
        .bind(&page.status)
        .bind(page.status_code)
        .bind(&page.error)
        .bind(page.depth)
        .bind(&page.crawled_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failed_page(&self, page: &PageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (id, site_id, url, status, status_code, error, depth, crawled_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(site_id, id) DO UPDATE SET
                status = excluded.status,
                status_code = excluded.status_code,
                error = excluded.error,
                depth = excluded.depth,
                crawled_at = excluded.crawled_at
            "#,
        )
        .bind(&page.id)
        .bind(&page.site_id)
        .bind(&page.url)
        .bind(PageStatus::Failed.to_string())
        .bind(page.status_code)
        .bind(&page.error)
        .bind(page.depth)
        .bind(&page.crawled_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_pending_page(&self, site_id: &str, url: &str, depth: u32) -> Result<()> {
        let url = normalize_url(url);
        sqlx::query(
            r#"
            INSERT INTO pages (id, site_id, url, status, depth)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(site_id, id) DO NOTHING
            "#,
        )
        .bind(page_id_for_url(&url))
        .bind(site_id)
        .bind(&url)
        .bind(PageStatus::Pending.to_string())
        .bind(i64::from(depth))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_link(&self, site_id: &str, link: &LinkRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO links (site_id, from_url, to_url, anchor_text)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, from_url, to_url) DO UPDATE SET
                anchor_text = excluded.anchor_text
            "#,
        )
        .bind(site_id)
        .bind(&link.from_url)
        .bind(&link.to_url)
        .bind(&link.anchor_text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_external_link(&self, site_id: &str, link: &LinkRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO external_links (site_id, from_url, to_url, anchor_text)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, from_url, to_url) DO UPDATE SET
                anchor_text = excluded.anchor_text
            "#,
        )
        .bind(site_id)
        .bind(&link.from_url)
        .bind(&link.to_url)
        .bind(&link.anchor_text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_pages(&self, site_id: &str) -> Result<Vec<PageRecord>> {
        let pages =
            sqlx::query_as::<_, PageRecord>("SELECT * FROM pages WHERE site_id = ? ORDER BY url")
                .bind(site_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(pages)
    }

    async fn list_links(&self, site_id: &str) -> Result<Vec<LinkRecord>> {
        let links = sqlx::query_as::<_, LinkRecord>(
            "SELECT from_url, to_url, anchor_text FROM links WHERE site_id = ? ORDER BY from_url, to_url",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn get_embedding(
        &self,
        site_id: &str,
        page_id: &str,
    ) -> Result<Option<StoredEmbedding>> {
        let row = sqlx::query_as::<_, EmbeddingRow>(
            r#"
            SELECT site_id, page_id, content_hash, model, vector_json
            FROM page_embeddings WHERE site_id = ? AND page_id = ?
            "#,
        )
        .bind(site_id)
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(StoredEmbedding {
                vector: serde_json::from_str(&r.vector_json)?,
                site_id: r.site_id,
                page_id: r.page_id,
                content_hash: r.content_hash,
                model: r.model,
            })
        })
        .transpose()
    }

    async fn save_embedding(&self, embedding: &StoredEmbedding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO page_embeddings (site_id, page_id, content_hash, model, vector_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(site_id, page_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                model = excluded.model,
                vector_json = excluded.vector_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&embedding.site_id)
        .bind(&embedding.page_id)
        .bind(&embedding.content_hash)
        .bind(&embedding.model)
        .bind(serde_json::to_string(&embedding.vector)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_clusters(
        &self,
        site_id: &str,
        clusters: &[ClusterRecord],
        assignments: &[ClusterAssignment],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE pages SET cluster_id = NULL WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM clusters WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        for cluster in clusters {
            sqlx::query(
                r#"
                INSERT INTO clusters (id, site_id, cluster_index, label, page_count, centroid_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&cluster.id)
            .bind(&cluster.site_id)
            .bind(cluster.cluster_index)
            .bind(&cluster.label)
            .bind(cluster.page_count)
            .bind(&cluster.centroid_json)
            .bind(&cluster.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for assignment in assignments {
            sqlx::query("UPDATE pages SET cluster_id = ? WHERE site_id = ? AND id = ?")
                .bind(&assignment.cluster_id)
                .bind(site_id)
                .bind(&assignment.page_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            "Stored {} clusters and {} assignments for site {}",
            clusters.len(),
            assignments.len(),
            site_id
        );
        Ok(())
    }

    async fn list_clusters(&self, site_id: &str) -> Result<Vec<ClusterRecord>> {
        let clusters = sqlx::query_as::<_, ClusterRecord>(
            "SELECT * FROM clusters WHERE site_id = ? ORDER BY cluster_index",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(clusters)
    }

    async fn save_rank_scores(&self, site_id: &str, scores: &[PageScore]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for score in scores {
            sqlx::query("UPDATE pages SET pr = ?, tspr = ? WHERE site_id = ? AND id = ?")
                .bind(score.pr)
                .bind(score.tspr)
                .bind(site_id)
                .bind(&score.page_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn refresh_orphans(&self, site_id: &str) -> Result<usize> {
        sqlx::query(
            r#"
            UPDATE pages SET is_orphan = CASE
                WHEN status = 'crawled' AND NOT EXISTS (
                    SELECT 1 FROM links l
                    WHERE l.site_id = pages.site_id
                      AND l.to_url = pages.url
                      AND l.from_url != pages.url
                ) THEN 1 ELSE 0 END
            WHERE site_id = ?
            "#,
        )
        .bind(site_id)
        .execute(&self.pool)
        .await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE site_id = ? AND is_orphan = 1")
                .bind(site_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn start_crawl_run(&self, run: &CrawlRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawl_runs (id, site_id, start_url, started_at, state, pages_crawled, pages_failed)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.site_id)
        .bind(&run.start_url)
        .bind(&run.started_at)
        .bind(&run.state)
        .bind(run.pages_crawled)
        .bind(run.pages_failed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_crawl_run(&self, run: &CrawlRun) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE crawl_runs SET
                completed_at = ?,
                state = ?,
                pages_crawled = ?,
                pages_failed = ?,
                stop_reason = ?
            WHERE id = ?
            "#,
        )
        .bind(
            run.completed_at
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
        )
        .bind(&run.state)
        .bind(run.pages_crawled)
        .bind(run.pages_failed)
        .bind(&run.stop_reason)
        .bind(&run.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Fresh identifier for a crawl run
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_store() -> (SqliteStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let store = SqliteStore::connect(&config).await.unwrap();
        store.init_schema().await.unwrap();
        store
            .upsert_site(&Site::new("site", "https://x.test/"))
            .await
            .unwrap();
        (store, tmp)
    }

    fn extracted(title: &str, text: &str) -> ExtractedPage {
        ExtractedPage {
            title: title.to_string(),
            text: text.to_string(),
            word_count: text.split_whitespace().count(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_page_upsert_by_url() {
        let (store, _tmp) = setup_test_store().await;

        let page = PageRecord::crawled("site", "https://x.test/a/", 1, 200, &extracted("A", "one"));
        store.upsert_page(&page).await.unwrap();

        let again = PageRecord::crawled("site", "https://x.test/a#x", 1, 200, &extracted("A2", "two words"));
        store.upsert_page(&again).await.unwrap();

        let pages = store.list_pages("site").await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://x.test/a");
        assert_eq!(pages[0].title, "A2");
        assert_eq!(pages[0].word_count, 2);
    }

    #[tokio::test]
    async fn test_pending_never_downgrades_crawled() {
        let (store, _tmp) = setup_test_store().await;

        let page = PageRecord::crawled("site", "https://x.test/", 0, 200, &extracted("Home", "hi"));
        store.upsert_page(&page).await.unwrap();
        store
            .insert_pending_page("site", "https://x.test/", 1)
            .await
            .unwrap();
        store
            .insert_pending_page("site", "https://x.test/new", 1)
            .await
            .unwrap();

        let pages = store.list_pages("site").await.unwrap();
        assert_eq!(pages.len(), 2);
        let home = pages.iter().find(|p| p.url == "https://x.test/").unwrap();
        assert_eq!(home.get_status().unwrap(), PageStatus::Crawled);
        let new = pages.iter().find(|p| p.url == "https://x.test/new").unwrap();
        assert_eq!(new.get_status().unwrap(), PageStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_earlier_content() {
        let (store, _tmp) = setup_test_store().await;

        let page = PageRecord::crawled("site", "https://x.test/a", 1, 200, &extracted("A", "body"));
        store.upsert_page(&page).await.unwrap();

        let failed = PageRecord::failed("site", "https://x.test/a", 1, Some(503), "HTTP 503");
        store.record_failed_page(&failed).await.unwrap();

        let pages = store.list_pages("site").await.unwrap();
        assert_eq!(pages[0].get_status().unwrap(), PageStatus::Failed);
        assert_eq!(pages[0].status_code, Some(503));
        assert_eq!(pages[0].title, "A");
    }

    #[tokio::test]
    async fn test_link_upsert_is_idempotent() {
        let (store, _tmp) = setup_test_store().await;

        let link = LinkRecord {
            from_url: "https://x.test/".to_string(),
            to_url: "https://x.test/a".to_string(),
            anchor_text: "A".to_string(),
        };
        store.upsert_link("site", &link).await.unwrap();
        store
            .upsert_link(
                "site",
                &LinkRecord {
                    anchor_text: "Renamed".to_string(),
                    ..link.clone()
                },
            )
            .await
            .unwrap();

        let links = store.list_links("site").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].anchor_text, "Renamed");
    }

    #[tokio::test]
    async fn test_refresh_orphans_ignores_self_links() {
        let (store, _tmp) = setup_test_store().await;

        for url in ["https://x.test/", "https://x.test/a", "https://x.test/b"] {
            let page = PageRecord::crawled("site", url, 0, 200, &extracted("", "text"));
            store.upsert_page(&page).await.unwrap();
        }
        for (from, to) in [
            ("https://x.test/", "https://x.test/a"),
            ("https://x.test/b", "https://x.test/b"),
        ] {
            let link = LinkRecord {
                from_url: from.to_string(),
                to_url: to.to_string(),
                anchor_text: String::new(),
            };
            store.upsert_link("site", &link).await.unwrap();
        }

        let count = store.refresh_orphans("site").await.unwrap();
        assert_eq!(count, 2);

        let orphans: Vec<String> = store
            .list_orphans("site")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(orphans, vec!["https://x.test/", "https://x.test/b"]);
    }

    #[tokio::test]
    async fn test_replace_clusters_drops_previous_run() {
        let (store, _tmp) = setup_test_store().await;

        let page = PageRecord::crawled("site", "https://x.test/a", 0, 200, &extracted("A", "x"));
        store.upsert_page(&page).await.unwrap();

        let first = vec![
            ClusterRecord::new("site", 0, &[1.0, 0.0], 1).unwrap(),
            ClusterRecord::new("site", 1, &[0.0, 1.0], 0).unwrap(),
        ];
        let assignment = vec![ClusterAssignment {
            page_id: page.id.clone(),
            cluster_id: first[0].id.clone(),
        }];
        store
            .replace_clusters("site", &first, &assignment)
            .await
            .unwrap();

        let second = vec![ClusterRecord::new("site", 0, &[0.5, 0.5], 0).unwrap()];
        store.replace_clusters("site", &second, &[]).await.unwrap();

        let clusters = store.list_clusters("site").await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, "site-cluster-1");
        assert_eq!(clusters[0].label, "Cluster 1");
        assert_eq!(clusters[0].centroid(), vec![0.5, 0.5]);

        let pages = store.list_pages("site").await.unwrap();
        assert!(pages[0].cluster_id.is_none());
    }

    #[tokio::test]
    async fn test_embedding_cache_roundtrip() {
        let (store, _tmp) = setup_test_store().await;

        assert!(store.get_embedding("site", "p1").await.unwrap().is_none());

        let embedding = StoredEmbedding {
            site_id: "site".to_string(),
            page_id: "p1".to_string(),
            content_hash: "abc".to_string(),
            model: "m".to_string(),
            vector: vec![0.25, -0.5],
        };
        store.save_embedding(&embedding).await.unwrap();

        let loaded = store.get_embedding("site", "p1").await.unwrap().unwrap();
        assert_eq!(loaded, embedding);
    }

    #[tokio::test]
    async fn test_crawl_run_history_and_stats() {
        let (store, _tmp) = setup_test_store().await;

        let mut run = CrawlRun::new(&new_run_id(), "site", "https://x.test/", "crawling");
        store.start_crawl_run(&run).await.unwrap();
        run.state = "completed".to_string();
        run.pages_crawled = 3;
        run.pages_failed = 1;
        run.stop_reason = Some("frontier_exhausted".to_string());
        store.complete_crawl_run(&run).await.unwrap();

        let runs = store.latest_crawl_runs(Some("site"), 5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].state, "completed");
        assert_eq!(runs[0].pages_failed, 1);
        assert!(runs[0].completed_at.is_some());

        let page = PageRecord::crawled("site", "https://x.test/", 0, 200, &extracted("", "x"));
        store.upsert_page(&page).await.unwrap();
        store
            .insert_pending_page("site", "https://x.test/p", 1)
            .await
            .unwrap();

        let stats = store.get_site_stats("site").await.unwrap();
        assert_eq!(stats.page_count, 2);
        assert_eq!(stats.crawled_count, 1);
        assert_eq!(stats.pending_count, 1);

        let global = store.get_global_stats().await.unwrap();
        assert_eq!(global.site_count, 1);
    }

    #[tokio::test]
    async fn test_new_auto_initializes() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::new(&tmp.path().join("nested/graph.db"))
            .await
            .unwrap();
        assert!(store.is_initialized().await.unwrap());
        assert!(store.require_site("missing").await.is_err());
    }
}
