//! Crawl controller
//!
//! Drives the frontier, fetch and extract loop for one site at a time and
//! persists every page and link as soon as it is processed. Each crawl runs in
//! its own task; the controller keeps a registry of live crawls keyed by
//! crawl id so callers can pause, resume, cancel and poll them.

use super::{normalize_crawl_url, Fetcher, Frontier};
use crate::error::{Error, FetchErrorKind, Result};
use crate::parse::extract;
use crate::store::{new_run_id, CrawlRun, GraphStore, LinkRecord, PageRecord, Site};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    Idle,
    Crawling,
    Paused,
    Completed,
    Cancelled,
    /// Aborted by a storage error; pages persisted so far remain valid
    Failed,
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CrawlState::Completed | CrawlState::Cancelled | CrawlState::Failed
        )
    }
}

impl std::fmt::Display for CrawlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlState::Idle => write!(f, "idle"),
            CrawlState::Crawling => write!(f, "crawling"),
            CrawlState::Paused => write!(f, "paused"),
            CrawlState::Completed => write!(f, "completed"),
            CrawlState::Cancelled => write!(f, "cancelled"),
            CrawlState::Failed => write!(f, "failed"),
        }
    }
}

/// Signal sent to a running crawl; read at every iteration boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlControl {
    Run,
    Pause,
    Cancel,
}

/// Why the crawl loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FrontierExhausted,
    PageLimit,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::FrontierExhausted => write!(f, "frontier_exhausted"),
            StopReason::PageLimit => write!(f, "page_limit"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Live progress of a crawl, published after every iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStatus {
    pub crawl_id: String,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub frontier_size: usize,
    pub state: CrawlState,
}

/// Parameters of one crawl
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub site_id: String,
    pub start_url: String,
    pub max_depth: u32,
    /// Ceiling on pages fetched, successful or not
    pub page_limit: usize,
    /// Additional depth-0 seeds, e.g. from a sitemap
    pub extra_seeds: Vec<String>,
}

/// Final outcome of a crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub crawl_id: String,
    pub site_id: String,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub orphan_count: usize,
    pub state: CrawlState,
    pub stop_reason: Option<StopReason>,
}

#[derive(Clone)]
struct CrawlEntry {
    control: Arc<watch::Sender<CrawlControl>>,
    status: watch::Receiver<CrawlStatus>,
}

impl CrawlEntry {
    fn send(&self, signal: CrawlControl) {
        // Never fails; a finished crawl simply ignores the value
        self.control.send_replace(signal);
    }

    fn is_finished(&self) -> bool {
        self.status.borrow().state.is_terminal()
    }
}

/// Handle to a spawned crawl
pub struct CrawlHandle {
    id: String,
    entry: CrawlEntry,
    task: JoinHandle<Result<CrawlReport>>,
}

impl CrawlHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pause(&self) {
        self.entry.send(CrawlControl::Pause);
    }

    pub fn resume(&self) {
        self.entry.send(CrawlControl::Run);
    }

    pub fn cancel(&self) {
        self.entry.send(CrawlControl::Cancel);
    }

    /// Latest published progress
    pub fn status(&self) -> CrawlStatus {
        self.entry.status.borrow().clone()
    }

    /// Receiver that wakes on every progress update
    pub fn subscribe(&self) -> watch::Receiver<CrawlStatus> {
        self.entry.status.clone()
    }

    /// Wait for the crawl task to finish
    pub async fn wait(self) -> Result<CrawlReport> {
        self.task
            .await
            .map_err(|e| Error::Other(format!("Crawl task panicked: {}", e)))?
    }
}

/// Starts crawls and tracks them by id
pub struct CrawlController {
    fetcher: Fetcher,
    store: Arc<dyn GraphStore>,
    crawls: RwLock<HashMap<String, CrawlEntry>>,
}

impl CrawlController {
    pub fn new(fetcher: Fetcher, store: Arc<dyn GraphStore>) -> Self {
        Self {
            fetcher,
            store,
            crawls: RwLock::new(HashMap::new()),
        }
    }

    /// Start crawling `start_url` for `site_id`
    pub async fn start_crawl(
        &self,
        site_id: &str,
        start_url: &str,
        max_depth: u32,
        page_limit: usize,
    ) -> Result<CrawlHandle> {
        self.start(CrawlRequest {
            site_id: site_id.to_string(),
            start_url: start_url.to_string(),
            max_depth,
            page_limit,
            extra_seeds: Vec::new(),
        })
        .await
    }

    /// Start a crawl described by `request` in a background task
    pub async fn start(&self, request: CrawlRequest) -> Result<CrawlHandle> {
        let start_url = normalize_crawl_url(&request.start_url).ok_or_else(|| {
            Error::Config(format!("Invalid start URL: {}", request.start_url))
        })?;
        let base_url = Url::parse(&start_url)?.join("/")?.to_string();

        self.store
            .upsert_site(&Site::new(&request.site_id, &base_url))
            .await?;

        let crawl_id = new_run_id();
        let run = CrawlRun::new(
            &crawl_id,
            &request.site_id,
            &start_url,
            &CrawlState::Crawling.to_string(),
        );
        self.store.start_crawl_run(&run).await?;

        let (control_tx, control_rx) = watch::channel(CrawlControl::Run);
        let (status_tx, status_rx) = watch::channel(CrawlStatus {
            crawl_id: crawl_id.clone(),
            pages_crawled: 0,
            pages_failed: 0,
            frontier_size: 0,
            state: CrawlState::Idle,
        });

        let entry = CrawlEntry {
            control: Arc::new(control_tx),
            status: status_rx,
        };
        {
            let mut crawls = self.crawls.write().await;
            // Finished crawls stay queryable until the next one starts
            crawls.retain(|_, e| !e.is_finished());
            crawls.insert(crawl_id.clone(), entry.clone());
        }

        info!(
            "Starting crawl {} of {} (max depth {}, page limit {})",
            crawl_id, start_url, request.max_depth, request.page_limit
        );

        let job = CrawlJob {
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            run,
            request: CrawlRequest {
                start_url,
                ..request
            },
            base_url,
            control: control_rx,
            status: status_tx,
        };
        let task = tokio::spawn(job.run());

        Ok(CrawlHandle {
            id: crawl_id,
            entry,
            task,
        })
    }

    pub async fn pause_crawl(&self, crawl_id: &str) -> Result<()> {
        self.entry(crawl_id).await?.send(CrawlControl::Pause);
        Ok(())
    }

    pub async fn resume_crawl(&self, crawl_id: &str) -> Result<()> {
        self.entry(crawl_id).await?.send(CrawlControl::Run);
        Ok(())
    }

    pub async fn cancel_crawl(&self, crawl_id: &str) -> Result<()> {
        self.entry(crawl_id).await?.send(CrawlControl::Cancel);
        Ok(())
    }

    pub async fn get_crawl_status(&self, crawl_id: &str) -> Result<CrawlStatus> {
        Ok(self.entry(crawl_id).await?.status.borrow().clone())
    }

    /// Number of crawls currently held in the registry
    pub async fn tracked_crawls(&self) -> usize {
        self.crawls.read().await.len()
    }

    async fn entry(&self, crawl_id: &str) -> Result<CrawlEntry> {
        self.crawls
            .read()
            .await
            .get(crawl_id)
            .cloned()
            .ok_or_else(|| Error::CrawlNotFound(crawl_id.to_string()))
    }
}

/// Everything one crawl task owns
struct CrawlJob {
    fetcher: Fetcher,
    store: Arc<dyn GraphStore>,
    run: CrawlRun,
    request: CrawlRequest,
    base_url: String,
    control: watch::Receiver<CrawlControl>,
    status: watch::Sender<CrawlStatus>,
}

struct Counters {
    crawled: usize,
    failed: usize,
    queued: usize,
}

enum Gate {
    Proceed,
    Cancelled,
}

impl CrawlJob {
    async fn run(mut self) -> Result<CrawlReport> {
        let mut counters = Counters {
            crawled: 0,
            failed: 0,
            queued: 0,
        };

        let outcome = self.crawl(&mut counters).await;
        let (state, stop_reason) = match &outcome {
            Ok(StopReason::Cancelled) => (CrawlState::Cancelled, Some(StopReason::Cancelled)),
            Ok(reason) => (CrawlState::Completed, Some(*reason)),
            Err(_) => (CrawlState::Failed, None),
        };

        self.publish(&counters, state);

        let site_id = self.request.site_id.clone();
        let orphan_count = match self.store.refresh_orphans(&site_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to refresh orphan flags for {}: {}", site_id, e);
                0
            }
        };

        self.run.state = state.to_string();
        self.run.pages_crawled = counters.crawled as i64;
        self.run.pages_failed = counters.failed as i64;
        self.run.stop_reason = match (&outcome, stop_reason) {
            (Err(e), _) => Some(e.to_string()),
            (Ok(_), reason) => reason.map(|r| r.to_string()),
        };
        self.store.complete_crawl_run(&self.run).await?;

        outcome?;

        info!(
            "Crawl {} {}: {} pages crawled, {} failed, {} orphans",
            self.run.id, state, counters.crawled, counters.failed, orphan_count
        );

        Ok(CrawlReport {
            crawl_id: self.run.id.clone(),
            site_id,
            pages_crawled: counters.crawled,
            pages_failed: counters.failed,
            orphan_count,
            state,
            stop_reason,
        })
    }

    async fn crawl(&mut self, counters: &mut Counters) -> Result<StopReason> {
        let mut frontier = Frontier::new(self.request.max_depth);
        frontier.enqueue(&self.request.start_url, 0);
        for seed in &self.request.extra_seeds {
            frontier.enqueue(seed, 0);
        }

        counters.queued = frontier.len();
        self.publish(counters, CrawlState::Crawling);

        loop {
            counters.queued = frontier.len();
            if let Gate::Cancelled = self.gate(counters).await {
                info!("Crawl {} cancelled", self.run.id);
                return Ok(StopReason::Cancelled);
            }

            if frontier.visited_count() >= self.request.page_limit {
                info!("Reached page limit ({})", self.request.page_limit);
                return Ok(StopReason::PageLimit);
            }

            let Some(entry) = frontier.dequeue() else {
                return Ok(StopReason::FrontierExhausted);
            };
            if entry.depth > frontier.max_depth() || !frontier.mark_visited(&entry.url) {
                continue;
            }

            self.process(&mut frontier, &entry.url, entry.depth, counters)
                .await?;

            counters.queued = frontier.len();
            self.publish(counters, CrawlState::Crawling);
        }
    }

    /// Fetch, extract and persist one page, queueing its in-scope links
    async fn process(
        &self,
        frontier: &mut Frontier,
        url: &str,
        depth: u32,
        counters: &mut Counters,
    ) -> Result<()> {
        let site_id = self.request.site_id.as_str();

        let fetched = match self.fetcher.fetch(url).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_page_level() => {
                warn!("Skipping {}: {}", url, e);
                let status_code = match &e {
                    Error::Fetch {
                        kind: FetchErrorKind::Status(code),
                        ..
                    } => Some(*code),
                    _ => None,
                };
                let page = PageRecord::failed(site_id, url, depth, status_code, e.to_string());
                self.store.record_failed_page(&page).await?;
                counters.failed += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let extracted = extract(&fetched.html, &self.base_url);
        let page = PageRecord::crawled(site_id, url, depth, fetched.status_code, &extracted);
        self.store.upsert_page(&page).await?;

        let next_depth = depth + 1;
        for link in &extracted.links {
            if !frontier.in_scope(&link.url, next_depth) {
                continue;
            }
            let record = LinkRecord {
                from_url: page.url.clone(),
                to_url: link.url.clone(),
                anchor_text: link.anchor_text.clone(),
            };
            self.store.upsert_link(site_id, &record).await?;

            if frontier.enqueue(&link.url, next_depth) {
                self.store
                    .insert_pending_page(site_id, &link.url, next_depth)
                    .await?;
            }
        }

        for link in &extracted.external_links {
            let record = LinkRecord {
                from_url: page.url.clone(),
                to_url: link.url.clone(),
                anchor_text: link.anchor_text.clone(),
            };
            self.store.upsert_external_link(site_id, &record).await?;
        }

        debug!(
            "Crawled {} (depth {}, {} words, {} links)",
            page.url,
            depth,
            extracted.word_count,
            extracted.links.len()
        );
        counters.crawled += 1;
        Ok(())
    }

    /// Iteration boundary: block while paused, report cancellation
    async fn gate(&mut self, counters: &Counters) -> Gate {
        loop {
            let signal = *self.control.borrow_and_update();
            match signal {
                CrawlControl::Run => return Gate::Proceed,
                CrawlControl::Cancel => return Gate::Cancelled,
                CrawlControl::Pause => {
                    info!("Crawl {} paused", self.run.id);
                    self.publish(counters, CrawlState::Paused);
                    if self.control.changed().await.is_err() {
                        // Every control handle is gone; nobody can resume us
                        return Gate::Cancelled;
                    }
                    if *self.control.borrow() == CrawlControl::Run {
                        info!("Crawl {} resumed", self.run.id);
                        self.publish(counters, CrawlState::Crawling);
                    }
                }
            }
        }
    }

    fn publish(&self, counters: &Counters, state: CrawlState) {
        self.status.send_replace(CrawlStatus {
            crawl_id: self.run.id.clone(),
            pages_crawled: counters.crawled,
            pages_failed: counters.failed,
            frontier_size: counters.queued,
            state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, CrawlConfig};
    use crate::store::{PageStatus, SqliteStore};
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (CrawlController, SqliteStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("crawl.db");
        let store = SqliteStore::connect(&config).await.unwrap();
        store.init_schema().await.unwrap();

        let fetcher = Fetcher::new(&CrawlConfig {
            rate_limit_per_host: 1000.0,
            timeout_secs: 5,
            ..CrawlConfig::default()
        })
        .unwrap();

        let controller = CrawlController::new(fetcher, Arc::new(store.clone()));
        (controller, store, tmp)
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
            .mount(server)
            .await;
    }

    async fn mount_slow_page(server: &MockServer, route: &str, body: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.to_string(), "text/html")
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_two_cycle_site_with_depth_one() {
        let (controller, store, _tmp) = setup().await;
        let server = MockServer::start().await;

        mount_page(
            &server,
            "/",
            r#"<title>Home</title><body><a href="/page1">Page 1</a></body>"#,
        )
        .await;
        mount_page(
            &server,
            "/page1",
            r#"<title>Page 1</title><body><a href="/">Home</a> <a href="/page2">Page 2</a></body>"#,
        )
        .await;
        mount_page(&server, "/page2", "<title>Page 2</title><body>deep</body>").await;

        let handle = controller
            .start_crawl("fixture", &format!("{}/", server.uri()), 1, 10)
            .await
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.state, CrawlState::Completed);
        assert_eq!(report.stop_reason, Some(StopReason::FrontierExhausted));
        assert_eq!(report.pages_crawled, 2);
        assert_eq!(report.pages_failed, 0);

        let pages = store.list_pages("fixture").await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages
            .iter()
            .all(|p| p.get_status().unwrap() == PageStatus::Crawled));

        let home = format!("{}/", server.uri());
        let page1 = format!("{}/page1", server.uri());
        let links: Vec<(String, String)> = store
            .list_links("fixture")
            .await
            .unwrap()
            .into_iter()
            .map(|l| (l.from_url, l.to_url))
            .collect();
        assert_eq!(links.len(), 2);
        assert!(links.contains(&(home.clone(), page1.clone())));
        assert!(links.contains(&(page1, home)));
    }

    #[tokio::test]
    async fn test_page_limit_bounds_crawl() {
        let (controller, store, _tmp) = setup().await;
        let server = MockServer::start().await;

        let mut home = String::from("<body>");
        for i in 0..10 {
            home.push_str(&format!(r#"<a href="/p{i}">p{i}</a>"#));
            mount_page(&server, &format!("/p{i}"), "<body>leaf</body>").await;
        }
        home.push_str("</body>");
        mount_page(&server, "/", &home).await;

        let report = controller
            .start_crawl("limited", &server.uri(), 3, 4)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.stop_reason, Some(StopReason::PageLimit));
        assert_eq!(report.pages_crawled + report.pages_failed, 4);

        let stats = store.get_site_stats("limited").await.unwrap();
        assert_eq!(stats.crawled_count, 4);
        assert_eq!(stats.pending_count, 7);
    }

    #[tokio::test]
    async fn test_failed_pages_do_not_abort() {
        let (controller, store, _tmp) = setup().await;
        let server = MockServer::start().await;

        mount_page(
            &server,
            "/",
            r#"<body><a href="/missing">gone</a><a href="/ok">ok</a></body>"#,
        )
        .await;
        mount_page(&server, "/ok", "<body>fine</body>").await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let report = controller
            .start_crawl("partial", &server.uri(), 2, 10)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.state, CrawlState::Completed);
        assert_eq!(report.pages_crawled, 2);
        assert_eq!(report.pages_failed, 1);

        let pages = store.list_pages("partial").await.unwrap();
        let missing = pages.iter().find(|p| p.url.ends_with("/missing")).unwrap();
        assert_eq!(missing.get_status().unwrap(), PageStatus::Failed);
        assert_eq!(missing.status_code, Some(404));
    }

    #[tokio::test]
    async fn test_breadth_first_depths() {
        let (controller, store, _tmp) = setup().await;
        let server = MockServer::start().await;

        mount_page(&server, "/", r#"<body><a href="/a">A</a><a href="/b">B</a></body>"#).await;
        mount_page(&server, "/a", r#"<body><a href="/c">C</a></body>"#).await;
        mount_page(&server, "/b", r#"<body><a href="/a">A</a><a href="/">Home</a></body>"#).await;
        mount_page(&server, "/c", r#"<body><a href="/b">B</a></body>"#).await;

        let report = controller
            .start_crawl("bfs", &server.uri(), 5, 50)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(report.pages_crawled, 4);

        let depths: HashMap<String, i64> = store
            .list_pages("bfs")
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.url.trim_start_matches(&server.uri()).to_string(), p.depth))
            .collect();
        assert_eq!(depths["/"], 0);
        assert_eq!(depths["/a"], 1);
        assert_eq!(depths["/b"], 1);
        assert_eq!(depths["/c"], 2);

        // /b links back home, so every page has an inbound link
        assert_eq!(report.orphan_count, 0);
    }

    #[tokio::test]
    async fn test_recrawl_does_not_duplicate() {
        let (controller, store, _tmp) = setup().await;
        let server = MockServer::start().await;

        mount_page(&server, "/", r#"<body><a href="/a">A</a></body>"#).await;
        mount_page(&server, "/a", r#"<body><a href="/">Home</a></body>"#).await;

        for _ in 0..2 {
            controller
                .start_crawl("again", &server.uri(), 2, 10)
                .await
                .unwrap()
                .wait()
                .await
                .unwrap();
        }

        assert_eq!(store.list_pages("again").await.unwrap().len(), 2);
        assert_eq!(store.list_links("again").await.unwrap().len(), 2);
        assert_eq!(
            store.latest_crawl_runs(Some("again"), 10).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (controller, store, _tmp) = setup().await;
        let server = MockServer::start().await;
        let delay = Duration::from_millis(150);

        mount_slow_page(
            &server,
            "/",
            r#"<body><a href="/1">1</a><a href="/2">2</a><a href="/3">3</a></body>"#,
            delay,
        )
        .await;
        for i in 1..=3 {
            mount_slow_page(&server, &format!("/{i}"), "<body>leaf</body>", delay).await;
        }

        let handle = controller
            .start_crawl("pausable", &server.uri(), 2, 10)
            .await
            .unwrap();
        controller.pause_crawl(handle.id()).await.unwrap();

        let mut status = handle.subscribe();
        let paused = status
            .wait_for(|s| s.state == CrawlState::Paused)
            .await
            .unwrap()
            .clone();

        tokio::time::sleep(Duration::from_millis(400)).await;
        let still = controller.get_crawl_status(handle.id()).await.unwrap();
        assert_eq!(still.state, CrawlState::Paused);
        assert_eq!(still.pages_crawled, paused.pages_crawled);

        controller.resume_crawl(handle.id()).await.unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.state, CrawlState::Completed);
        assert_eq!(report.pages_crawled, 4);
        assert_eq!(store.list_pages("pausable").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_results() {
        let (controller, store, _tmp) = setup().await;
        let server = MockServer::start().await;
        let delay = Duration::from_millis(200);

        let mut home = String::from("<body>");
        for i in 0..5 {
            home.push_str(&format!(r#"<a href="/p{i}">p{i}</a>"#));
            mount_slow_page(&server, &format!("/p{i}"), "<body>leaf</body>", delay).await;
        }
        home.push_str("</body>");
        mount_page(&server, "/", &home).await;

        let handle = controller
            .start_crawl("cancel", &server.uri(), 1, 10)
            .await
            .unwrap();

        let mut status = handle.subscribe();
        status.wait_for(|s| s.pages_crawled >= 1).await.unwrap();
        handle.cancel();

        let report = handle.wait().await.unwrap();
        assert_eq!(report.state, CrawlState::Cancelled);
        assert_eq!(report.stop_reason, Some(StopReason::Cancelled));
        assert!(report.pages_crawled >= 1);
        assert!(report.pages_crawled < 6);

        let runs = store.latest_crawl_runs(Some("cancel"), 1).await.unwrap();
        assert_eq!(runs[0].state, "cancelled");
    }

    #[tokio::test]
    async fn test_finished_crawls_pruned_on_next_start() {
        let (controller, _store, _tmp) = setup().await;
        let server = MockServer::start().await;
        mount_page(&server, "/", "<body>only page</body>").await;

        let first = controller
            .start_crawl("prune", &server.uri(), 1, 10)
            .await
            .unwrap();
        let first_id = first.id().to_string();
        first.wait().await.unwrap();

        let status = controller.get_crawl_status(&first_id).await.unwrap();
        assert_eq!(status.state, CrawlState::Completed);

        let second = controller
            .start_crawl("prune", &server.uri(), 1, 10)
            .await
            .unwrap();
        assert!(matches!(
            controller.get_crawl_status(&first_id).await,
            Err(Error::CrawlNotFound(_))
        ));
        assert_eq!(controller.tracked_crawls().await, 1);
        second.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_crawl_id() {
        let (controller, _store, _tmp) = setup().await;
        assert!(matches!(
            controller.pause_crawl("nope").await,
            Err(Error::CrawlNotFound(_))
        ));
        assert!(controller.get_crawl_status("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_start_url() {
        let (controller, _store, _tmp) = setup().await;
        assert!(controller
            .start_crawl("bad", "ftp://x.test/", 1, 10)
            .await
            .is_err());
    }
}
