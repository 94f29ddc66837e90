//! Breadth-first frontier and visited set

use std::collections::{HashSet, VecDeque};
use tracing::trace;
use url::Url;
use uuid::Uuid;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized URL
    pub url: String,
    pub depth: u32,
}

/// FIFO queue of discovered URLs plus the set of URLs already processed.
///
/// Owned by a single crawl; nothing here is shared across tasks.
#[derive(Debug)]
pub struct Frontier {
    max_depth: u32,
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    /// Queue `url` at `depth`.
    ///
    /// Returns false when the URL is malformed, deeper than the ceiling,
    /// already visited or already waiting in the queue.
    pub fn enqueue(&mut self, url: &str, depth: u32) -> bool {
        if depth > self.max_depth {
            return false;
        }
        let Some(normalized) = normalize_crawl_url(url) else {
            trace!("Rejecting malformed URL: {}", url);
            return false;
        };
        if self.visited.contains(&normalized) || self.queued.contains(&normalized) {
            return false;
        }

        self.queued.insert(normalized.clone());
        self.queue.push_back(FrontierEntry {
            url: normalized,
            depth,
        });
        true
    }

    /// Next candidate in breadth-first order
    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.url);
        Some(entry)
    }

    /// Record `url` as processed. Returns true the first time only.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        let key = normalize_crawl_url(url).unwrap_or_else(|| url.to_string());
        self.visited.insert(key)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        match normalize_crawl_url(url) {
            Some(key) => self.visited.contains(&key),
            None => self.visited.contains(url),
        }
    }

    /// Whether a link to `url` discovered at `depth` would be inside the crawl:
    /// either already visited, already queued, or shallow enough to enqueue.
    pub fn in_scope(&self, url: &str, depth: u32) -> bool {
        match normalize_crawl_url(url) {
            Some(key) => {
                self.visited.contains(&key) || self.queued.contains(&key) || depth <= self.max_depth
            }
            None => false,
        }
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Number of URLs waiting
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Normalize a URL for deduplication
///
/// Drops the fragment and any trailing slash on the path. Non-http(s) URLs
/// and unparseable input yield `None`.
pub fn normalize_crawl_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }

    parsed.set_fragment(None);

    let path = parsed.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        parsed.set_path("/");
    } else {
        parsed.set_path(&path);
    }

    Some(parsed.to_string())
}

/// Normalize a URL, returning the input unchanged if it cannot be parsed
pub fn normalize_url(url: &str) -> String {
    normalize_crawl_url(url).unwrap_or_else(|| url.to_string())
}

/// Stable page identifier derived from the normalized URL
pub fn page_id_for_url(url: &str) -> String {
    let normalized = normalize_url(url);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, normalized.as_bytes()).to_string()
}
