//! SQLite schema definition

/// SQL schema for the site graph database
pub const SCHEMA_SQL: &str = r#"
-- Sites: one per crawled property
CREATE TABLE IF NOT EXISTS sites (
    id TEXT PRIMARY KEY,
    root_url TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Pages: keyed by the UUIDv5 of the normalized URL
CREATE TABLE IF NOT EXISTS pages (
    id TEXT NOT NULL,
    site_id TEXT NOT NULL REFERENCES sites(id),
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    word_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    status_code INTEGER,
    error TEXT,
    depth INTEGER NOT NULL DEFAULT 0,
    crawled_at TEXT,
    cluster_id TEXT,
    pr REAL,
    tspr REAL,
    is_orphan INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (site_id, id)
);

-- Internal links between pages of the same site
CREATE TABLE IF NOT EXISTS links (
    site_id TEXT NOT NULL,
    from_url TEXT NOT NULL,
    to_url TEXT NOT NULL,
    anchor_text TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (site_id, from_url, to_url)
);

-- Off-site links, kept for backlink analysis
CREATE TABLE IF NOT EXISTS external_links (
    site_id TEXT NOT NULL,
    from_url TEXT NOT NULL,
    to_url TEXT NOT NULL,
    anchor_text TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (site_id, from_url, to_url)
);

-- Clusters: replaced wholesale on every clustering run
CREATE TABLE IF NOT EXISTS clusters (
    id TEXT PRIMARY KEY,
    site_id TEXT NOT NULL REFERENCES sites(id),
    cluster_index INTEGER NOT NULL,
    label TEXT NOT NULL,
    page_count INTEGER NOT NULL DEFAULT 0,
    centroid_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Embedding cache keyed by page, invalidated by content hash or model
CREATE TABLE IF NOT EXISTS page_embeddings (
    site_id TEXT NOT NULL,
    page_id TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    model TEXT NOT NULL,
    vector_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (site_id, page_id)
);

-- Crawl runs: tracking history
CREATE TABLE IF NOT EXISTS crawl_runs (
    id TEXT PRIMARY KEY,
    site_id TEXT NOT NULL REFERENCES sites(id),
    start_url TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    state TEXT NOT NULL,
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    stop_reason TEXT
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(site_id, url);
CREATE INDEX IF NOT EXISTS idx_pages_cluster ON pages(site_id, cluster_id);
CREATE INDEX IF NOT EXISTS idx_links_to ON links(site_id, to_url);
CREATE INDEX IF NOT EXISTS idx_clusters_site ON clusters(site_id);
CREATE INDEX IF NOT EXISTS idx_runs_site ON crawl_runs(site_id);
"#;
