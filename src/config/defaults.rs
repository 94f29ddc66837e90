//! Default values for configuration

/// Default maximum crawl depth
pub fn default_crawl_max_depth() -> u32 {
    3
}

/// Default maximum pages per crawl
pub fn default_crawl_max_pages() -> u32 {
    100
}

/// Default user agent sent with every crawl request
pub fn default_crawl_user_agent() -> String {
    format!("SiteGraph-Crawler/{}", env!("CARGO_PKG_VERSION"))
}

/// Default request timeout (seconds)
pub fn default_crawl_timeout() -> u64 {
    30
}

/// Default requests per second per host
pub fn default_crawl_rate_limit() -> f64 {
    2.0
}

/// Default: respect robots.txt
pub fn default_respect_robots() -> bool {
    true
}

/// Default redirect hops followed by the fetcher
pub fn default_crawl_max_redirects() -> usize {
    5
}

/// Default embedding provider URL
pub fn default_embedding_backend_url() -> String {
    std::env::var("SITEGRAPH_EMBEDDING_URL").unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model (BAAI/bge-small-en-v1.5)
pub fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

/// Default embedding dimension
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Page text beyond this many characters is not sent to the provider
pub fn default_embedding_max_input_chars() -> usize {
    8000
}

/// Default retries against the embedding provider
pub fn default_embedding_retries() -> usize {
    2
}

/// Default number of clusters
pub fn default_cluster_k() -> usize {
    5
}

/// Default k-means iteration cap
pub fn default_cluster_max_iterations() -> usize {
    100
}

/// Default centroid shift below which k-means stops
pub fn default_cluster_tolerance() -> f64 {
    1e-6
}

/// Default RNG seed for k-means++ initialisation
pub fn default_cluster_seed() -> u64 {
    42
}

/// Default PageRank damping factor
pub fn default_rank_damping() -> f64 {
    0.85
}

/// Default PageRank iteration cap
pub fn default_rank_max_iterations() -> usize {
    100
}

/// Default L1 delta below which PageRank is considered converged
pub fn default_rank_tolerance() -> f64 {
    1e-6
}

/// Default number of pillar pages chosen per cluster
pub fn default_rank_pillars_per_cluster() -> usize {
    3
}
