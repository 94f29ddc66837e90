//! Configuration management for sitegraph
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Web crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// K-means configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// PageRank configuration
    #[serde(default)]
    pub rank: RankConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Web crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum crawl depth from the start URL
    #[serde(default = "default_crawl_max_depth")]
    pub max_depth: u32,

    /// Maximum pages visited per crawl
    #[serde(default = "default_crawl_max_pages")]
    pub max_pages: u32,

    /// User agent string
    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// Requests per second per host
    #[serde(default = "default_crawl_rate_limit")]
    pub rate_limit_per_host: f64,

    /// Whether to respect robots.txt
    #[serde(default = "default_respect_robots")]
    pub respect_robots_txt: bool,

    /// Redirect hops followed before giving up
    #[serde(default = "default_crawl_max_redirects")]
    pub max_redirects: usize,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the HTTP embedding backend
    #[serde(default = "default_embedding_backend_url")]
    pub backend_url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Page text is truncated to this many characters before embedding
    #[serde(default = "default_embedding_max_input_chars")]
    pub max_input_chars: usize,

    /// Retries per backend request
    #[serde(default = "default_embedding_retries")]
    pub retries: usize,
}

/// K-means configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster count used when the caller does not pass one
    #[serde(default = "default_cluster_k")]
    pub default_k: usize,

    #[serde(default = "default_cluster_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_cluster_tolerance")]
    pub tolerance: f64,

    /// Seed for k-means++ so repeated runs over the same data agree
    #[serde(default = "default_cluster_seed")]
    pub seed: u64,
}

/// PageRank configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    #[serde(default = "default_rank_damping")]
    pub damping: f64,

    #[serde(default = "default_rank_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_rank_tolerance")]
    pub tolerance: f64,

    /// Top pages by in-degree taken from each cluster as TSPR seeds
    #[serde(default = "default_rank_pillars_per_cluster")]
    pub pillars_per_cluster: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for sitegraph data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_crawl_max_depth(),
            max_pages: default_crawl_max_pages(),
            user_agent: default_crawl_user_agent(),
            timeout_secs: default_crawl_timeout(),
            rate_limit_per_host: default_crawl_rate_limit(),
            respect_robots_txt: default_respect_robots(),
            max_redirects: default_crawl_max_redirects(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend_url: default_embedding_backend_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            max_input_chars: default_embedding_max_input_chars(),
            retries: default_embedding_retries(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_k: default_cluster_k(),
            max_iterations: default_cluster_max_iterations(),
            tolerance: default_cluster_tolerance(),
            seed: default_cluster_seed(),
        }
    }
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            damping: default_rank_damping(),
            max_iterations: default_rank_max_iterations(),
            tolerance: default_rank_tolerance(),
            pillars_per_cluster: default_rank_pillars_per_cluster(),
        }
    }
}

impl Config {
    /// Get the default base directory for sitegraph (~/.sitegraph)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitegraph")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Base directory and config file named by a `--config` argument.
    ///
    /// A `.toml` path names the config file itself; any other path is a
    /// directory holding `config.toml`.
    pub fn config_location(path: Option<&Path>) -> (PathBuf, PathBuf) {
        match path {
            Some(path) if path.extension().map_or(false, |e| e == "toml") => {
                let base = path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(Self::default_base_dir);
                (base, path.to_path_buf())
            }
            Some(dir) => (dir.to_path_buf(), dir.join("config.toml")),
            None => (Self::default_base_dir(), Self::default_config_path()),
        }
    }

    fn paths_for(base: PathBuf, config_file: PathBuf) -> PathsConfig {
        PathsConfig {
            config_file,
            db_file: base.join("sitegraph.db"),
            base_dir: base,
        }
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = Self::paths_for(base, config_path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        let config_file = base.join("config.toml");

        if config_file.exists() {
            return Self::load(&config_file);
        }

        debug!("No config file found, using defaults");
        let mut config = Config::default();
        config.paths = Self::paths_for(base, config_file);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawl.max_pages == 0 {
            return Err(Error::Config("crawl.max_pages must be > 0".to_string()));
        }
        if self.crawl.timeout_secs == 0 {
            return Err(Error::Config("crawl.timeout_secs must be > 0".to_string()));
        }
        if !(self.crawl.rate_limit_per_host > 0.0) {
            return Err(Error::Config(
                "crawl.rate_limit_per_host must be > 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be > 0".to_string()));
        }
        if self.embedding.max_input_chars == 0 {
            return Err(Error::Config(
                "embedding.max_input_chars must be > 0".to_string(),
            ));
        }
        if self.cluster.default_k == 0 {
            return Err(Error::Config("cluster.default_k must be > 0".to_string()));
        }
        if !(self.rank.damping > 0.0 && self.rank.damping < 1.0) {
            return Err(Error::Config(format!(
                "rank.damping must be in (0, 1), got {}",
                self.rank.damping
            )));
        }
        if self.rank.max_iterations == 0 {
            return Err(Error::Config("rank.max_iterations must be > 0".to_string()));
        }
        if self.rank.pillars_per_cluster == 0 {
            return Err(Error::Config(
                "rank.pillars_per_cluster must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
