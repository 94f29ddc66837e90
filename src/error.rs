//! Custom error types for sitegraph

use std::fmt;
use thiserror::Error;

/// Why a single page could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Server answered with a non-2xx status
    Status(u16),
    /// Request exceeded the configured timeout
    Timeout,
    /// DNS failure, refused connection, TLS failure
    Connect,
    /// robots.txt forbids the URL for our user agent
    Disallowed,
    /// Anything else reqwest reports (body decode, redirect loop, ...)
    Other(String),
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Status(code) => write!(f, "HTTP {}", code),
            FetchErrorKind::Timeout => write!(f, "timed out"),
            FetchErrorKind::Connect => write!(f, "connection failed"),
            FetchErrorKind::Disallowed => write!(f, "disallowed by robots.txt"),
            FetchErrorKind::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Main error type for sitegraph operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Fetch failed for {url}: {kind}")]
    Fetch { url: String, kind: FetchErrorKind },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Insufficient data: {requested} clusters requested but only {available} pages have text; crawl more pages or lower k")]
    InsufficientData { requested: usize, available: usize },

    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    #[error("Crawl not found: {0}")]
    CrawlNotFound(String),

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not initialized: run 'sitegraph init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a fetch error for `url`
    pub fn fetch(url: impl Into<String>, kind: FetchErrorKind) -> Self {
        Error::Fetch {
            url: url.into(),
            kind,
        }
    }

    /// Per-page failures that the crawl loop skips over instead of aborting
    pub fn is_page_level(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Parse(_))
    }
}

/// Result type alias for sitegraph
pub type Result<T> = std::result::Result<T, Error>;
