//! sitegraph - crawl a site and analyse its internal link graph
//!
//! This crate provides:
//! - A breadth-first crawler with pause/resume/cancel control
//! - Semantic clustering of page text over an HTTP embedding provider
//! - PageRank and topic-sensitive PageRank seeded by per-cluster pillar pages
//! - SQLite persistence of pages, links, clusters and scores

pub mod cluster;
pub mod commands;
pub mod config;
pub mod crawl;
pub mod embed;
pub mod error;
pub mod parse;
pub mod progress;
pub mod rank;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
