//! Site crawling with robots.txt support and rate limiting
//!
//! This module provides:
//! - Breadth-first frontier with depth and page-count bounds
//! - URL fetching with configurable timeouts and failure classification
//! - robots.txt parsing and respect
//! - Per-host rate limiting
//! - Sitemap XML seed discovery
//! - The crawl controller with pause, resume and cancel

mod controller;
mod fetch;
mod frontier;
mod rate_limit;
mod robots;
mod sitemap;

pub use controller::*;
pub use fetch::*;
pub use frontier::*;
pub use rate_limit::*;
pub use robots::*;
pub use sitemap::*;
