//! Page parsing and structured extraction
//!
//! This module handles:
//! - HTML parsing into title, visible text and word count
//! - Same-site link discovery with anchor text
//! - Off-site link bookkeeping

mod html;

pub use html::*;

use serde::{Deserialize, Serialize};

/// Anchor text is cut to this many characters
pub const MAX_ANCHOR_CHARS: usize = 50;

/// A link found in a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    /// Absolute, normalized target URL
    pub url: String,

    /// Up to the first 50 characters of the anchor's visible text
    pub anchor_text: String,
}

/// Structured data extracted from one HTML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// Content of the title element (empty if absent)
    pub title: String,

    /// Visible body text with whitespace runs collapsed
    pub text: String,

    pub word_count: usize,

    /// Same-site links, in document order
    pub links: Vec<ExtractedLink>,

    /// Off-site links, kept for backlink analysis but never crawled
    pub external_links: Vec<ExtractedLink>,
}

/// Collapse every whitespace run to a single space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-delimited tokens
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First `max_chars` characters of `text`, never splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
