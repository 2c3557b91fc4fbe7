pub mod crossref;

pub use crossref::CrossrefClient;

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const DEFAULT_MIN_ABSTRACT_CHARS: usize = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error("no abstract found")]
    NotFound,

    #[error("rate limited by the remote service")]
    RateLimited,

    #[error("remote service unavailable: {0}")]
    Unavailable(String),
}

/// Remote collaborator that can supply an abstract for a record.
pub trait AbstractSource {
    fn fetch_abstract(&self, doi: Option<&str>, title: &str) -> Result<String, EnrichmentError>;
}

/// True when an abstract is absent, too short, or an export placeholder.
pub fn needs_abstract(text: Option<&str>, min_chars: usize) -> bool {
    match text.map(str::trim) {
        None => true,
        Some(text) => {
            text.chars().count() < min_chars
                || text.to_lowercase().contains("abstract not available")
        }
    }
}

/// Strips JATS/HTML markup and collapses whitespace.
pub fn clean_abstract_text(raw: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("static pattern"));
    let stripped = tags.replace_all(raw, " ");
    let decoded = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
