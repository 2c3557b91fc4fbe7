use std::path::PathBuf;
use thiserror::Error;

/// Domain failures raised by ingestion, deduplication, screening and enrichment.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("schema error in {} line {line}: {message}", .path.display())]
    Schema {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("dedup key {key} groups irreconcilable titles: {}", .titles.join(" | "))]
    DuplicateKeyConflict { key: String, titles: Vec<String> },

    #[error("decision store {} failed: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("abstract enrichment unavailable: {0}")]
    EnrichmentUnavailable(#[from] crate::enrichment::EnrichmentError),
}

impl ReviewError {
    pub fn persistence(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
