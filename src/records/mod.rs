pub mod normalize;

pub use normalize::{first_author_surname, normalize_doi, normalize_title};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Bibliographic databases the review exports come from.
///
/// Variant order is the merge priority: earlier sources win ties.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceDatabase {
    Pubmed,
    WebOfScience,
}

impl SourceDatabase {
    pub const PRIORITY: [SourceDatabase; 2] = [SourceDatabase::Pubmed, SourceDatabase::WebOfScience];

    pub fn label(&self) -> &'static str {
        match self {
            SourceDatabase::Pubmed => "PubMed",
            SourceDatabase::WebOfScience => "Web of Science",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            SourceDatabase::Pubmed => "pubmed",
            SourceDatabase::WebOfScience => "web_of_science",
        }
    }
}

impl fmt::Display for SourceDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Key used to group records that describe the same publication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn from_doi(normalized_doi: &str) -> Self {
        Self(format!("doi:{normalized_doi}"))
    }

    pub fn from_title_author(title: &str, first_author: Option<&str>) -> Self {
        let surname = first_author.map(first_author_surname).unwrap_or_default();
        Self(format!("title:{}|{}", normalize_title(title), surname))
    }

    /// Wraps a key read back from persisted state.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_doi(&self) -> bool {
        self.0.starts_with("doi:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry from a bibliographic export, normalized across sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographicRecord {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub doi: Option<String>,
    pub source: SourceDatabase,
    #[serde(default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub journal: Option<String>,
    /// PMID for PubMed rows, UT accession for Web of Science rows.
    #[serde(default)]
    pub source_id: Option<String>,
}

impl BibliographicRecord {
    pub fn dedup_key(&self) -> DedupKey {
        match self.doi.as_deref().and_then(normalize_doi) {
            Some(doi) => DedupKey::from_doi(&doi),
            None => DedupKey::from_title_author(&self.title, self.authors.first().map(String::as_str)),
        }
    }

    pub fn has_abstract(&self) -> bool {
        self.abstract_text
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }
}

/// Marker left on a canonical record whose DOI group holds clearly different titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleConflict {
    pub titles: Vec<String>,
}

/// Deduplicated representative of one or more bibliographic records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub key: DedupKey,
    pub sources: BTreeSet<SourceDatabase>,
    pub representative: BibliographicRecord,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub merged_count: usize,
    #[serde(default)]
    pub conflict: Option<TitleConflict>,
}

impl CanonicalRecord {
    pub fn title(&self) -> &str {
        &self.representative.title
    }

    pub fn needs_manual_review(&self) -> bool {
        self.conflict.is_some()
    }

    pub fn sources_label(&self) -> String {
        self.sources
            .iter()
            .map(SourceDatabase::label)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({})",
            self.representative.title,
            self.representative
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "n.d.".into())
        )
    }
}
