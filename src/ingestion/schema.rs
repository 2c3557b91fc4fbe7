use crate::error::{Result, ReviewError};
use crate::records::{normalize_doi, BibliographicRecord, SourceDatabase};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Typed row of one export schema, validated into a [`BibliographicRecord`].
pub trait SourceRow: DeserializeOwned {
    const SOURCE: SourceDatabase;

    fn reader_builder() -> csv::ReaderBuilder;

    fn into_record(self, path: &Path, line: u64) -> Result<BibliographicRecord>;
}

/// Row of a PubMed "Save > CSV" export.
#[derive(Debug, Deserialize)]
pub struct PubmedRow {
    #[serde(rename = "PMID", default)]
    pub pmid: Option<String>,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Authors", default)]
    pub authors: Option<String>,
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(rename = "Publication Year", default)]
    pub year: Option<String>,
    #[serde(rename = "Journal/Book", default)]
    pub journal: Option<String>,
    #[serde(rename = "Abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(rename = "Keywords", default)]
    pub keywords: Option<String>,
}

impl SourceRow for PubmedRow {
    const SOURCE: SourceDatabase = SourceDatabase::Pubmed;

    fn reader_builder() -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.delimiter(b',').flexible(true).trim(csv::Trim::All);
        builder
    }

    fn into_record(self, path: &Path, line: u64) -> Result<BibliographicRecord> {
        let title = require_title(self.title, path, line)?;
        let authors = self
            .authors
            .map(|raw| split_list(raw.trim_end_matches('.'), ','))
            .unwrap_or_default();
        Ok(BibliographicRecord {
            title,
            authors,
            doi: self.doi.as_deref().and_then(normalize_doi),
            source: Self::SOURCE,
            abstract_text: non_empty(self.abstract_text),
            tags: tag_set([self.keywords]),
            year: parse_year(self.year),
            journal: non_empty(self.journal),
            source_id: non_empty(self.pmid),
        })
    }
}

/// Row of a Web of Science tab-delimited export (field-tag headers).
#[derive(Debug, Deserialize)]
pub struct WebOfScienceRow {
    #[serde(rename = "TI", default)]
    pub title: Option<String>,
    #[serde(rename = "AU", default)]
    pub authors: Option<String>,
    #[serde(rename = "DI", default)]
    pub doi: Option<String>,
    #[serde(rename = "AB", default)]
    pub abstract_text: Option<String>,
    #[serde(rename = "DE", default)]
    pub author_keywords: Option<String>,
    #[serde(rename = "ID", default)]
    pub keywords_plus: Option<String>,
    #[serde(rename = "PY", default)]
    pub year: Option<String>,
    #[serde(rename = "SO", default)]
    pub journal: Option<String>,
    #[serde(rename = "UT", default)]
    pub accession: Option<String>,
}

impl SourceRow for WebOfScienceRow {
    const SOURCE: SourceDatabase = SourceDatabase::WebOfScience;

    fn reader_builder() -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .trim(csv::Trim::All);
        builder
    }

    fn into_record(self, path: &Path, line: u64) -> Result<BibliographicRecord> {
        let title = require_title(self.title, path, line)?;
        Ok(BibliographicRecord {
            title,
            authors: self.authors.map(|raw| split_list(&raw, ';')).unwrap_or_default(),
            doi: self.doi.as_deref().and_then(normalize_doi),
            source: Self::SOURCE,
            abstract_text: non_empty(self.abstract_text),
            tags: tag_set([self.author_keywords, self.keywords_plus]),
            year: parse_year(self.year),
            journal: non_empty(self.journal),
            source_id: non_empty(self.accession),
        })
    }
}

/// Guesses the export schema from the header line of `path`.
pub fn sniff_source(path: &Path) -> anyhow::Result<Option<SourceDatabase>> {
    let file = File::open(path).with_context(|| format!("Unable to open {:?}", path))?;
    let mut header = String::new();
    BufReader::new(file)
        .read_line(&mut header)
        .with_context(|| format!("Unable to read header of {:?}", path))?;
    let header = header.trim_start_matches('\u{feff}').trim_end();

    let tab_fields: Vec<&str> = header.split('\t').map(str::trim).collect();
    if tab_fields.contains(&"TI") && tab_fields.contains(&"AU") {
        return Ok(Some(SourceDatabase::WebOfScience));
    }
    let comma_fields: Vec<&str> = header
        .split(',')
        .map(|field| field.trim().trim_matches('"'))
        .collect();
    if comma_fields.contains(&"Title") && (comma_fields.contains(&"Authors") || comma_fields.contains(&"PMID")) {
        return Ok(Some(SourceDatabase::Pubmed));
    }
    Ok(None)
}

fn require_title(title: Option<String>, path: &Path, line: u64) -> Result<String> {
    non_empty(title).ok_or_else(|| ReviewError::Schema {
        path: path.to_path_buf(),
        line,
        message: "row has no title".into(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

fn tag_set<const N: usize>(columns: [Option<String>; N]) -> BTreeSet<String> {
    columns
        .into_iter()
        .flatten()
        .flat_map(|raw| split_list(&raw, ';'))
        .map(|tag| tag.to_lowercase())
        .collect()
}

fn parse_year(raw: Option<String>) -> Option<i32> {
    raw.and_then(|value| value.trim().get(..4).and_then(|y| y.parse().ok()))
}
