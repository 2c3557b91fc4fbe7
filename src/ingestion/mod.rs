pub mod dedup;
pub mod error;
pub mod schema;

use crate::records::{BibliographicRecord, SourceDatabase};
use anyhow::Result;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub use dedup::{
    deduplicate, format_dedup_report, DedupConflict, DedupReport, DeduplicationOutcome,
    Deduplicator, SourcePair,
};
pub use error::{IngestionIssue, IngestionIssueReason};
pub use schema::{sniff_source, PubmedRow, SourceRow, WebOfScienceRow};

/// An export file tagged with the database it was downloaded from.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub path: PathBuf,
    pub source: SourceDatabase,
}

impl ExportFile {
    pub fn new(path: impl Into<PathBuf>, source: SourceDatabase) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Counters for one ingestion run over any number of export files.
#[derive(Debug, Clone, Default)]
pub struct IngestionSummary {
    pub total_files: usize,
    pub rows_read: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub issues: Vec<IngestionIssue>,
}

impl IngestionSummary {
    fn absorb(&mut self, other: IngestionSummary) {
        self.total_files += other.total_files;
        self.rows_read += other.rows_read;
        self.ingested += other.ingested;
        self.skipped += other.skipped;
        self.issues.extend(other.issues);
    }

    pub fn describe(&self) -> String {
        let mut line = format!(
            "Read {} rows from {} files: ingested {}, skipped {}.",
            self.rows_read, self.total_files, self.ingested, self.skipped
        );
        if let Some(first) = self.issues.first() {
            let location = match first.line {
                Some(l) => format!("{}:{}", first.path.display(), l),
                None => first.path.display().to_string(),
            };
            line.push_str(&format!(" Example issue: {:?} at {location}.", first.reason));
        }
        line
    }
}

pub struct IngestionOutcome {
    pub records: Vec<BibliographicRecord>,
    pub summary: IngestionSummary,
}

/// Reads every export and normalizes its rows. Bad rows and unreadable files
/// become issues; they never abort the batch.
pub fn ingest_exports(files: &[ExportFile]) -> IngestionOutcome {
    let mut records = Vec::new();
    let mut summary = IngestionSummary::default();
    for file in files {
        let (mut file_records, file_summary) = match file.source {
            SourceDatabase::Pubmed => read_export::<PubmedRow>(&file.path),
            SourceDatabase::WebOfScience => read_export::<WebOfScienceRow>(&file.path),
        };
        info!(
            path = %file.path.display(),
            source = file.source.slug(),
            ingested = file_summary.ingested,
            skipped = file_summary.skipped,
            "export ingested"
        );
        records.append(&mut file_records);
        summary.absorb(file_summary);
    }
    IngestionOutcome { records, summary }
}

/// Walks `folder` and tags every CSV/TXT export whose header matches a known schema.
pub fn discover_exports<P: AsRef<Path>>(folder: P) -> Result<(Vec<ExportFile>, Vec<IngestionIssue>)> {
    let folder = folder.as_ref();
    if !folder.exists() {
        anyhow::bail!("Folder {:?} does not exist", folder);
    }
    let mut exports = Vec::new();
    let mut issues = Vec::new();
    for entry in WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_export_file(e.path()))
    {
        let path = entry.into_path();
        match sniff_source(&path) {
            Ok(Some(source)) => exports.push(ExportFile::new(path, source)),
            Ok(None) => issues.push(IngestionIssue::new(
                path,
                IngestionIssueReason::UnrecognizedSchema,
                "Header matches neither the PubMed nor the Web of Science schema",
            )),
            Err(err) => issues.push(IngestionIssue::new(
                path,
                IngestionIssueReason::ReadFailure,
                format!("{err:#}"),
            )),
        }
    }
    Ok((exports, issues))
}

fn is_export_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()).map(|s| s.to_lowercase()),
        Some(ref ext) if ["csv", "txt", "tsv"].contains(&ext.as_str())
    )
}

fn read_export<T: SourceRow>(path: &Path) -> (Vec<BibliographicRecord>, IngestionSummary) {
    let mut summary = IngestionSummary {
        total_files: 1,
        ..Default::default()
    };
    let mut records = Vec::new();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "export unreadable");
            summary.issues.push(IngestionIssue::new(
                path.to_path_buf(),
                IngestionIssueReason::ReadFailure,
                format!("Unable to open export: {err}"),
            ));
            return (records, summary);
        }
    };
    let mut reader = T::reader_builder().from_reader(file);
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            summary.issues.push(IngestionIssue::new(
                path.to_path_buf(),
                IngestionIssueReason::ReadFailure,
                format!("Unable to read header row: {err}"),
            ));
            return (records, summary);
        }
    };
    let column_count = declared_columns(&headers);
    let headers: csv::StringRecord = headers.iter().take(column_count).collect();

    for row in reader.records() {
        summary.rows_read += 1;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                summary.skipped += 1;
                let mut issue = IngestionIssue::new(
                    path.to_path_buf(),
                    IngestionIssueReason::MalformedRow,
                    err.to_string(),
                );
                if let Some(pos) = err.position() {
                    issue = issue.at_line(pos.line());
                }
                summary.issues.push(issue);
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        if row.iter().all(|field| field.trim().is_empty()) {
            summary.rows_read -= 1;
            continue;
        }
        if let Some(message) = field_count_mismatch(&row, column_count) {
            summary.skipped += 1;
            summary.issues.push(
                IngestionIssue::new(path.to_path_buf(), IngestionIssueReason::MalformedRow, message)
                    .at_line(line),
            );
            continue;
        }
        let parsed: T = match row.deserialize(Some(&headers)) {
            Ok(parsed) => parsed,
            Err(err) => {
                summary.skipped += 1;
                summary.issues.push(
                    IngestionIssue::new(
                        path.to_path_buf(),
                        IngestionIssueReason::MalformedRow,
                        err.to_string(),
                    )
                    .at_line(line),
                );
                continue;
            }
        };
        match parsed.into_record(path, line) {
            Ok(record) => {
                summary.ingested += 1;
                records.push(record);
            }
            Err(err) => {
                summary.skipped += 1;
                summary.issues.push(IngestionIssue::from(err));
            }
        }
    }
    if summary.skipped > 0 {
        warn!(path = %path.display(), skipped = summary.skipped, "rows skipped during ingestion");
    }
    (records, summary)
}

/// Header width without the empty columns a trailing delimiter produces.
fn declared_columns(headers: &csv::StringRecord) -> usize {
    headers
        .iter()
        .collect::<Vec<_>>()
        .iter()
        .rposition(|name| !name.trim().is_empty())
        .map_or(0, |last| last + 1)
}

/// Rows must fill every declared column. Extra fields are tolerated only when empty.
fn field_count_mismatch(row: &csv::StringRecord, columns: usize) -> Option<String> {
    if row.len() < columns {
        return Some(format!("expected {columns} fields, found {}", row.len()));
    }
    if row.iter().skip(columns).any(|field| !field.trim().is_empty()) {
        return Some(format!(
            "expected {columns} fields, found {} with data past the last column",
            row.len()
        ));
    }
    None
}
