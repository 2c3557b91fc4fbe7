use crate::error::ReviewError;
use crate::records::{
    normalize_title, BibliographicRecord, CanonicalRecord, DedupKey, SourceDatabase, TitleConflict,
};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use strsim::jaro_winkler;
use tracing::{info, warn};

pub const DEFAULT_TITLE_CONFLICT_THRESHOLD: f64 = 0.85;

/// Unordered pair of sources, stored in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePair(pub SourceDatabase, pub SourceDatabase);

impl SourcePair {
    pub fn new(a: SourceDatabase, b: SourceDatabase) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

impl fmt::Display for SourcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}", self.0, self.1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConflict {
    pub key: DedupKey,
    pub titles: Vec<String>,
}

impl DedupConflict {
    pub fn to_error(&self) -> ReviewError {
        ReviewError::DuplicateKeyConflict {
            key: self.key.to_string(),
            titles: self.titles.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupReport {
    pub total_input: usize,
    pub total_canonical: usize,
    pub duplicates_removed: BTreeMap<SourcePair, usize>,
    pub conflicts: Vec<DedupConflict>,
}

impl DedupReport {
    pub fn total_removed(&self) -> usize {
        self.total_input - self.total_canonical
    }
}

pub struct DeduplicationOutcome {
    pub records: Vec<CanonicalRecord>,
    pub report: DedupReport,
}

/// Groups records by dedup key and collapses every group into one canonical record.
pub struct Deduplicator {
    title_conflict_threshold: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            title_conflict_threshold: DEFAULT_TITLE_CONFLICT_THRESHOLD,
        }
    }

    pub fn with_title_conflict_threshold(mut self, threshold: f64) -> Self {
        self.title_conflict_threshold = threshold;
        self
    }

    /// Output is ordered by dedup key and does not depend on input order.
    pub fn run(&self, records: &[BibliographicRecord]) -> DeduplicationOutcome {
        let mut groups: BTreeMap<DedupKey, Vec<&BibliographicRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.dedup_key()).or_default().push(record);
        }

        let mut report = DedupReport {
            total_input: records.len(),
            ..Default::default()
        };
        let mut canonical = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            if let Some(record) = self.collapse(key, &members, &mut report) {
                canonical.push(record);
            }
        }
        report.total_canonical = canonical.len();

        info!(
            input = report.total_input,
            canonical = report.total_canonical,
            conflicts = report.conflicts.len(),
            "deduplication completed"
        );
        DeduplicationOutcome {
            records: canonical,
            report,
        }
    }

    fn collapse(
        &self,
        key: DedupKey,
        members: &[&BibliographicRecord],
        report: &mut DedupReport,
    ) -> Option<CanonicalRecord> {
        let representative = members
            .iter()
            .copied()
            .min_by(|a, b| compare_preference(a, b))?;

        let mut representative_skipped = false;
        for member in members {
            // Skip the representative exactly once; identical copies still count as removed.
            if !representative_skipped && std::ptr::eq(*member, representative) {
                representative_skipped = true;
                continue;
            }
            *report
                .duplicates_removed
                .entry(SourcePair::new(representative.source, member.source))
                .or_default() += 1;
        }

        let conflict = if key.is_doi() {
            self.title_conflict(representative, members)
        } else {
            None
        };
        if let Some(conflict) = &conflict {
            let flagged = DedupConflict {
                key: key.clone(),
                titles: conflict.titles.clone(),
            };
            warn!(error = %flagged.to_error(), "flagged for manual review");
            report.conflicts.push(flagged);
        }

        Some(CanonicalRecord {
            key,
            sources: members.iter().map(|m| m.source).collect(),
            representative: representative.clone(),
            tags: members.iter().flat_map(|m| m.tags.iter().cloned()).collect(),
            merged_count: members.len(),
            conflict,
        })
    }

    fn title_conflict(
        &self,
        representative: &BibliographicRecord,
        members: &[&BibliographicRecord],
    ) -> Option<TitleConflict> {
        let reference = normalize_title(&representative.title);
        let diverging = members.iter().any(|member| {
            jaro_winkler(&reference, &normalize_title(&member.title)) < self.title_conflict_threshold
        });
        if !diverging {
            return None;
        }
        let titles: BTreeSet<String> = members.iter().map(|m| m.title.clone()).collect();
        Some(TitleConflict {
            titles: titles.into_iter().collect(),
        })
    }
}

pub fn deduplicate(records: &[BibliographicRecord]) -> DeduplicationOutcome {
    Deduplicator::new().run(records)
}

/// Preferred record first: has an abstract, then source priority, then content.
fn compare_preference(a: &BibliographicRecord, b: &BibliographicRecord) -> Ordering {
    preference_key(a).cmp(&preference_key(b))
}

#[allow(clippy::type_complexity)]
fn preference_key(
    record: &BibliographicRecord,
) -> (
    Reverse<bool>,
    SourceDatabase,
    &str,
    &[String],
    Option<&str>,
    Option<&str>,
    Option<&str>,
    Option<i32>,
    Option<&str>,
    &BTreeSet<String>,
) {
    (
        Reverse(record.has_abstract()),
        record.source,
        record.title.as_str(),
        record.authors.as_slice(),
        record.doi.as_deref(),
        record.abstract_text.as_deref(),
        record.source_id.as_deref(),
        record.year,
        record.journal.as_deref(),
        &record.tags,
    )
}

pub fn format_dedup_report(report: &DedupReport) -> String {
    let mut lines = vec![format!(
        "Deduplicated {} records into {} canonical records ({} duplicates removed).",
        report.total_input,
        report.total_canonical,
        report.total_removed()
    )];
    for (pair, count) in &report.duplicates_removed {
        lines.push(format!("  {pair}: {count}"));
    }
    if !report.conflicts.is_empty() {
        lines.push(format!(
            "{} DOI groups need manual review because their titles disagree:",
            report.conflicts.len()
        ));
        for conflict in &report.conflicts {
            lines.push(format!("  {} -> {}", conflict.key, conflict.titles.join(" | ")));
        }
    }
    lines.join("\n")
}
