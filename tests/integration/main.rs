use reviewbase::records::{BibliographicRecord, CanonicalRecord, SourceDatabase};
use reviewbase::{Review, ReviewManager};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

pub struct IntegrationHarness {
    workspace: TempDir,
}

impl IntegrationHarness {
    pub fn new() -> Self {
        let workspace = TempDir::new().expect("failed to create temp workspace");
        Self { workspace }
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn review_manager(&self) -> ReviewManager {
        ReviewManager::open(self.workspace.path())
            .expect("failed to initialize ReviewManager for tests")
    }

    pub fn create_review(&self, manager: &mut ReviewManager, name: &str) -> Review {
        manager.create_review(name).expect("failed to create review")
    }

    /// Creates a review holding `count` canonical records with DOIs `10.1/000`...
    pub fn review_with_records(&self, name: &str, count: usize) -> (ReviewManager, Review, Vec<CanonicalRecord>) {
        let mut manager = self.review_manager();
        let review = self.create_review(&mut manager, name);
        let records: Vec<CanonicalRecord> = (0..count).map(canonical).collect();
        manager
            .save_canonical_records(&review, &records)
            .expect("failed to store canonical records");
        (manager, review, records)
    }
}

pub fn bibliographic(index: usize, source: SourceDatabase) -> BibliographicRecord {
    BibliographicRecord {
        title: format!("Urinary biomarker cohort {index}"),
        authors: vec!["Torres VE".into(), "Chapman AB".into()],
        doi: Some(format!("10.1/{index:03}")),
        source,
        abstract_text: None,
        tags: BTreeSet::new(),
        year: Some(2015 + (index % 8) as i32),
        journal: Some("J Am Soc Nephrol".into()),
        source_id: None,
    }
}

pub fn canonical(index: usize) -> CanonicalRecord {
    let representative = bibliographic(index, SourceDatabase::Pubmed);
    CanonicalRecord {
        key: representative.dedup_key(),
        sources: [SourceDatabase::Pubmed].into_iter().collect(),
        representative,
        tags: BTreeSet::new(),
        merged_count: 1,
        conflict: None,
    }
}

mod agreement_stores;
mod dedup_properties;
mod ingest_pipeline;
mod screening_failures;
mod screening_resume;
