use super::bibliographic;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use reviewbase::ingestion::{deduplicate, Deduplicator};
use reviewbase::records::{BibliographicRecord, SourceDatabase};

fn mixed_corpus() -> Vec<BibliographicRecord> {
    let mut records = Vec::new();
    for i in 0..40 {
        records.push(bibliographic(i, SourceDatabase::Pubmed));
        if i % 3 == 0 {
            let mut wos = bibliographic(i, SourceDatabase::WebOfScience);
            wos.abstract_text = (i % 2 == 0).then(|| format!("Abstract from Web of Science {i}"));
            wos.tags.insert("kidney".into());
            records.push(wos);
        }
        if i % 5 == 0 {
            let mut no_doi = bibliographic(i, SourceDatabase::Pubmed);
            no_doi.doi = None;
            no_doi.title = format!("{}.", no_doi.title.to_uppercase());
            records.push(no_doi);
        }
    }
    // Same key, same priority, different content: the tie must still be order-independent.
    let mut twin = bibliographic(7, SourceDatabase::Pubmed);
    twin.journal = Some("Kidney Int".into());
    records.push(twin);
    records
}

#[test]
fn shuffled_input_yields_identical_canonical_records() {
    let records = mixed_corpus();
    let baseline = deduplicate(&records);
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..20 {
        let mut shuffled = records.clone();
        shuffled.shuffle(&mut rng);
        let outcome = deduplicate(&shuffled);
        assert_eq!(outcome.records, baseline.records);
        assert_eq!(outcome.report, baseline.report);
    }
}

#[test]
fn canonical_count_never_exceeds_input_and_matches_distinct_keys() {
    let records = mixed_corpus();
    let outcome = Deduplicator::new().run(&records);
    assert!(outcome.records.len() <= records.len());
    let distinct: std::collections::BTreeSet<_> = records.iter().map(|r| r.dedup_key()).collect();
    assert_eq!(outcome.records.len(), distinct.len());
    assert_eq!(outcome.report.total_removed(), records.len() - distinct.len());
    assert!(outcome.records.iter().all(|r| !r.sources.is_empty()));

    let unique: Vec<BibliographicRecord> = (0..10)
        .map(|i| bibliographic(100 + i, SourceDatabase::WebOfScience))
        .collect();
    assert_eq!(deduplicate(&unique).records.len(), unique.len());
}

#[test]
fn web_of_science_abstract_wins_over_pubmed_without_one() {
    let records = mixed_corpus();
    let outcome = deduplicate(&records);
    let key = bibliographic(0, SourceDatabase::Pubmed).dedup_key();
    let merged = outcome.records.iter().find(|r| r.key == key).unwrap();
    assert_eq!(merged.representative.source, SourceDatabase::WebOfScience);
    assert!(merged.tags.contains("kidney"));

    let key = bibliographic(3, SourceDatabase::Pubmed).dedup_key();
    let merged = outcome.records.iter().find(|r| r.key == key).unwrap();
    assert_eq!(merged.representative.source, SourceDatabase::Pubmed);
    assert_eq!(merged.sources.len(), 2);
}
