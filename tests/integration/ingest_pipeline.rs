use super::IntegrationHarness;
use anyhow::Result;
use reviewbase::ingestion::{discover_exports, ingest_exports, Deduplicator, ExportFile, IngestionIssueReason};
use reviewbase::records::SourceDatabase;
use reviewbase::screening::{
    Decision, DecisionStore, ResumeMode, ScreeningRunner, ScreeningStats, ScriptedReviewer,
    StopSignal,
};
use std::fs;
use std::path::Path;

const PUBMED_CSV: &str = "\
PMID,Title,Authors,Citation,First Author,Journal/Book,Publication Year,Create Date,PMCID,NIHMS ID,DOI
31000001,Copeptin as a prognostic marker in ADPKD.,\"Boertien WE, Meijer E, Gansevoort RT.\",J Am Soc Nephrol. 2013,Boertien WE,J Am Soc Nephrol,2013,2013/05/01,,,10.1681/ASN.2012080799
31000002,,\"Chapman AB.\",Kidney Int. 2015,Chapman AB,Kidney Int,2015,2015/01/01,,,10.1038/ki.2015.1
31000003,Urinary MCP-1 predicts progression in polycystic kidney disease.,\"Messchendorp AL, Meijer E.\",Nephrol Dial Transplant. 2018,Messchendorp AL,Nephrol Dial Transplant,2018,2018/02/01,,,
";

const WOS_TSV: &str = "\
PT\tAU\tTI\tSO\tDE\tID\tAB\tPY\tDI\tUT
J\tBoertien, WE; Meijer, E\tCopeptin as a prognostic marker in ADPKD\tJOURNAL OF THE AMERICAN SOCIETY OF NEPHROLOGY\tcopeptin; vasopressin\tKIDNEY-VOLUME\tPlasma copeptin was associated with total kidney volume growth and GFR decline in ADPKD patients.\t2013\t10.1681/asn.2012080799\tWOS:000001
J\tTorres, VE\tTolvaptan in later-stage ADPKD\tNEW ENGLAND JOURNAL OF MEDICINE\ttolvaptan\t\t\t2017\t\tWOS:000002
";

fn write_exports(dir: &Path) -> Result<(std::path::PathBuf, std::path::PathBuf)> {
    fs::create_dir_all(dir)?;
    let pubmed = dir.join("pubmed_export.csv");
    let wos = dir.join("savedrecs.txt");
    fs::write(&pubmed, PUBMED_CSV)?;
    fs::write(&wos, WOS_TSV)?;
    Ok((pubmed, wos))
}

#[test]
fn exports_are_ingested_deduplicated_and_screened() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut manager = harness.review_manager();
    let review = harness.create_review(&mut manager, "ADPKD biomarkers");
    let (pubmed, wos) = write_exports(&harness.workspace_path().join("exports"))?;

    let outcome = ingest_exports(&[
        ExportFile::new(&pubmed, SourceDatabase::Pubmed),
        ExportFile::new(&wos, SourceDatabase::WebOfScience),
    ]);
    assert_eq!(outcome.summary.rows_read, 5);
    assert_eq!(outcome.summary.ingested, 4);
    assert_eq!(outcome.summary.skipped, 1);
    assert_eq!(outcome.summary.issues[0].reason, IngestionIssueReason::MissingTitle);

    let dedup = Deduplicator::new().run(&outcome.records);
    assert_eq!(dedup.records.len(), 3);
    assert_eq!(dedup.report.total_removed(), 1);
    let copeptin = dedup
        .records
        .iter()
        .find(|r| r.key.as_str() == "doi:10.1681/asn.2012080799")
        .expect("merged copeptin record");
    assert_eq!(
        copeptin.sources.iter().copied().collect::<Vec<_>>(),
        vec![SourceDatabase::Pubmed, SourceDatabase::WebOfScience]
    );
    assert_eq!(copeptin.representative.source, SourceDatabase::WebOfScience);
    assert!(copeptin.tags.contains("copeptin"));
    assert!(copeptin.conflict.is_none());

    manager.save_canonical_records(&review, &dedup.records)?;
    assert_eq!(manager.load_canonical_records(&review)?, dedup.records);

    let runner = ScreeningRunner::new(&manager, review.clone());
    let mut reviewer = ScriptedReviewer::from_script("i: copeptin cohort\ne: treatment trial\n")?;
    runner.run(&mut reviewer, ResumeMode::Continue, None, &StopSignal::new())?;

    let ledger = manager.decision_store(&review).load()?;
    let stats = ScreeningStats::compute(&dedup.records, &ledger);
    assert_eq!(stats.decided, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.include + stats.exclude, 2);
    assert_eq!(ledger.count(Decision::Include), 1);
    Ok(())
}

#[test]
fn directory_ingestion_detects_both_schemas() -> Result<()> {
    let harness = IntegrationHarness::new();
    let dir = harness.workspace_path().join("exports");
    write_exports(&dir)?;
    fs::write(dir.join("notes.csv"), "Comment,Owner\nrecheck,AL\n")?;

    let (exports, issues) = discover_exports(&dir)?;
    let mut sources: Vec<SourceDatabase> = exports.iter().map(|e| e.source).collect();
    sources.sort();
    assert_eq!(sources, vec![SourceDatabase::Pubmed, SourceDatabase::WebOfScience]);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].reason, IngestionIssueReason::UnrecognizedSchema);
    Ok(())
}
