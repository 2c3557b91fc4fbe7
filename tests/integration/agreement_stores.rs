use super::{canonical, IntegrationHarness};
use anyhow::Result;
use reviewbase::screening::{
    compare_ledgers, format_agreement, CsvDecisionStore, Decision, DecisionLedger, DecisionStore,
    ScreeningDecision,
};

#[test]
fn two_reviewers_stores_are_compared_on_shared_records() -> Result<()> {
    let harness = IntegrationHarness::new();
    let answers_a = [Decision::Include, Decision::Include, Decision::Exclude, Decision::Exclude];
    let answers_b = [Decision::Include, Decision::Exclude, Decision::Exclude, Decision::Exclude];

    let mut first = CsvDecisionStore::new(harness.workspace_path().join("reviewer_a.csv"));
    let mut second = CsvDecisionStore::new(harness.workspace_path().join("reviewer_b.csv"));
    let ledger_a: DecisionLedger = answers_a
        .iter()
        .enumerate()
        .map(|(i, d)| ScreeningDecision::new(canonical(i).key, *d, None))
        .collect();
    let mut ledger_b: DecisionLedger = answers_b
        .iter()
        .enumerate()
        .map(|(i, d)| ScreeningDecision::new(canonical(i).key, *d, None))
        .collect();
    ledger_b.record(ScreeningDecision::new(canonical(9).key, Decision::Uncertain, None));
    first.save(&ledger_a)?;
    second.save(&ledger_b)?;

    let report = compare_ledgers(&first.load()?, &second.load()?);
    assert_eq!(report.shared, 4);
    assert_eq!(report.agreed, 3);
    assert_eq!(report.only_second, 1);
    // po = 0.75, pe = 0.5 * 0.25 + 0.5 * 0.75 = 0.5
    assert!((report.kappa - 0.5).abs() < 1e-9);
    assert_eq!(report.discrepancies.len(), 1);
    assert_eq!(report.discrepancies[0].key, canonical(1).key);

    let text = format_agreement(&report);
    assert!(text.starts_with("Cohen's kappa 0.500 (moderate)"));
    Ok(())
}
