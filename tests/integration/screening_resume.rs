use super::IntegrationHarness;
use anyhow::Result;
use reviewbase::records::DedupKey;
use reviewbase::screening::{
    CsvDecisionStore, Decision, DecisionStore, ResumeMode, ReviewCommand, ScreeningRunner,
    ScreeningSession, ScriptedReviewer, SessionEnd, SessionOptions, SessionStatus, StopSignal,
};
use std::fs;

#[test]
fn stopping_after_n_decisions_resumes_with_the_remaining_records() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, records) = harness.review_with_records("resume", 12);
    let runner = ScreeningRunner::new(&manager, review.clone());

    let mut first = ScriptedReviewer::new(
        (0..5)
            .map(|i| ReviewCommand::decide(Decision::ALL[i % 3]))
            .chain(std::iter::once(ReviewCommand::Stop)),
    );
    let report = runner.run(&mut first, ResumeMode::Continue, None, &StopSignal::new())?;
    assert_eq!(report.end, SessionEnd::Stopped);
    assert_eq!(report.decided, 5);
    let after_first = manager.decision_store(&review).load()?;
    assert_eq!(after_first.len(), 5);

    let mut second = ScriptedReviewer::new(Vec::new());
    runner.run(&mut second, ResumeMode::Continue, None, &StopSignal::new())?;
    let expected: Vec<DedupKey> = records[5..].iter().map(|r| r.key.clone()).collect();
    // The scripted reviewer stops at the first record, so only that one is shown.
    assert_eq!(second.presented, expected[..1].to_vec());

    let mut third = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Include); 7]);
    let report = runner.run(&mut third, ResumeMode::Continue, None, &StopSignal::new())?;
    assert_eq!(report.end, SessionEnd::Completed);
    assert_eq!(third.presented, expected);

    let final_ledger = manager.decision_store(&review).load()?;
    assert_eq!(final_ledger.len(), 12);
    for decision in after_first.iter() {
        assert_eq!(final_ledger.get(&decision.key), Some(decision));
    }

    let latest = runner.latest_session()?.expect("session recorded");
    assert_eq!(latest.status, SessionStatus::Completed);
    assert_eq!(latest.decided, 7);
    Ok(())
}

#[test]
fn crash_after_first_decision_represents_only_the_rest() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, records) = harness.review_with_records("crash", 3);
    let path = review.root.join("decisions.csv");

    {
        let mut session = ScreeningSession::open(
            records.clone(),
            CsvDecisionStore::new(&path),
            SessionOptions::default(),
        )?;
        let first = session.pending().next().expect("pending record").key.clone();
        session.decide(first, Decision::Include, None)?;
        // Dropped here without deciding record 2, as if the process died.
    }

    let runner = ScreeningRunner::new(&manager, review);
    let mut reviewer = ScriptedReviewer::new(vec![
        ReviewCommand::decide(Decision::Exclude),
        ReviewCommand::decide(Decision::Uncertain),
    ]);
    runner.run(&mut reviewer, ResumeMode::Continue, None, &StopSignal::new())?;
    assert_eq!(
        reviewer.presented,
        vec![records[1].key.clone(), records[2].key.clone()]
    );
    let ledger = CsvDecisionStore::new(&path).load()?;
    assert_eq!(ledger.get(&records[0].key).unwrap().decision, Decision::Include);
    Ok(())
}

#[test]
fn re_deciding_keeps_one_row_per_record() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, records) = harness.review_with_records("redecide", 2);
    let runner = ScreeningRunner::new(&manager, review.clone());

    let mut first = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Uncertain); 2]);
    runner.run(&mut first, ResumeMode::Continue, None, &StopSignal::new())?;
    let mut second = ScriptedReviewer::new(vec![
        ReviewCommand::decide_with_reason(Decision::Include, "reports copeptin"),
        ReviewCommand::decide(Decision::Exclude),
    ]);
    runner.run(&mut second, ResumeMode::Restart, None, &StopSignal::new())?;
    assert_eq!(second.presented.len(), 2);

    let contents = fs::read_to_string(review.root.join("decisions.csv"))?;
    assert_eq!(contents.lines().count(), 3);
    let ledger = manager.decision_store(&review).load()?;
    assert_eq!(ledger.len(), 2);
    let first_decision = ledger.get(&records[0].key).unwrap();
    assert_eq!(first_decision.decision, Decision::Include);
    assert_eq!(first_decision.reason.as_deref(), Some("reports copeptin"));
    Ok(())
}

#[test]
fn raised_stop_signal_leaves_the_store_untouched() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, _records) = harness.review_with_records("cancel", 3);
    let runner = ScreeningRunner::new(&manager, review.clone());

    let mut reviewer = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Include)]);
    runner.run(&mut reviewer, ResumeMode::Continue, None, &StopSignal::new())?;
    let before = fs::read_to_string(review.root.join("decisions.csv"))?;

    let stop = StopSignal::new();
    stop.stop();
    let mut again = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Exclude); 3]);
    let report = runner.run(&mut again, ResumeMode::Continue, None, &stop)?;
    assert_eq!(report.end, SessionEnd::Cancelled);
    assert!(again.presented.is_empty());
    assert_eq!(fs::read_to_string(review.root.join("decisions.csv"))?, before);
    assert_eq!(
        runner.latest_session()?.map(|s| s.status),
        Some(SessionStatus::Stopped)
    );
    Ok(())
}

#[test]
fn truncated_session_log_does_not_block_resume() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, records) = harness.review_with_records("torn-log", 3);
    let runner = ScreeningRunner::new(&manager, review.clone());

    let mut first = ScriptedReviewer::new(vec![
        ReviewCommand::decide(Decision::Include),
        ReviewCommand::Stop,
    ]);
    runner.run(&mut first, ResumeMode::Continue, None, &StopSignal::new())?;
    let sessions = review.sessions_path();
    let data = fs::read_to_string(&sessions)?;
    fs::write(&sessions, &data[..data.len() / 2])?;

    let mut second = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Exclude); 2]);
    let report = runner.run(&mut second, ResumeMode::Continue, None, &StopSignal::new())?;
    assert_eq!(report.end, SessionEnd::Completed);
    assert_eq!(second.presented, vec![records[1].key.clone(), records[2].key.clone()]);
    assert_eq!(manager.decision_store(&review).load()?.len(), 3);

    let latest = runner.latest_session()?.expect("session recorded");
    assert_eq!(latest.status, SessionStatus::Completed);
    assert_eq!(latest.queued, 2);
    Ok(())
}
