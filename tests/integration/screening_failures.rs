use super::IntegrationHarness;
use anyhow::Result;
use reviewbase::enrichment::{AbstractSource, EnrichmentError};
use reviewbase::error::{self, ReviewError};
use reviewbase::orchestration::{EventType, ReviewLog};
use reviewbase::screening::{
    CsvDecisionStore, Decision, DecisionLedger, DecisionStore, ResumeMode, ReviewCommand,
    ScreeningRunner, ScriptedReviewer, SessionEnd, SessionStatus, StopSignal,
};
use std::io;

/// CSV store whose first `failures` saves fail before touching the file.
struct FlakyStore {
    inner: CsvDecisionStore,
    failures: usize,
}

impl DecisionStore for FlakyStore {
    fn load(&self) -> error::Result<DecisionLedger> {
        self.inner.load()
    }

    fn save(&mut self, ledger: &DecisionLedger) -> error::Result<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(ReviewError::persistence(
                self.inner.path(),
                io::Error::new(io::ErrorKind::Other, "disk full"),
            ));
        }
        self.inner.save(ledger)
    }
}

struct Offline;

impl AbstractSource for Offline {
    fn fetch_abstract(&self, _doi: Option<&str>, _title: &str) -> Result<String, EnrichmentError> {
        Err(EnrichmentError::Unavailable("connection refused".into()))
    }
}

#[test]
fn failed_commit_is_retried_on_the_same_record() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, records) = harness.review_with_records("flaky", 3);
    let runner = ScreeningRunner::new(&manager, review.clone());
    let store = FlakyStore {
        inner: manager.decision_store(&review),
        failures: 2,
    };
    let mut reviewer = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Include); 5]);
    let report = runner.run_with_store(store, &mut reviewer, ResumeMode::Continue, None, &StopSignal::new())?;

    assert_eq!(report.end, SessionEnd::Completed);
    assert_eq!(reviewer.commit_failures, 2);
    assert_eq!(
        reviewer.presented[..3],
        [records[0].key.clone(), records[0].key.clone(), records[0].key.clone()]
    );
    assert_eq!(manager.decision_store(&review).load()?.len(), 3);
    Ok(())
}

#[test]
fn persistent_commit_failure_ends_the_session_and_keeps_prior_decisions() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, records) = harness.review_with_records("broken-disk", 3);
    let runner = ScreeningRunner::new(&manager, review.clone());

    let mut first = ScriptedReviewer::new(vec![
        ReviewCommand::decide(Decision::Exclude),
        ReviewCommand::Stop,
    ]);
    runner.run(&mut first, ResumeMode::Continue, None, &StopSignal::new())?;

    let store = FlakyStore {
        inner: manager.decision_store(&review),
        failures: usize::MAX,
    };
    let mut second = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Include); 10]);
    let report = runner.run_with_store(store, &mut second, ResumeMode::Continue, None, &StopSignal::new())?;
    assert_eq!(report.end, SessionEnd::Failed);
    assert!(matches!(report.error, Some(ReviewError::Persistence { .. })));
    assert_eq!(second.presented.len(), manager.config.screening.max_commit_attempts as usize);

    let ledger = manager.decision_store(&review).load()?;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.get(&records[0].key).unwrap().decision, Decision::Exclude);

    let state = runner.latest_session()?.expect("session recorded");
    assert_eq!(state.status, SessionStatus::Failed);
    assert!(state.last_error.unwrap().contains("disk full"));
    let events = ReviewLog::for_review(&review).load_events()?;
    assert_eq!(
        events.last().map(|e| e.event_type),
        Some(EventType::ScreeningSessionFailed)
    );
    Ok(())
}

#[test]
fn unavailable_enrichment_never_blocks_screening() -> Result<()> {
    let harness = IntegrationHarness::new();
    let (manager, review, _records) = harness.review_with_records("offline", 2);
    let runner = ScreeningRunner::new(&manager, review);
    let mut reviewer = ScriptedReviewer::new(vec![ReviewCommand::decide(Decision::Uncertain); 2]);
    let report = runner.run(
        &mut reviewer,
        ResumeMode::Continue,
        Some(Box::new(Offline)),
        &StopSignal::new(),
    )?;
    assert_eq!(report.end, SessionEnd::Completed);
    assert_eq!(report.decided, 2);
    assert_eq!(report.enrichment_failures, 2);
    Ok(())
}
