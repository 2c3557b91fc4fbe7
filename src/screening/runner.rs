use super::reviewer::Reviewer;
use super::session::{ResumeMode, ScreeningSession, SessionEnd, SessionOptions, SessionReport, StopSignal};
use super::session_store::{fingerprint, ScreeningSessionState, SessionStore};
use super::store::DecisionStore;
use crate::enrichment::AbstractSource;
use crate::orchestration::{log_event, EventType};
use crate::reviews::{Review, ReviewManager};
use anyhow::{Context, Result};
use serde_json::json;
use tracing::warn;

/// Runs screening sessions for one review and keeps their audit trail.
pub struct ScreeningRunner<'a> {
    manager: &'a ReviewManager,
    review: Review,
    sessions: SessionStore,
}

impl<'a> ScreeningRunner<'a> {
    pub fn new(manager: &'a ReviewManager, review: Review) -> Self {
        let sessions = manager.session_store(&review);
        Self {
            manager,
            review,
            sessions,
        }
    }

    pub fn review(&self) -> &Review {
        &self.review
    }

    pub fn options(&self, resume: ResumeMode) -> SessionOptions {
        SessionOptions::from_settings(
            &self.manager.config.screening,
            self.manager.config.enrichment.min_abstract_chars,
        )
        .with_resume(resume)
    }

    /// Screens the review's canonical records against its CSV decision store.
    pub fn run<R: Reviewer + ?Sized>(
        &self,
        reviewer: &mut R,
        resume: ResumeMode,
        enrichment: Option<Box<dyn AbstractSource>>,
        stop: &StopSignal,
    ) -> Result<SessionReport> {
        let store = self.manager.decision_store(&self.review);
        self.run_with_store(store, reviewer, resume, enrichment, stop)
    }

    pub fn run_with_store<S: DecisionStore, R: Reviewer + ?Sized>(
        &self,
        store: S,
        reviewer: &mut R,
        resume: ResumeMode,
        enrichment: Option<Box<dyn AbstractSource>>,
        stop: &StopSignal,
    ) -> Result<SessionReport> {
        let records = self.manager.load_canonical_records(&self.review)?;
        if records.is_empty() {
            anyhow::bail!(
                "Review '{}' has no canonical records; run `reviewbase ingest` first",
                self.review.slug
            );
        }
        let fingerprint = fingerprint(&records);
        match self.sessions.latest() {
            Ok(Some(previous)) if previous.fingerprint != fingerprint => warn!(
                review = %self.review.slug,
                previous_session = %previous.session_id,
                "canonical record set changed since the last screening session"
            ),
            Ok(_) => {}
            Err(err) => warn!(
                review = %self.review.slug,
                error = %format!("{err:#}"),
                "previous screening sessions unavailable"
            ),
        }

        let mut session = ScreeningSession::open(records, store, self.options(resume))
            .context("Unable to load prior screening decisions")?;
        if let Some(source) = enrichment {
            session = session.with_boxed_enrichment(source);
        }
        let queued = session.pending().count();
        let mut state =
            ScreeningSessionState::new(&self.review, session.id(), resume, fingerprint, queued);
        self.sessions.upsert(&state)?;
        log_event(
            &self.review,
            EventType::ScreeningSessionStarted,
            json!({
                "session_id": state.session_id,
                "resume": resume,
                "pending": queued,
                "decided_before": session.ledger().len(),
            }),
        )?;

        let report = match session.run(reviewer, stop) {
            Ok(report) => report,
            Err(err) => {
                state.mark_failed(format!("{err:#}"));
                self.sessions.upsert(&state)?;
                log_event(
                    &self.review,
                    EventType::ScreeningSessionFailed,
                    json!({ "session_id": state.session_id, "error": format!("{err:#}") }),
                )?;
                return Err(err);
            }
        };

        state.finish(&report);
        self.sessions.upsert(&state)?;
        let event_type = match report.end {
            SessionEnd::Completed => EventType::ScreeningSessionCompleted,
            SessionEnd::Stopped | SessionEnd::Cancelled => EventType::ScreeningSessionStopped,
            SessionEnd::Failed => EventType::ScreeningSessionFailed,
        };
        log_event(
            &self.review,
            event_type,
            json!({
                "session_id": report.session_id,
                "end": report.end,
                "presented": report.presented,
                "decided": report.decided,
                "enriched": report.enriched,
                "enrichment_failures": report.enrichment_failures,
                "error": report.error.as_ref().map(|err| err.to_string()),
            }),
        )?;
        Ok(report)
    }

    pub fn latest_session(&self) -> Result<Option<ScreeningSessionState>> {
        self.sessions.latest()
    }
}
