use super::decision::{Decision, DecisionLedger, ScreeningDecision};
use super::reviewer::{AbstractOrigin, Presentation, ReviewCommand, Reviewer};
use super::store::DecisionStore;
use crate::enrichment::{needs_abstract, AbstractSource, DEFAULT_MIN_ABSTRACT_CHARS};
use crate::error::{self, ReviewError};
use crate::records::{CanonicalRecord, DedupKey};
use crate::reviews::ScreeningSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// Present only records without a stored decision.
    #[default]
    Continue,
    /// Present every record again; new answers overwrite stored ones.
    Restart,
}

/// Cooperative cancellation flag, checked between records only.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub resume: ResumeMode,
    pub max_commit_attempts: usize,
    pub progress_every: usize,
    pub min_abstract_chars: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            resume: ResumeMode::Continue,
            max_commit_attempts: 3,
            progress_every: 10,
            min_abstract_chars: DEFAULT_MIN_ABSTRACT_CHARS,
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &ScreeningSettings, min_abstract_chars: usize) -> Self {
        Self {
            resume: ResumeMode::Continue,
            max_commit_attempts: settings.max_commit_attempts.max(1) as usize,
            progress_every: settings.progress_every.max(1) as usize,
            min_abstract_chars,
        }
    }

    pub fn with_resume(mut self, resume: ResumeMode) -> Self {
        self.resume = resume;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// Every queued record received a committed decision.
    Completed,
    /// The reviewer asked to stop.
    Stopped,
    /// The stop signal was raised.
    Cancelled,
    /// Commits kept failing for one record.
    Failed,
}

#[derive(Debug)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub queued: usize,
    pub presented: usize,
    pub decided: usize,
    pub enriched: usize,
    pub enrichment_failures: usize,
    pub end: SessionEnd,
    pub error: Option<ReviewError>,
}

impl SessionReport {
    fn new(session_id: Uuid, queued: usize) -> Self {
        Self {
            session_id,
            queued,
            presented: 0,
            decided: 0,
            enriched: 0,
            enrichment_failures: 0,
            end: SessionEnd::Completed,
            error: None,
        }
    }

    pub fn describe(&self) -> String {
        let mut line = format!(
            "Session {} {:?}: {} of {} queued records decided.",
            self.session_id, self.end, self.decided, self.queued
        );
        if self.enriched > 0 || self.enrichment_failures > 0 {
            line.push_str(&format!(
                " Abstracts retrieved: {}, lookups failed: {}.",
                self.enriched, self.enrichment_failures
            ));
        }
        if let Some(err) = &self.error {
            line.push_str(&format!(" Last error: {err}."));
        }
        line
    }
}

/// One screening run over a canonical record set.
///
/// The session owns the decision store and the ledger it last committed.
/// Every decision is saved before the next record is shown.
pub struct ScreeningSession<S: DecisionStore> {
    id: Uuid,
    records: Vec<CanonicalRecord>,
    store: S,
    ledger: DecisionLedger,
    options: SessionOptions,
    enrichment: Option<Box<dyn AbstractSource>>,
}

impl<S: DecisionStore> ScreeningSession<S> {
    /// Loads prior decisions from `store`.
    pub fn open(
        records: Vec<CanonicalRecord>,
        store: S,
        options: SessionOptions,
    ) -> error::Result<Self> {
        let ledger = store.load()?;
        Ok(Self {
            id: Uuid::new_v4(),
            records,
            store,
            ledger,
            options,
            enrichment: None,
        })
    }

    pub fn with_enrichment(mut self, source: impl AbstractSource + 'static) -> Self {
        self.enrichment = Some(Box::new(source));
        self
    }

    pub fn with_boxed_enrichment(mut self, source: Box<dyn AbstractSource>) -> Self {
        self.enrichment = Some(source);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ledger(&self) -> &DecisionLedger {
        &self.ledger
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Records still to be presented, in canonical order.
    pub fn pending(&self) -> impl Iterator<Item = &CanonicalRecord> + '_ {
        let restart = self.options.resume == ResumeMode::Restart;
        self.records
            .iter()
            .filter(move |record| restart || !self.ledger.contains(&record.key))
    }

    /// Commits one decision. On failure the ledger keeps its previous state.
    pub fn decide(
        &mut self,
        key: DedupKey,
        decision: Decision,
        reason: Option<String>,
    ) -> error::Result<Option<ScreeningDecision>> {
        let mut next = self.ledger.clone();
        let replaced = next.record(ScreeningDecision::new(key.clone(), decision, reason).in_session(self.id));
        self.store.save(&next)?;
        self.ledger = next;
        debug!(session = %self.id, key = %key, decision = %decision, "decision committed");
        Ok(replaced)
    }

    /// Runs the reviewer over the pending queue until it is empty, the reviewer
    /// stops, `stop` is raised, or commits keep failing.
    ///
    /// Only reviewer I/O errors are returned as `Err`; commit failures end the
    /// session with [`SessionEnd::Failed`] and the error in the report.
    pub fn run<R: Reviewer + ?Sized>(
        &mut self,
        reviewer: &mut R,
        stop: &StopSignal,
    ) -> Result<SessionReport> {
        let restart = self.options.resume == ResumeMode::Restart;
        let queue: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| restart || !self.ledger.contains(&record.key))
            .map(|(index, _)| index)
            .collect();
        let mut report = SessionReport::new(self.id, queue.len());
        info!(
            session = %self.id,
            queued = queue.len(),
            decided_before = self.ledger.len(),
            "screening session started"
        );

        for (offset, index) in queue.iter().copied().enumerate() {
            if stop.is_stopped() {
                report.end = SessionEnd::Cancelled;
                break;
            }
            let record = self.records[index].clone();
            let (abstract_text, abstract_origin) = self.abstract_for(&record, &mut report);
            report.presented += 1;

            let mut failures = 0;
            loop {
                let previous = self.ledger.get(&record.key).cloned();
                let presentation = Presentation {
                    record: &record,
                    abstract_text: abstract_text.as_deref(),
                    abstract_origin,
                    position: offset + 1,
                    pending_total: queue.len(),
                    previous: previous.as_ref(),
                };
                let (decision, reason) = match reviewer.review(&presentation)? {
                    ReviewCommand::Stop => {
                        report.end = SessionEnd::Stopped;
                        info!(session = %self.id, decided = report.decided, "screening stopped by reviewer");
                        return Ok(report);
                    }
                    ReviewCommand::Decide { decision, reason } => (decision, reason),
                };
                match self.decide(record.key.clone(), decision, reason) {
                    Ok(_) => {
                        report.decided += 1;
                        if report.decided % self.options.progress_every.max(1) == 0 {
                            info!(
                                session = %self.id,
                                decided = report.decided,
                                queued = queue.len(),
                                "screening progress"
                            );
                        }
                        break;
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(
                            session = %self.id,
                            key = %record.key,
                            attempt = failures,
                            error = %err,
                            "decision commit failed"
                        );
                        if failures >= self.options.max_commit_attempts {
                            report.end = SessionEnd::Failed;
                            report.error = Some(err);
                            return Ok(report);
                        }
                        reviewer.commit_failed(&record.key, &err)?;
                    }
                }
            }
        }

        info!(
            session = %self.id,
            decided = report.decided,
            end = ?report.end,
            "screening session finished"
        );
        Ok(report)
    }

    fn abstract_for(
        &self,
        record: &CanonicalRecord,
        report: &mut SessionReport,
    ) -> (Option<String>, AbstractOrigin) {
        let exported = record
            .representative
            .abstract_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());
        if !needs_abstract(exported, self.options.min_abstract_chars) {
            return (exported.map(String::from), AbstractOrigin::Export);
        }
        if let Some(source) = &self.enrichment {
            let rep = &record.representative;
            match source.fetch_abstract(rep.doi.as_deref(), &rep.title) {
                Ok(text) => {
                    report.enriched += 1;
                    return (Some(text), AbstractOrigin::Enriched);
                }
                Err(err) => {
                    report.enrichment_failures += 1;
                    warn!(key = %record.key, error = %ReviewError::from(err), "continuing without enrichment");
                }
            }
        }
        match exported {
            Some(text) => (Some(text.to_string()), AbstractOrigin::Export),
            None => (None, AbstractOrigin::Missing),
        }
    }
}
