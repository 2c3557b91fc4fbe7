use super::session::{ResumeMode, SessionEnd, SessionReport};
use crate::records::CanonicalRecord;
use crate::reviews::Review;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use super::store::atomic_write;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

/// Status lifecycle for screening sessions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Stopped,
    Completed,
    Failed,
}

impl From<SessionEnd> for SessionStatus {
    fn from(end: SessionEnd) -> Self {
        match end {
            SessionEnd::Completed => SessionStatus::Completed,
            SessionEnd::Stopped | SessionEnd::Cancelled => SessionStatus::Stopped,
            SessionEnd::Failed => SessionStatus::Failed,
        }
    }
}

/// JSONL record describing one screening session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningSessionState {
    pub session_id: Uuid,
    pub review_id: Uuid,
    pub status: SessionStatus,
    pub resume: ResumeMode,
    pub queued: u64,
    pub presented: u64,
    pub decided: u64,
    /// Hash of the canonical key set the session screened.
    pub fingerprint: String,
    #[serde(default)]
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScreeningSessionState {
    pub fn new(
        review: &Review,
        session_id: Uuid,
        resume: ResumeMode,
        fingerprint: String,
        queued: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            review_id: review.id,
            status: SessionStatus::Running,
            resume,
            queued: queued as u64,
            presented: 0,
            decided: 0,
            fingerprint,
            last_error: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn finish(&mut self, report: &SessionReport) {
        self.status = report.end.into();
        self.queued = report.queued as u64;
        self.presented = report.presented as u64;
        self.decided = report.decided as u64;
        self.last_error = report.error.as_ref().map(|err| err.to_string());
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.last_error = Some(message.into());
        self.updated_at = Utc::now();
    }
}

/// SHA-256 over the sorted dedup keys, hex encoded.
pub fn fingerprint(records: &[CanonicalRecord]) -> String {
    let mut keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
    keys.sort_unstable();
    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Persists screening sessions as JSONL in the review directory.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn for_review(review: &Review) -> Self {
        Self {
            path: review.sessions_path(),
        }
    }

    /// Loads every readable session record. Lines that fail to parse (such as a
    /// record cut short by a crash) are skipped with a warning.
    pub fn list(&self) -> Result<Vec<ScreeningSessionState>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Unable to read {:?}", self.path))?;
        let mut sessions = Vec::new();
        for (index, line) in data.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            match serde_json::from_str::<ScreeningSessionState>(line) {
                Ok(session) => sessions.push(session),
                Err(err) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %err,
                    "skipping unreadable screening session record"
                ),
            }
        }
        Ok(sessions)
    }

    pub fn latest(&self) -> Result<Option<ScreeningSessionState>> {
        Ok(self.list()?.into_iter().max_by_key(|s| s.started_at))
    }

    pub fn upsert(&self, state: &ScreeningSessionState) -> Result<()> {
        let mut sessions = self.list()?;
        if let Some(existing) = sessions
            .iter_mut()
            .find(|session| session.session_id == state.session_id)
        {
            *existing = state.clone();
        } else {
            sessions.push(state.clone());
        }
        self.persist_all(&sessions)
    }

    fn persist_all(&self, states: &[ScreeningSessionState]) -> Result<()> {
        atomic_write(&self.path, |tmp| {
            for state in states {
                serde_json::to_writer(&mut *tmp, state)?;
                tmp.write_all(b"\n")?;
            }
            Ok(())
        })
        .with_context(|| format!("Unable to write {:?}", self.path))
    }
}
