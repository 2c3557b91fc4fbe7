use super::decision::{Decision, DecisionLedger, ScreeningDecision};
use crate::error::{Result, ReviewError};
use crate::records::DedupKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// Durable home of the decision ledger.
///
/// `save` must replace the stored ledger atomically: after a failed save the
/// previously saved ledger is still what `load` returns.
pub trait DecisionStore {
    fn load(&self) -> Result<DecisionLedger>;
    fn save(&mut self, ledger: &DecisionLedger) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct DecisionRow {
    dedup_key: String,
    decision: Decision,
    reason: Option<String>,
    decided_at: DateTime<Utc>,
    session_id: Option<Uuid>,
}

impl From<&ScreeningDecision> for DecisionRow {
    fn from(d: &ScreeningDecision) -> Self {
        Self {
            dedup_key: d.key.as_str().to_string(),
            decision: d.decision,
            reason: d.reason.clone(),
            decided_at: d.decided_at,
            session_id: d.session_id,
        }
    }
}

impl From<DecisionRow> for ScreeningDecision {
    fn from(row: DecisionRow) -> Self {
        Self {
            key: DedupKey::from_stored(row.dedup_key),
            decision: row.decision,
            reason: row.reason.filter(|r| !r.is_empty()),
            decided_at: row.decided_at,
            session_id: row.session_id,
        }
    }
}

/// CSV decision store with one row per dedup key.
#[derive(Debug, Clone)]
pub struct CsvDecisionStore {
    path: PathBuf,
}

impl CsvDecisionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_ledger(&self) -> io::Result<DecisionLedger> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut ledger = DecisionLedger::new();
        for row in reader.deserialize::<DecisionRow>() {
            ledger.record(row?.into());
        }
        Ok(ledger)
    }

    fn write_ledger(&self, ledger: &DecisionLedger) -> io::Result<()> {
        atomic_write(&self.path, |tmp| {
            let mut writer = csv::Writer::from_writer(tmp);
            for decision in ledger.iter() {
                writer.serialize(DecisionRow::from(decision))?;
            }
            if ledger.is_empty() {
                writer.write_record(["dedup_key", "decision", "reason", "decided_at", "session_id"])?;
            }
            writer.flush()
        })
    }
}

/// Replaces `path` with whatever `write` produces, or leaves it untouched.
///
/// The content goes to a temp file in the same directory, is synced, renamed
/// over `path`, and on Unix the directory entry is synced as well.
pub(crate) fn atomic_write<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    // Same directory so the final rename never crosses filesystems.
    let mut tmp = NamedTempFile::new_in(&dir)?;
    write(&mut tmp)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    #[cfg(unix)]
    fs::File::open(&dir)?.sync_all()?;
    Ok(())
}

impl DecisionStore for CsvDecisionStore {
    fn load(&self) -> Result<DecisionLedger> {
        if !self.path.exists() {
            return Ok(DecisionLedger::new());
        }
        self.read_ledger()
            .map_err(|err| ReviewError::persistence(&self.path, err))
    }

    fn save(&mut self, ledger: &DecisionLedger) -> Result<()> {
        self.write_ledger(ledger)
            .map_err(|err| ReviewError::persistence(&self.path, err))?;
        debug!(path = %self.path.display(), decisions = ledger.len(), "decision store saved");
        Ok(())
    }
}

/// In-memory store for tests and dry runs. Saves can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryDecisionStore {
    saved: DecisionLedger,
    failures_remaining: usize,
    pub save_count: usize,
}

impl MemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: DecisionLedger) -> Self {
        Self {
            saved: ledger,
            ..Default::default()
        }
    }

    /// The next `count` saves fail with a persistence error.
    pub fn fail_next_saves(&mut self, count: usize) {
        self.failures_remaining = count;
    }

    pub fn saved(&self) -> &DecisionLedger {
        &self.saved
    }
}

impl DecisionStore for MemoryDecisionStore {
    fn load(&self) -> Result<DecisionLedger> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, ledger: &DecisionLedger) -> Result<()> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(ReviewError::persistence(
                "<memory>",
                io::Error::new(io::ErrorKind::Other, "injected write failure"),
            ));
        }
        self.saved = ledger.clone();
        self.save_count += 1;
        Ok(())
    }
}
