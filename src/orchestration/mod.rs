use crate::reviews::Review;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use uuid::Uuid;

/// Type of review events that can be logged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ReviewCreated,
    ReviewSelected,
    ExportsIngested,
    DeduplicationCompleted,
    ScreeningSessionStarted,
    ScreeningSessionStopped,
    ScreeningSessionCompleted,
    ScreeningSessionFailed,
}

/// Audit event stored as JSONL next to the review state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub event_id: Uuid,
    pub review_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

/// Append-only JSONL audit trail kept in the review directory.
pub struct ReviewLog {
    events_path: PathBuf,
}

impl ReviewLog {
    pub fn for_review(review: &Review) -> Self {
        Self {
            events_path: review.events_path(),
        }
    }

    pub fn append_event(&self, event: &ReviewEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .and_then(|mut file| file.write_all(&line))
            .with_context(|| format!("Unable to append to {:?}", self.events_path))
    }

    pub fn load_events(&self) -> Result<Vec<ReviewEvent>> {
        let file = match fs::File::open(&self.events_path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: ReviewEvent = serde_json::from_str(&line).with_context(|| {
                format!("Corrupt event on line {} of {:?}", index + 1, self.events_path)
            })?;
            events.push(event);
        }
        Ok(events)
    }

    pub fn events_of_type(&self, event_type: EventType) -> Result<Vec<ReviewEvent>> {
        Ok(self
            .load_events()?
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect())
    }
}

/// Append a simple review event.
pub fn log_event(review: &Review, event_type: EventType, details: serde_json::Value) -> Result<()> {
    let event = ReviewEvent {
        event_id: Uuid::new_v4(),
        review_id: review.id,
        event_type,
        timestamp: Utc::now(),
        details,
    };
    ReviewLog::for_review(review).append_event(&event)
}
