use crate::records::DedupKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Title/abstract screening verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Include,
    Exclude,
    Uncertain,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Include, Decision::Exclude, Decision::Uncertain];

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Include => "include",
            Decision::Exclude => "exclude",
            Decision::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Decision {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "i" | "include" => Ok(Decision::Include),
            "e" | "exclude" => Ok(Decision::Exclude),
            "u" | "uncertain" | "maybe" => Ok(Decision::Uncertain),
            other => anyhow::bail!("Unknown screening decision '{other}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningDecision {
    pub key: DedupKey,
    pub decision: Decision,
    pub reason: Option<String>,
    pub decided_at: DateTime<Utc>,
    pub session_id: Option<Uuid>,
}

impl ScreeningDecision {
    pub fn new(key: DedupKey, decision: Decision, reason: Option<String>) -> Self {
        Self {
            key,
            decision,
            reason: reason.filter(|r| !r.trim().is_empty()),
            decided_at: Utc::now(),
            session_id: None,
        }
    }

    pub fn in_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// The active decision per dedup key. Recording a key again replaces its entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionLedger {
    decisions: BTreeMap<DedupKey, ScreeningDecision>,
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the decision that was replaced, if any.
    pub fn record(&mut self, decision: ScreeningDecision) -> Option<ScreeningDecision> {
        self.decisions.insert(decision.key.clone(), decision)
    }

    pub fn get(&self, key: &DedupKey) -> Option<&ScreeningDecision> {
        self.decisions.get(key)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.decisions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Decisions in key order.
    pub fn iter(&self) -> impl Iterator<Item = &ScreeningDecision> {
        self.decisions.values()
    }

    pub fn count(&self, decision: Decision) -> usize {
        self.iter().filter(|d| d.decision == decision).count()
    }
}

impl FromIterator<ScreeningDecision> for DecisionLedger {
    fn from_iter<T: IntoIterator<Item = ScreeningDecision>>(iter: T) -> Self {
        let mut ledger = DecisionLedger::new();
        for decision in iter {
            ledger.record(decision);
        }
        ledger
    }
}
