use super::decision::{Decision, DecisionLedger};
use super::session_store::ScreeningSessionState;
use crate::records::{CanonicalRecord, DedupKey};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreeningStats {
    pub total: usize,
    pub decided: usize,
    pub pending: usize,
    pub include: usize,
    pub exclude: usize,
    pub uncertain: usize,
    /// Stored decisions whose key no longer matches a canonical record.
    pub orphaned: usize,
    pub flagged_conflicts: usize,
}

impl ScreeningStats {
    pub fn compute(records: &[CanonicalRecord], ledger: &DecisionLedger) -> Self {
        let keys: BTreeSet<&DedupKey> = records.iter().map(|r| &r.key).collect();
        let mut stats = ScreeningStats {
            total: keys.len(),
            flagged_conflicts: records.iter().filter(|r| r.needs_manual_review()).count(),
            ..Default::default()
        };
        for decision in ledger.iter() {
            if !keys.contains(&decision.key) {
                stats.orphaned += 1;
                continue;
            }
            stats.decided += 1;
            match decision.decision {
                Decision::Include => stats.include += 1,
                Decision::Exclude => stats.exclude += 1,
                Decision::Uncertain => stats.uncertain += 1,
            }
        }
        stats.pending = stats.total - stats.decided;
        stats
    }
}

pub fn format_screening_status(stats: &ScreeningStats) -> String {
    let percent = if stats.total == 0 {
        0.0
    } else {
        (stats.decided as f64 / stats.total as f64) * 100.0
    };
    let mut line = format!(
        "Screened {} of {} records ({:.1}%): include {}, exclude {}, uncertain {}, pending {}.",
        stats.decided,
        stats.total,
        percent,
        stats.include,
        stats.exclude,
        stats.uncertain,
        stats.pending
    );
    if stats.flagged_conflicts > 0 {
        line.push_str(&format!(
            " {} records carry a DOI title conflict.",
            stats.flagged_conflicts
        ));
    }
    if stats.orphaned > 0 {
        line.push_str(&format!(
            " {} stored decisions match no current record.",
            stats.orphaned
        ));
    }
    line
}

pub fn format_session_state(state: &ScreeningSessionState) -> String {
    let error = state
        .last_error
        .as_ref()
        .map(|e| format!(", last error: {e}"))
        .unwrap_or_default();
    format!(
        "Session {} -> {:?}: presented {}, decided {} of {} queued, updated {}{}.",
        state.session_id,
        state.status,
        state.presented,
        state.decided,
        state.queued,
        state.updated_at.format("%Y-%m-%d %H:%M"),
        error
    )
}
