//! Inter-reviewer agreement between two decision ledgers.
//!
//! Cohen's kappa is computed over the keys both reviewers decided, with the
//! three screening verdicts as categories.

use super::decision::{Decision, DecisionLedger};
use crate::records::DedupKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub key: DedupKey,
    pub first: Decision,
    pub second: Decision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgreementReport {
    pub shared: usize,
    pub agreed: usize,
    pub only_first: usize,
    pub only_second: usize,
    pub kappa: f64,
    pub discrepancies: Vec<Discrepancy>,
}

impl AgreementReport {
    pub fn observed_agreement(&self) -> f64 {
        if self.shared == 0 {
            0.0
        } else {
            self.agreed as f64 / self.shared as f64
        }
    }
}

pub fn compare_ledgers(first: &DecisionLedger, second: &DecisionLedger) -> AgreementReport {
    let mut report = AgreementReport {
        shared: 0,
        agreed: 0,
        only_first: 0,
        only_second: 0,
        kappa: 0.0,
        discrepancies: Vec::new(),
    };
    let mut first_counts = [0usize; 3];
    let mut second_counts = [0usize; 3];

    for a in first.iter() {
        let Some(b) = second.get(&a.key) else {
            report.only_first += 1;
            continue;
        };
        report.shared += 1;
        first_counts[category(a.decision)] += 1;
        second_counts[category(b.decision)] += 1;
        if a.decision == b.decision {
            report.agreed += 1;
        } else {
            report.discrepancies.push(Discrepancy {
                key: a.key.clone(),
                first: a.decision,
                second: b.decision,
            });
        }
    }
    report.only_second = second.len() - report.shared;
    report.kappa = cohen_kappa(report.agreed, report.shared, &first_counts, &second_counts);
    report
}

fn category(decision: Decision) -> usize {
    match decision {
        Decision::Include => 0,
        Decision::Exclude => 1,
        Decision::Uncertain => 2,
    }
}

fn cohen_kappa(agreed: usize, shared: usize, first: &[usize; 3], second: &[usize; 3]) -> f64 {
    if shared == 0 {
        return 0.0;
    }
    let n = shared as f64;
    let observed = agreed as f64 / n;
    let expected: f64 = first
        .iter()
        .zip(second)
        .map(|(a, b)| (*a as f64 / n) * (*b as f64 / n))
        .sum();
    if (1.0 - expected).abs() < f64::EPSILON {
        // Both reviewers used a single category.
        return if agreed == shared { 1.0 } else { 0.0 };
    }
    (observed - expected) / (1.0 - expected)
}

pub fn interpret_kappa(kappa: f64) -> &'static str {
    if kappa < 0.0 {
        "worse than chance"
    } else if kappa < 0.20 {
        "very poor"
    } else if kappa < 0.40 {
        "poor"
    } else if kappa < 0.60 {
        "moderate"
    } else if kappa < 0.80 {
        "good"
    } else {
        "very good"
    }
}

pub fn format_agreement(report: &AgreementReport) -> String {
    let mut lines = vec![format!(
        "Cohen's kappa {:.3} ({}) over {} shared records; observed agreement {:.1}%.",
        report.kappa,
        interpret_kappa(report.kappa),
        report.shared,
        report.observed_agreement() * 100.0
    )];
    if report.only_first > 0 || report.only_second > 0 {
        lines.push(format!(
            "Decided by only one reviewer: first {}, second {}.",
            report.only_first, report.only_second
        ));
    }
    for d in &report.discrepancies {
        lines.push(format!("  {}: {} vs {}", d.key, d.first, d.second));
    }
    lines.join("\n")
}
