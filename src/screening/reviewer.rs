use super::decision::{Decision, ScreeningDecision};
use crate::error::ReviewError;
use crate::records::{CanonicalRecord, DedupKey};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

const HIGHLIGHT_START: &str = "\x1b[1;33m";
const HIGHLIGHT_END: &str = "\x1b[0m";

/// What the reviewer answered for one presented record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    Decide {
        decision: Decision,
        reason: Option<String>,
    },
    Stop,
}

impl ReviewCommand {
    pub fn decide(decision: Decision) -> Self {
        Self::Decide {
            decision,
            reason: None,
        }
    }

    pub fn decide_with_reason(decision: Decision, reason: impl Into<String>) -> Self {
        Self::Decide {
            decision,
            reason: Some(reason.into()),
        }
    }
}

/// Where the abstract shown to the reviewer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstractOrigin {
    Export,
    Enriched,
    Missing,
}

/// One record as shown to the reviewer.
#[derive(Debug, Clone)]
pub struct Presentation<'a> {
    pub record: &'a CanonicalRecord,
    pub abstract_text: Option<&'a str>,
    pub abstract_origin: AbstractOrigin,
    /// 1-based position within this session's queue.
    pub position: usize,
    pub pending_total: usize,
    /// Stored decision being overwritten, on restarted sessions.
    pub previous: Option<&'a ScreeningDecision>,
}

/// Synchronous reviewer interface, independent of the input transport.
pub trait Reviewer {
    fn review(&mut self, presentation: &Presentation<'_>) -> Result<ReviewCommand>;

    /// Called when committing the last answer failed; the same record is presented again.
    fn commit_failed(&mut self, _key: &DedupKey, _error: &ReviewError) -> Result<()> {
        Ok(())
    }
}

/// Line-oriented terminal reviewer. End of input counts as a stop.
pub struct TerminalReviewer<R, W> {
    input: R,
    output: W,
    highlight: Option<Regex>,
}

impl<R: BufRead, W: Write> TerminalReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            highlight: None,
        }
    }

    /// Highlights every case-insensitive occurrence of `keywords` in titles and abstracts.
    pub fn with_keywords(mut self, keywords: &[String]) -> Result<Self> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if !alternatives.is_empty() {
            let pattern = format!("(?i)({})", alternatives.join("|"));
            self.highlight = Some(Regex::new(&pattern).context("Invalid keyword pattern")?);
        }
        Ok(self)
    }

    fn highlighted(&self, text: &str) -> String {
        match &self.highlight {
            Some(re) => re
                .replace_all(text, format!("{HIGHLIGHT_START}$1{HIGHLIGHT_END}").as_str())
                .into_owned(),
            None => text.to_string(),
        }
    }

    fn render(&mut self, p: &Presentation<'_>) -> Result<()> {
        let record = &p.record.representative;
        let title = self.highlighted(&record.title);
        let body = match p.abstract_text {
            Some(text) => self.highlighted(text),
            None => "(no abstract available)".to_string(),
        };
        writeln!(self.output)?;
        writeln!(self.output, "[{}/{}] {}", p.position, p.pending_total, title)?;
        if !record.authors.is_empty() {
            writeln!(self.output, "Authors: {}", record.authors.join("; "))?;
        }
        let journal = record.journal.as_deref().unwrap_or("unknown venue");
        let year = record
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".into());
        writeln!(self.output, "{journal}, {year} | {}", p.record.sources_label())?;
        if let Some(doi) = &record.doi {
            writeln!(self.output, "DOI: {doi}")?;
        }
        if let Some(conflict) = &p.record.conflict {
            writeln!(
                self.output,
                "Warning: this DOI groups different titles: {}",
                conflict.titles.join(" | ")
            )?;
        }
        if let Some(previous) = p.previous {
            writeln!(self.output, "Previously decided: {}", previous.decision)?;
        }
        if p.abstract_origin == AbstractOrigin::Enriched {
            writeln!(self.output, "Abstract (retrieved from Crossref):")?;
        }
        writeln!(self.output, "{body}")?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read reviewer input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Reviewer for TerminalReviewer<R, W> {
    fn review(&mut self, presentation: &Presentation<'_>) -> Result<ReviewCommand> {
        self.render(presentation)?;
        loop {
            write!(self.output, "[i]nclude / [e]xclude / [u]ncertain / [s]top > ")?;
            self.output.flush()?;
            let Some(answer) = self.read_line()? else {
                return Ok(ReviewCommand::Stop);
            };
            if matches!(answer.to_ascii_lowercase().as_str(), "s" | "stop" | "q" | "quit") {
                return Ok(ReviewCommand::Stop);
            }
            let decision = match answer.parse::<Decision>() {
                Ok(decision) => decision,
                Err(_) => {
                    writeln!(self.output, "Please answer i, e, u or s.")?;
                    continue;
                }
            };
            write!(self.output, "Reason (optional) > ")?;
            self.output.flush()?;
            let reason = self.read_line()?.filter(|r| !r.is_empty());
            return Ok(ReviewCommand::Decide { decision, reason });
        }
    }

    fn commit_failed(&mut self, key: &DedupKey, error: &ReviewError) -> Result<()> {
        writeln!(
            self.output,
            "Could not save the decision for {key}: {error}. Please answer again."
        )?;
        Ok(())
    }
}

/// Replays a prepared list of commands, then stops.
#[derive(Debug, Default)]
pub struct ScriptedReviewer {
    commands: VecDeque<ReviewCommand>,
    pub presented: Vec<DedupKey>,
    pub commit_failures: usize,
}

impl ScriptedReviewer {
    pub fn new(commands: impl IntoIterator<Item = ReviewCommand>) -> Self {
        Self {
            commands: commands.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn from_script(script: &str) -> Result<Self> {
        Ok(Self::new(parse_script(script)?))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let script = fs::read_to_string(path)
            .with_context(|| format!("Unable to read replay file {:?}", path))?;
        Self::from_script(&script)
    }

    pub fn remaining(&self) -> usize {
        self.commands.len()
    }
}

impl Reviewer for ScriptedReviewer {
    fn review(&mut self, presentation: &Presentation<'_>) -> Result<ReviewCommand> {
        self.presented.push(presentation.record.key.clone());
        Ok(self.commands.pop_front().unwrap_or(ReviewCommand::Stop))
    }

    fn commit_failed(&mut self, _key: &DedupKey, _error: &ReviewError) -> Result<()> {
        self.commit_failures += 1;
        Ok(())
    }
}

/// Parses replay lines such as `i`, `e: wrong population` or `s`.
/// Blank lines and lines starting with `#` are ignored.
pub fn parse_script(script: &str) -> Result<Vec<ReviewCommand>> {
    let mut commands = Vec::new();
    for (index, raw) in script.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (head, reason) = match line.split_once(':') {
            Some((head, reason)) => (head.trim(), Some(reason.trim().to_string())),
            None => (line, None),
        };
        if matches!(head.to_ascii_lowercase().as_str(), "s" | "stop") {
            commands.push(ReviewCommand::Stop);
            continue;
        }
        let decision = head
            .parse::<Decision>()
            .with_context(|| format!("Replay line {}: {:?}", index + 1, raw))?;
        commands.push(ReviewCommand::Decide {
            decision,
            reason: reason.filter(|r| !r.is_empty()),
        });
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{BibliographicRecord, SourceDatabase};
    use std::collections::BTreeSet;
    use std::io::Cursor;

    fn canonical() -> CanonicalRecord {
        let representative = BibliographicRecord {
            title: "Urinary copeptin in ADPKD".into(),
            authors: vec!["Torres VE".into()],
            doi: Some("10.1/x".into()),
            source: SourceDatabase::Pubmed,
            abstract_text: Some("Copeptin tracks kidney volume.".into()),
            tags: BTreeSet::new(),
            year: Some(2019),
            journal: Some("Kidney Int".into()),
            source_id: Some("123".into()),
        };
        CanonicalRecord {
            key: representative.dedup_key(),
            sources: [SourceDatabase::Pubmed].into_iter().collect(),
            representative,
            tags: BTreeSet::new(),
            merged_count: 1,
            conflict: None,
        }
    }

    fn presentation(record: &CanonicalRecord) -> Presentation<'_> {
        Presentation {
            record,
            abstract_text: record.representative.abstract_text.as_deref(),
            abstract_origin: AbstractOrigin::Export,
            position: 1,
            pending_total: 1,
            previous: None,
        }
    }

    #[test]
    fn terminal_reviewer_reads_decision_and_reason() {
        let record = canonical();
        let input = Cursor::new("x\ne\nanimal study\n");
        let mut out = Vec::new();
        let command = TerminalReviewer::new(input, &mut out)
            .review(&presentation(&record))
            .unwrap();
        assert_eq!(
            command,
            ReviewCommand::decide_with_reason(Decision::Exclude, "animal study")
        );
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("[1/1] Urinary copeptin in ADPKD"));
        assert!(printed.contains("Please answer i, e, u or s."));
    }

    #[test]
    fn end_of_input_stops_the_session() {
        let record = canonical();
        let mut out = Vec::new();
        let command = TerminalReviewer::new(Cursor::new(""), &mut out)
            .review(&presentation(&record))
            .unwrap();
        assert_eq!(command, ReviewCommand::Stop);
    }

    #[test]
    fn keywords_are_highlighted_case_insensitively() {
        let reviewer = TerminalReviewer::new(Cursor::new(""), Vec::new())
            .with_keywords(&["COPEPTIN".to_string()])
            .unwrap();
        assert_eq!(
            reviewer.highlighted("Copeptin tracks volume"),
            format!("{HIGHLIGHT_START}Copeptin{HIGHLIGHT_END} tracks volume")
        );
    }

    #[test]
    fn scripts_parse_decisions_reasons_and_stops() {
        let commands = parse_script("# day one\ni\n\ne: wrong population\nu:\ns\n").unwrap();
        assert_eq!(
            commands,
            vec![
                ReviewCommand::decide(Decision::Include),
                ReviewCommand::decide_with_reason(Decision::Exclude, "wrong population"),
                ReviewCommand::decide(Decision::Uncertain),
                ReviewCommand::Stop,
            ]
        );
        assert!(parse_script("maybe not").is_err());
    }
}
