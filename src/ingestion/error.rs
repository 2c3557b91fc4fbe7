use crate::error::ReviewError;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionIssueReason {
    MissingTitle,
    MalformedRow,
    UnrecognizedSchema,
    ReadFailure,
}

#[derive(Debug, Clone)]
pub struct IngestionIssue {
    pub path: PathBuf,
    pub line: Option<u64>,
    pub reason: IngestionIssueReason,
    pub message: String,
}

impl IngestionIssue {
    pub fn new(path: PathBuf, reason: IngestionIssueReason, message: impl Into<String>) -> Self {
        Self {
            path,
            line: None,
            reason,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

impl From<ReviewError> for IngestionIssue {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::Schema {
                path,
                line,
                message,
            } => IngestionIssue::new(path, IngestionIssueReason::MissingTitle, message).at_line(line),
            other => IngestionIssue::new(
                PathBuf::new(),
                IngestionIssueReason::MalformedRow,
                other.to_string(),
            ),
        }
    }
}
