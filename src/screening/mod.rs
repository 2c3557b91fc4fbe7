pub mod agreement;
pub mod decision;
pub mod reviewer;
pub mod runner;
pub mod session;
pub mod session_store;
pub mod status;
pub mod store;

pub use agreement::{compare_ledgers, format_agreement, interpret_kappa, AgreementReport, Discrepancy};
pub use decision::{Decision, DecisionLedger, ScreeningDecision};
pub use reviewer::{
    parse_script, AbstractOrigin, Presentation, ReviewCommand, Reviewer, ScriptedReviewer,
    TerminalReviewer,
};
pub use runner::ScreeningRunner;
pub use session::{
    ResumeMode, ScreeningSession, SessionEnd, SessionOptions, SessionReport, StopSignal,
};
pub use session_store::{fingerprint, ScreeningSessionState, SessionStatus, SessionStore};
pub use status::{format_screening_status, format_session_state, ScreeningStats};
pub use store::{CsvDecisionStore, DecisionStore, MemoryDecisionStore};
