pub mod enrichment;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod orchestration;
pub mod records;
pub mod reviews;
pub mod screening;

// Re-export commonly used types for convenience.
pub use error::ReviewError;
pub use records::{BibliographicRecord, CanonicalRecord, DedupKey, SourceDatabase};
pub use reviews::{AppConfig, Review, ReviewManager};
pub use screening::{Decision, DecisionLedger, ScreeningDecision, ScreeningSession};
