//! Shared data model for the remedy remediation engine.
//!
//! Everything here is pure: types, validation, and the confidence
//! bookkeeping on learned playbooks. The daemon crate (`remedyd`) owns
//! all IO — catalog loading, the advisory HTTP client, and the SQLite
//! store.

pub mod anomaly;
pub mod error;
pub mod playbook;
pub mod proposal;

pub use anomaly::{AnomalyReport, BaselineSnapshot, Severity, Signature};
pub use error::EngineError;
pub use playbook::{
    CandidateSource, CatalogEntry, ExecutionOutcome, ExecutionResult, LearnedPlaybook,
    PlaybookCandidate, PlaybookRecommendation, PlaybookSource,
};
pub use proposal::{RemediationProposal, RemediationStep};
