//! Error taxonomy for the remediation engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Malformed anomaly report: {0}")]
    MalformedAnomalyReport(String),

    #[error("Advisory consultation timed out after {secs}s (retried once)")]
    ConsultationTimeout { secs: u64 },

    #[error("Advisory response failed schema validation: {0}")]
    ConsultationMalformedResponse(String),

    /// Internal: a concurrent writer held the store. Consumed by the
    /// bounded retry inside the store; surfaced as `PersistenceUnavailable`
    /// once the attempt budget is spent.
    #[error("Store conflict, retry")]
    StoreConflict,

    #[error("Learned playbook store unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Unknown playbook id: {0}")]
    UnknownPlaybook(String),

    #[error("Advisory transport error: {0}")]
    Advisory(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors that abort only the current anomaly-handling
    /// attempt; the engine itself stays healthy for other signatures.
    pub fn is_attempt_scoped(&self) -> bool {
        !matches!(self, EngineError::PersistenceUnavailable(_))
    }
}
