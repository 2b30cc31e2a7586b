//! Playbook records, match candidates, and execution feedback bookkeeping.

use crate::anomaly::Signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pre-authored remediation procedure from the static catalog.
///
/// Catalog entries are loaded once at startup and never mutated; in
/// particular their confidence is a single configured value shared by
/// all entries, so ties among them are broken by `priority` (ascending),
/// never by confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    /// Anomaly types this procedure covers.
    pub anomaly_types: Vec<String>,
    /// Opaque pointer to the runnable procedure, owned by the executor.
    pub content_ref: String,
    /// Deterministic tie-break order; lower wins.
    #[serde(default)]
    pub priority: u32,
}

impl CatalogEntry {
    pub fn covers(&self, anomaly_type: &str) -> bool {
        self.anomaly_types.iter().any(|t| t == anomaly_type)
    }
}

/// Where a learned playbook came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookSource {
    LlmGenerated,
    HumanCreated,
}

impl PlaybookSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybookSource::LlmGenerated => "llm_generated",
            PlaybookSource::HumanCreated => "human_created",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "llm_generated" => Some(PlaybookSource::LlmGenerated),
            "human_created" => Some(PlaybookSource::HumanCreated),
            _ => None,
        }
    }
}

/// A remediation procedure synthesized from advisory output.
///
/// The store owns the canonical copy; everything outside the store sees
/// read-only snapshots. Exactly one record may exist per signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedPlaybook {
    /// Deterministic id derived from the signature, so a retried
    /// synthesis lands on the same record.
    pub id: String,
    pub anomaly_signature: Signature,
    pub anomaly_type: String,
    pub name: String,
    pub confidence: f64,
    pub source: PlaybookSource,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub origin_incident_id: String,
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_execution_at: Option<DateTime<Utc>>,
    /// Synthesized procedure body (the validated proposal's steps as
    /// JSON). Opaque to this engine.
    pub content: String,
    pub content_ref: String,
}

impl LearnedPlaybook {
    /// Starting confidence at synthesis; set once, never reapplied.
    pub const INITIAL_CONFIDENCE: f64 = 0.75;
    /// Confidence gain per successful execution.
    pub const CONFIDENCE_GAIN: f64 = 0.05;
    /// Confidence loss per failed execution.
    pub const CONFIDENCE_LOSS: f64 = 0.10;
    /// Confidence never rises above this.
    pub const CONFIDENCE_CEILING: f64 = 0.95;
    /// Confidence never falls below this.
    pub const CONFIDENCE_FLOOR: f64 = 0.50;

    /// Record a successful execution reported by the executor.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.confidence = (self.confidence + Self::CONFIDENCE_GAIN).min(Self::CONFIDENCE_CEILING);
        self.success_count += 1;
        self.execution_count += 1;
        self.last_execution_at = Some(at);
    }

    /// Record a failed execution reported by the executor.
    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.confidence = (self.confidence - Self::CONFIDENCE_LOSS).max(Self::CONFIDENCE_FLOOR);
        self.failure_count += 1;
        self.execution_count += 1;
        self.last_execution_at = Some(at);
    }
}

/// Candidate source considered by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    /// Pre-authored catalog procedure.
    Existing,
    /// Previously synthesized learned playbook.
    Learned,
}

/// A ranked match produced by the matcher. Transient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookCandidate {
    pub id: String,
    pub confidence: f64,
    pub source: CandidateSource,
    pub content_ref: String,
}

/// The engine's answer to the incident/approval surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookRecommendation {
    pub playbook_id: String,
    pub playbook_name: String,
    pub confidence: f64,
    /// "existing", "learned", or "llm_generated" for a record synthesized
    /// during this very attempt.
    pub source: String,
    pub content_ref: String,
    pub reason: String,
}

/// Result of an executor run, delivered after a recommended playbook ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub execution_id: String,
    pub playbook_id: String,
    pub result: ExecutionResult,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionResult {
    Success,
    Failure,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn learned(confidence: f64) -> LearnedPlaybook {
        LearnedPlaybook {
            id: "lp-test".to_string(),
            anomaly_signature: Signature::new("a|b|c"),
            anomaly_type: "a".to_string(),
            name: "test".to_string(),
            confidence,
            source: PlaybookSource::LlmGenerated,
            created_at: Utc::now(),
            created_by: "advisory".to_string(),
            origin_incident_id: "inc-1".to_string(),
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            last_execution_at: None,
            content: "{}".to_string(),
            content_ref: "learned/test.json".to_string(),
        }
    }

    #[test]
    fn success_raises_confidence_by_step() {
        let mut pb = learned(LearnedPlaybook::INITIAL_CONFIDENCE);
        pb.record_success(Utc::now());
        assert_relative_eq!(pb.confidence, 0.80);
        pb.record_success(Utc::now());
        assert_relative_eq!(pb.confidence, 0.85);
        assert_eq!(pb.success_count, 2);
        assert_eq!(pb.execution_count, 2);
    }

    #[test]
    fn confidence_caps_at_ceiling() {
        let mut pb = learned(0.95);
        pb.record_success(Utc::now());
        assert_relative_eq!(pb.confidence, LearnedPlaybook::CONFIDENCE_CEILING);
    }

    #[test]
    fn failure_floors_at_half() {
        let mut pb = learned(LearnedPlaybook::INITIAL_CONFIDENCE);
        pb.record_failure(Utc::now());
        assert_relative_eq!(pb.confidence, 0.65);
        pb.record_failure(Utc::now());
        assert_relative_eq!(pb.confidence, 0.55);
        pb.record_failure(Utc::now());
        assert_relative_eq!(pb.confidence, LearnedPlaybook::CONFIDENCE_FLOOR);
        assert_eq!(pb.failure_count, 3);
    }

    #[test]
    fn counters_stay_consistent() {
        let mut pb = learned(0.75);
        for i in 0..50u64 {
            if i % 3 == 0 {
                pb.record_failure(Utc::now());
            } else {
                pb.record_success(Utc::now());
            }
            assert_eq!(pb.execution_count, pb.success_count + pb.failure_count);
            assert!(pb.confidence >= LearnedPlaybook::CONFIDENCE_FLOOR);
            assert!(pb.confidence <= LearnedPlaybook::CONFIDENCE_CEILING);
        }
    }

    #[test]
    fn last_execution_is_stamped() {
        let mut pb = learned(0.75);
        assert!(pb.last_execution_at.is_none());
        let at = Utc::now();
        pb.record_success(at);
        assert_eq!(pb.last_execution_at, Some(at));
    }
}
