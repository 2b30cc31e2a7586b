//! Playbook synthesis from validated advisory proposals.
//!
//! Converts a `RemediationProposal` into a `LearnedPlaybook` and commits
//! it through the store's idempotent upsert. The id is a pure function
//! of the signature, so a retried or racing synthesis converges on the
//! same record; whoever loses the race receives the winner's record.

use crate::store::LearnedPlaybookStore;
use remedy_common::{
    EngineError, LearnedPlaybook, PlaybookSource, RemediationProposal, Signature,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

pub struct Synthesizer {
    store: Arc<LearnedPlaybookStore>,
}

impl Synthesizer {
    pub fn new(store: Arc<LearnedPlaybookStore>) -> Self {
        Self { store }
    }

    /// Build and commit a learned playbook for this signature.
    ///
    /// Postcondition: exactly one record exists for the signature; the
    /// returned record is the committed one, which under a concurrent
    /// race is not necessarily the one built here.
    pub fn synthesize(
        &self,
        signature: &Signature,
        anomaly_type: &str,
        proposal: &RemediationProposal,
        origin_incident_id: &str,
    ) -> Result<LearnedPlaybook, EngineError> {
        let name = sanitize_name(&proposal.playbook_name);
        let candidate = LearnedPlaybook {
            id: playbook_id(signature),
            anomaly_signature: signature.clone(),
            anomaly_type: anomaly_type.to_string(),
            name: name.clone(),
            confidence: LearnedPlaybook::INITIAL_CONFIDENCE,
            source: PlaybookSource::LlmGenerated,
            created_at: Utc::now(),
            created_by: "advisory".to_string(),
            origin_incident_id: origin_incident_id.to_string(),
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            last_execution_at: None,
            content: serde_json::to_string_pretty(proposal)?,
            content_ref: format!("learned/{}.json", name),
        };

        debug!(
            "Synthesizing {} for signature {} (origin {})",
            candidate.id, signature, origin_incident_id
        );
        self.store.upsert_if_absent(candidate)
    }
}

/// Deterministic learned-playbook id: `lp-` + first 12 hex chars of the
/// signature's SHA-256.
pub fn playbook_id(signature: &Signature) -> String {
    let digest = Sha256::digest(signature.as_str().as_bytes());
    let hex = format!("{:x}", digest);
    format!("lp-{}", &hex[..12])
}

/// Advisory-suggested names arrive in free form; normalize to the same
/// shape the catalog uses.
fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let collapsed = cleaned
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if collapsed.is_empty() {
        "unnamed_playbook".to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_common::RemediationStep;

    fn proposal(name: &str) -> RemediationProposal {
        RemediationProposal {
            diagnosis: "diagnosis".to_string(),
            root_cause: "root cause".to_string(),
            remediation_steps: vec![RemediationStep {
                step: 1,
                action: "restart".to_string(),
                command: "systemctl restart svc".to_string(),
                is_destructive: false,
                expected_outcome: "service healthy".to_string(),
            }],
            playbook_name: name.to_string(),
            requires_approval: true,
            estimated_recovery_time: "5 minutes".to_string(),
            prevention_measures: vec!["monitor".to_string()],
        }
    }

    #[test]
    fn id_is_deterministic_per_signature() {
        let sig = Signature::new("timeout|api|usa");
        assert_eq!(playbook_id(&sig), playbook_id(&sig));
        assert_ne!(playbook_id(&sig), playbook_id(&Signature::new("timeout|api|india")));
        assert!(playbook_id(&sig).starts_with("lp-"));
        assert_eq!(playbook_id(&sig).len(), 15);
    }

    #[test]
    fn name_is_sanitized() {
        assert_eq!(sanitize_name("Vault Unseal Recovery"), "vault_unseal_recovery");
        assert_eq!(sanitize_name("  pool--exhaustion  "), "pool_exhaustion");
        assert_eq!(sanitize_name("///"), "unnamed_playbook");
    }

    #[test]
    fn synthesis_commits_with_initial_confidence() {
        let store = Arc::new(LearnedPlaybookStore::open_in_memory().unwrap());
        let synth = Synthesizer::new(Arc::clone(&store));
        let sig = Signature::new("vault_sealed|vault|usa");

        let pb = synth
            .synthesize(&sig, "vault_sealed", &proposal("Vault Unseal Recovery"), "inc-007")
            .unwrap();

        assert_eq!(pb.confidence, LearnedPlaybook::INITIAL_CONFIDENCE);
        assert_eq!(pb.source, PlaybookSource::LlmGenerated);
        assert_eq!(pb.execution_count, 0);
        assert_eq!(pb.origin_incident_id, "inc-007");
        assert_eq!(pb.content_ref, "learned/vault_unseal_recovery.json");
        // Body carries the whole validated proposal.
        let body: RemediationProposal = serde_json::from_str(&pb.content).unwrap();
        assert_eq!(body.remediation_steps.len(), 1);

        let fetched = store.get_by_signature(&sig).unwrap().unwrap();
        assert_eq!(fetched.id, pb.id);
    }

    #[test]
    fn second_synthesis_returns_committed_record() {
        let store = Arc::new(LearnedPlaybookStore::open_in_memory().unwrap());
        let synth = Synthesizer::new(Arc::clone(&store));
        let sig = Signature::new("vault_sealed|vault|usa");

        let first = synth
            .synthesize(&sig, "vault_sealed", &proposal("first"), "inc-001")
            .unwrap();
        let second = synth
            .synthesize(&sig, "vault_sealed", &proposal("second"), "inc-002")
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "first");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.origin_incident_id, "inc-001");
    }
}
