//! Advisory proposal schema and strict validation.
//!
//! The advisory collaborator replies with free text that should contain
//! one JSON object matching this schema. Acceptance is all-or-nothing:
//! a missing field, a wrong type, an empty step list, or a blank name
//! rejects the whole proposal. Rejected proposals are never persisted.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// One remediation step. The step language itself is opaque to the
/// engine; steps are carried verbatim into the learned playbook body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationStep {
    pub step: u32,
    pub action: String,
    pub command: String,
    pub is_destructive: bool,
    pub expected_outcome: String,
}

/// Structured remediation proposal from the advisory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationProposal {
    pub diagnosis: String,
    pub root_cause: String,
    pub remediation_steps: Vec<RemediationStep>,
    pub playbook_name: String,
    pub requires_approval: bool,
    pub estimated_recovery_time: String,
    pub prevention_measures: Vec<String>,
}

impl RemediationProposal {
    /// Parse a proposal out of raw advisory reply text.
    ///
    /// Models routinely wrap the JSON object in prose, so the first
    /// top-level `{ ... }` span is extracted before deserializing.
    pub fn from_reply(reply: &str) -> Result<Self, EngineError> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if e > s => &reply[s..=e],
            _ => {
                return Err(EngineError::ConsultationMalformedResponse(
                    "no JSON object in advisory reply".to_string(),
                ))
            }
        };

        let proposal: RemediationProposal = serde_json::from_str(json)
            .map_err(|e| EngineError::ConsultationMalformedResponse(e.to_string()))?;
        proposal.validate()?;
        Ok(proposal)
    }

    /// Schema-level checks beyond what serde types enforce.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.remediation_steps.is_empty() {
            return Err(EngineError::ConsultationMalformedResponse(
                "remediation_steps is empty".to_string(),
            ));
        }
        if self.playbook_name.trim().is_empty() {
            return Err(EngineError::ConsultationMalformedResponse(
                "playbook_name is blank".to_string(),
            ));
        }
        Ok(())
    }

    /// True if any step is flagged destructive; such playbooks always
    /// keep their approval requirement regardless of what the advisory
    /// claimed.
    pub fn has_destructive_step(&self) -> bool {
        self.remediation_steps.iter().any(|s| s.is_destructive)
    }
}
