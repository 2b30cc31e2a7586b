//! The remediation pipeline.
//!
//! Fixed call graph per anomaly: derive signature → match against
//! catalog + learned store → either recommend the match, or consult the
//! advisory service and synthesize a new learned playbook. Execution
//! feedback arrives separately and only touches the learned store.
//!
//! No lock is held across the advisory round trip; the store's own
//! exclusive section covers only the commit, so slow consultations for
//! one signature never serialize unrelated anomalies.

use crate::advisory::ConsultationGateway;
use crate::catalog::PlaybookCatalog;
use crate::config::EngineConfig;
use crate::matcher::{MatchResult, Matcher};
use crate::store::LearnedPlaybookStore;
use crate::synthesizer::Synthesizer;
use remedy_common::{
    AnomalyReport, BaselineSnapshot, CandidateSource, EngineError, ExecutionOutcome,
    LearnedPlaybook, PlaybookRecommendation,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RemediationEngine {
    store: Arc<LearnedPlaybookStore>,
    matcher: Matcher,
    gateway: ConsultationGateway,
    synthesizer: Synthesizer,
}

impl RemediationEngine {
    pub fn new(
        config: &EngineConfig,
        catalog: Arc<PlaybookCatalog>,
        store: Arc<LearnedPlaybookStore>,
        gateway: ConsultationGateway,
    ) -> Self {
        let matcher = Matcher::new(catalog, Arc::clone(&store), config.matching.clone());
        let synthesizer = Synthesizer::new(Arc::clone(&store));
        Self {
            store,
            matcher,
            gateway,
            synthesizer,
        }
    }

    /// Handle one detected anomaly end to end and produce a playbook
    /// recommendation.
    ///
    /// Errors abort only this attempt; the engine stays usable for
    /// other signatures.
    pub async fn handle_anomaly(
        &self,
        report: &AnomalyReport,
        baseline: Option<&BaselineSnapshot>,
        incident_id: &str,
    ) -> Result<PlaybookRecommendation, EngineError> {
        let signature = report.signature()?;
        info!(
            "Handling anomaly {} ({}) for incident {}",
            signature, report.severity, incident_id
        );

        match self.matcher.find_match(&signature, &report.anomaly_type)? {
            MatchResult::Found(candidate) => {
                let (name, source) = match candidate.source {
                    // Catalog ids double as playbook names.
                    CandidateSource::Existing => (candidate.id.clone(), "existing"),
                    CandidateSource::Learned => {
                        let record = self
                            .store
                            .get_by_signature(&signature)?
                            .ok_or_else(|| EngineError::UnknownPlaybook(candidate.id.clone()))?;
                        (record.name, "learned")
                    }
                };
                Ok(PlaybookRecommendation {
                    playbook_id: candidate.id,
                    playbook_name: name,
                    confidence: candidate.confidence,
                    source: source.to_string(),
                    content_ref: candidate.content_ref,
                    reason: format!(
                        "Matched {} playbook for anomaly type '{}'",
                        source, report.anomaly_type
                    ),
                })
            }
            MatchResult::NoMatch => {
                info!(
                    "No confident playbook for {}, consulting advisory",
                    signature
                );
                // The advisory round trip happens with no store lock
                // held; cancellation here persists nothing.
                let proposal = self.gateway.consult(report, baseline).await?;
                let committed = self.synthesizer.synthesize(
                    &signature,
                    &report.anomaly_type,
                    &proposal,
                    incident_id,
                )?;
                Ok(PlaybookRecommendation {
                    playbook_id: committed.id.clone(),
                    playbook_name: committed.name.clone(),
                    confidence: committed.confidence,
                    source: committed.source.as_str().to_string(),
                    content_ref: committed.content_ref.clone(),
                    reason: format!(
                        "No confident match; synthesized from advisory proposal for incident {}",
                        incident_id
                    ),
                })
            }
        }
    }

    /// Feed an executor outcome back into the corresponding learned
    /// playbook's confidence and counters.
    pub fn apply_outcome(&self, outcome: &ExecutionOutcome) -> Result<LearnedPlaybook, EngineError> {
        let updated =
            self.store
                .apply_outcome(&outcome.playbook_id, outcome.result, outcome.completed_at);
        match &updated {
            Ok(pb) => info!(
                "Execution {} ({:?}) applied to {}: confidence {:.2}",
                outcome.execution_id, outcome.result, pb.id, pb.confidence
            ),
            Err(e) => warn!(
                "Execution {} could not be applied to {}: {}",
                outcome.execution_id, outcome.playbook_id, e
            ),
        }
        updated
    }

    /// Learned playbooks for an anomaly type, for audit and reporting.
    pub fn list_learned(&self, anomaly_type: &str) -> Result<Vec<LearnedPlaybook>, EngineError> {
        self.store.list_by_type(anomaly_type)
    }
}
