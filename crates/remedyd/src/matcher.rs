//! Candidate ranking and the match/no-match decision.
//!
//! Pure read path: the matcher queries the catalog by anomaly type and
//! the learned store by exact signature, ranks the candidates, and
//! applies the confidence threshold. It never mutates the store, so the
//! same catalog and store state always produce the same result.

use crate::catalog::PlaybookCatalog;
use crate::config::MatchingConfig;
use crate::store::LearnedPlaybookStore;
use remedy_common::{CandidateSource, EngineError, PlaybookCandidate, Signature};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a matching pass. `NoMatch` is not an error; it is the
/// trigger for advisory consultation.
#[derive(Debug, Clone)]
pub enum MatchResult {
    Found(PlaybookCandidate),
    NoMatch,
}

pub struct Matcher {
    catalog: Arc<PlaybookCatalog>,
    store: Arc<LearnedPlaybookStore>,
    config: MatchingConfig,
}

impl Matcher {
    pub fn new(
        catalog: Arc<PlaybookCatalog>,
        store: Arc<LearnedPlaybookStore>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            config,
        }
    }

    /// Find the most confident playbook for this signature/type, if one
    /// clears the threshold.
    ///
    /// Ranking: highest confidence wins; on a tie, a catalog (`existing`)
    /// candidate beats a learned one. Among catalog entries the catalog's
    /// own priority order already decided, so the first entry stands in
    /// for the whole catalog side.
    pub fn find_match(
        &self,
        signature: &Signature,
        anomaly_type: &str,
    ) -> Result<MatchResult, EngineError> {
        let mut best: Option<PlaybookCandidate> = None;

        if let Some(entry) = self.catalog.find_by_type(anomaly_type).first() {
            best = Some(PlaybookCandidate {
                id: entry.id.clone(),
                confidence: self.config.catalog_confidence,
                source: CandidateSource::Existing,
                content_ref: entry.content_ref.clone(),
            });
        }

        if let Some(learned) = self.store.get_by_signature(signature)? {
            let candidate = PlaybookCandidate {
                id: learned.id.clone(),
                confidence: learned.confidence,
                source: CandidateSource::Learned,
                content_ref: learned.content_ref.clone(),
            };
            // Strictly greater: an equal-confidence catalog entry keeps
            // the slot (catalog procedures are more vetted).
            best = match best {
                Some(existing) if candidate.confidence > existing.confidence => Some(candidate),
                Some(existing) => Some(existing),
                None => Some(candidate),
            };
        }

        match best {
            Some(candidate) if candidate.confidence >= self.config.threshold => {
                debug!(
                    "Match for {}: {} ({:?}, confidence {:.2})",
                    signature, candidate.id, candidate.source, candidate.confidence
                );
                Ok(MatchResult::Found(candidate))
            }
            Some(candidate) => {
                debug!(
                    "Best candidate {} below threshold ({:.2} < {:.2})",
                    candidate.id, candidate.confidence, self.config.threshold
                );
                Ok(MatchResult::NoMatch)
            }
            None => {
                debug!("No candidates for {} / {}", signature, anomaly_type);
                Ok(MatchResult::NoMatch)
            }
        }
    }
}
