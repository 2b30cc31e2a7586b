//! Consultation gateway to the external advisory service.
//!
//! Invoked only when the matcher finds no confident playbook. Builds a
//! structured request from the anomaly context, sends it to the advisory
//! collaborator, and validates the reply against the proposal schema.
//! A timeout is retried exactly once; a malformed reply is fatal to the
//! attempt and nothing is persisted.

use crate::config::AdvisoryConfig;
use async_trait::async_trait;
use remedy_common::{AnomalyReport, BaselineSnapshot, EngineError, RemediationProposal};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const ADVISORY_SYSTEM_PROMPT: &str = "You are an expert NOC (Network Operations Center) engineer. \
Analyze the reported anomaly and provide a detailed remediation plan that can be converted \
into an automation playbook. Respond with a single JSON object and nothing else.";

/// Seam to the advisory collaborator. The production implementation is
/// HTTP; tests inject scripted fakes.
#[async_trait]
pub trait AdvisoryClient: Send + Sync {
    /// Send one prompt, return the raw reply text.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, EngineError>;
}

/// HTTP client speaking the OpenAI-compatible chat-completions API
/// (served by Ollama and most hosted advisory backends alike).
pub struct HttpAdvisoryClient {
    config: AdvisoryConfig,
    client: reqwest::Client,
}

impl HttpAdvisoryClient {
    pub fn new(config: AdvisoryConfig) -> Result<Self, EngineError> {
        // No client-level timeout: the gateway bounds each round trip so
        // that cancellation and the retry policy live in one place.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| EngineError::Advisory(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl AdvisoryClient for HttpAdvisoryClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, EngineError> {
        let url = format!("{}/v1/chat/completions", self.config.endpoint);
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.2,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Advisory(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Advisory(format!(
                "advisory returned HTTP {}",
                status
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Advisory(format!("unreadable response body: {}", e)))?;

        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| EngineError::Advisory("response had no message content".to_string()))
    }
}

/// Gateway enforcing the consultation contract: bounded round trip,
/// one retry for timeouts only, strict schema validation.
pub struct ConsultationGateway {
    client: Arc<dyn AdvisoryClient>,
    timeout: Duration,
}

impl ConsultationGateway {
    pub fn new(client: Arc<dyn AdvisoryClient>, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn from_config(config: &AdvisoryConfig) -> Result<Self, EngineError> {
        let timeout_secs = config.timeout_secs;
        let client = HttpAdvisoryClient::new(config.clone())?;
        Ok(Self::new(Arc::new(client), timeout_secs))
    }

    /// Consult the advisory service about an anomaly with no confident
    /// playbook match.
    pub async fn consult(
        &self,
        report: &AnomalyReport,
        baseline: Option<&BaselineSnapshot>,
    ) -> Result<RemediationProposal, EngineError> {
        let user_prompt = build_user_prompt(report, baseline);
        debug!(
            "Consulting advisory for {} on {} ({} chars of context)",
            report.anomaly_type,
            report.service,
            user_prompt.len()
        );

        let mut timed_out_once = false;
        loop {
            match tokio::time::timeout(
                self.timeout,
                self.client.complete(ADVISORY_SYSTEM_PROMPT, &user_prompt),
            )
            .await
            {
                Ok(Ok(reply)) => {
                    let proposal = RemediationProposal::from_reply(&reply)?;
                    info!(
                        "Advisory proposed '{}' ({} steps) for {}",
                        proposal.playbook_name,
                        proposal.remediation_steps.len(),
                        report.anomaly_type
                    );
                    return Ok(proposal);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) if !timed_out_once => {
                    warn!(
                        "Advisory consultation timed out after {:?}, retrying once",
                        self.timeout
                    );
                    timed_out_once = true;
                }
                Err(_) => {
                    return Err(EngineError::ConsultationTimeout {
                        secs: self.timeout.as_secs(),
                    })
                }
            }
        }
    }
}

/// Render the anomaly context the way the advisory expects it: problem
/// statement, metric snapshot, baseline when known, and the required
/// reply schema.
fn build_user_prompt(report: &AnomalyReport, baseline: Option<&BaselineSnapshot>) -> String {
    let metrics =
        serde_json::to_string_pretty(&report.metrics).unwrap_or_else(|_| "{}".to_string());

    let mut prompt = format!(
        "PROBLEM:\n\
         Anomaly type: {}\n\
         Affected service: {}\n\
         Region: {}\n\
         Severity: {}\n\
         Detected at: {}\n",
        report.anomaly_type, report.service, report.region, report.severity, report.detected_at
    );
    if !report.description.is_empty() {
        prompt.push_str(&format!("Description: {}\n", report.description));
    }

    prompt.push_str(&format!("\nCURRENT METRICS:\n{}\n", metrics));

    if let Some(baseline) = baseline {
        if !baseline.metrics.is_empty() {
            let normal = serde_json::to_string_pretty(&baseline.metrics)
                .unwrap_or_else(|_| "{}".to_string());
            prompt.push_str(&format!("\nNORMAL BASELINE VALUES:\n{}\n", normal));
        }
    }

    prompt.push_str(
        "\nProvide your response in the following JSON format:\n\
         {\n\
         \x20 \"diagnosis\": \"Brief diagnosis of the issue\",\n\
         \x20 \"root_cause\": \"Likely root cause\",\n\
         \x20 \"remediation_steps\": [\n\
         \x20   {\"step\": 1, \"action\": \"...\", \"command\": \"...\", \
         \"is_destructive\": false, \"expected_outcome\": \"...\"}\n\
         \x20 ],\n\
         \x20 \"playbook_name\": \"suggested_playbook_name\",\n\
         \x20 \"requires_approval\": true,\n\
         \x20 \"estimated_recovery_time\": \"X minutes\",\n\
         \x20 \"prevention_measures\": [\"...\"]\n\
         }\n",
    );

    prompt
}
