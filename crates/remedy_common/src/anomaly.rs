//! Anomaly reports and signature derivation.
//!
//! A signature is the sole matching key into the learned playbook store.
//! It is a pure function of the report (`anomaly_type|service|region`);
//! two identical reports always derive the identical signature.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Incident severity, matching the detection collaborator's scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// A detected operational anomaly, produced by the detection collaborator.
/// Immutable input; never persisted by this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomaly_type: String,
    pub service: String,
    pub region: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    /// Opaque metric snapshot at detection time.
    #[serde(default)]
    pub metrics: HashMap<String, serde_json::Value>,
    pub detected_at: DateTime<Utc>,
}

impl AnomalyReport {
    /// Derive the matching signature for this report.
    ///
    /// Fails only when one of the key fields is empty; no side effects,
    /// no clock or randomness.
    pub fn signature(&self) -> Result<Signature, EngineError> {
        for (name, value) in [
            ("anomaly_type", &self.anomaly_type),
            ("service", &self.service),
            ("region", &self.region),
        ] {
            if value.trim().is_empty() {
                return Err(EngineError::MalformedAnomalyReport(format!(
                    "empty field: {}",
                    name
                )));
            }
        }
        Ok(Signature(format!(
            "{}|{}|{}",
            self.anomaly_type, self.service, self.region
        )))
    }
}

/// Expected normal values for the affected metrics, when the detection
/// side has a baseline to offer. Passed through to the advisory prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

/// Stable matching key derived from an anomaly report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(String);

impl Signature {
    /// Wrap an already-derived key, e.g. one read back from the store.
    pub fn new(raw: impl Into<String>) -> Self {
        Signature(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
