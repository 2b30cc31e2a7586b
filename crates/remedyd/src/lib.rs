//! Remedy daemon - self-learning remediation-matching engine.
//!
//! Given a detected anomaly, recommends a remediation playbook: first by
//! matching against the static catalog and previously learned playbooks,
//! then by consulting the external advisory service when nothing
//! confident matches, synthesizing the advisory's proposal into a new
//! learned playbook. Execution outcomes reported by the automation
//! executor feed back into each learned playbook's confidence.

pub mod advisory;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod store;
pub mod synthesizer;
