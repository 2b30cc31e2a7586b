//! Static playbook catalog.
//!
//! Pre-authored remediation procedures, loaded once at startup from a
//! TOML file and immutable for the process lifetime. Ties among entries
//! covering the same anomaly type are broken by priority then id, never
//! by confidence (all catalog entries share one configured confidence).

use anyhow::{Context, Result};
use remedy_common::CatalogEntry;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    entry: Vec<CatalogEntry>,
}

/// Read-only table of pre-authored playbooks keyed by anomaly type.
#[derive(Debug, Clone)]
pub struct PlaybookCatalog {
    entries: Vec<CatalogEntry>,
}

impl PlaybookCatalog {
    /// Load the catalog from a TOML file, falling back to the built-in
    /// default entries when the file is absent.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            warn!("Catalog file {} not found, using built-in catalog", path);
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read catalog {}", path))?;
        let file: CatalogFile =
            toml::from_str(&content).with_context(|| format!("Failed to parse catalog {}", path))?;

        info!("Loaded {} catalog entries from {}", file.entry.len(), path);
        Ok(Self::from_entries(file.entry))
    }

    /// Build a catalog from in-memory entries. Entries are sorted once
    /// here so every lookup is deterministic.
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Self { entries }
    }

    /// All entries covering the given anomaly type, in priority order.
    pub fn find_by_type(&self, anomaly_type: &str) -> Vec<&CatalogEntry> {
        self.entries.iter().filter(|e| e.covers(anomaly_type)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PlaybookCatalog {
    /// Built-in catalog covering the standard NOC anomaly types.
    fn default() -> Self {
        let raw: &[(&str, &[&str], u32)] = &[
            ("high_error_rate_investigation", &["high_error_rate", "high_latency"], 10),
            ("collect_diagnostics", &["high_latency", "hash_mismatch", "vault_sealed", "high_cpu", "jwt_validation_failed"], 90),
            ("network_connectivity_test", &["timeout", "connection_refused"], 10),
            ("restart_application", &["timeout", "connection_refused", "high_error_rate", "jwt_validation_failed", "service_degradation"], 20),
            // Diagnostics come before node recovery for hash mismatches;
            // for consensus failures this is the only entry anyway.
            ("blockchain_node_recovery", &["hash_mismatch", "consensus_failure"], 95),
            ("firewall_emergency_block", &["ddos_detected"], 10),
            ("database_failover", &["replication_broken"], 10),
            ("memory_pressure_relief", &["high_cpu", "high_memory"], 10),
            ("load_balancer_drain", &["service_degradation"], 30),
        ];

        let entries = raw
            .iter()
            .map(|(id, types, priority)| CatalogEntry {
                id: id.to_string(),
                anomaly_types: types.iter().map(|t| t.to_string()).collect(),
                content_ref: format!("playbooks/{}.yml", id),
                priority: *priority,
            })
            .collect();

        Self::from_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_known_types() {
        let catalog = PlaybookCatalog::default();
        for anomaly_type in [
            "high_latency",
            "timeout",
            "connection_refused",
            "hash_mismatch",
            "consensus_failure",
            "vault_sealed",
            "ddos_detected",
            "replication_broken",
            "high_cpu",
            "high_memory",
            "high_error_rate",
            "jwt_validation_failed",
            "service_degradation",
        ] {
            assert!(
                !catalog.find_by_type(anomaly_type).is_empty(),
                "no catalog entry for {}",
                anomaly_type
            );
        }
    }

    #[test]
    fn first_choice_per_type_matches_playbook_mapping() {
        let catalog = PlaybookCatalog::default();
        for (anomaly_type, want) in [
            ("high_latency", "high_error_rate_investigation"),
            ("timeout", "network_connectivity_test"),
            ("hash_mismatch", "collect_diagnostics"),
            ("consensus_failure", "blockchain_node_recovery"),
            ("vault_sealed", "collect_diagnostics"),
            ("high_cpu", "memory_pressure_relief"),
            ("high_error_rate", "high_error_rate_investigation"),
            ("jwt_validation_failed", "restart_application"),
            ("service_degradation", "restart_application"),
        ] {
            assert_eq!(
                catalog.find_by_type(anomaly_type)[0].id,
                want,
                "wrong first choice for {}",
                anomaly_type
            );
        }
    }

    #[test]
    fn unknown_type_has_no_entries() {
        let catalog = PlaybookCatalog::default();
        assert!(catalog.find_by_type("quantum_flux").is_empty());
    }

    #[test]
    fn lookup_order_is_priority_then_id() {
        let catalog = PlaybookCatalog::from_entries(vec![
            CatalogEntry {
                id: "zeta".to_string(),
                anomaly_types: vec!["timeout".to_string()],
                content_ref: "playbooks/zeta.yml".to_string(),
                priority: 10,
            },
            CatalogEntry {
                id: "alpha".to_string(),
                anomaly_types: vec!["timeout".to_string()],
                content_ref: "playbooks/alpha.yml".to_string(),
                priority: 10,
            },
            CatalogEntry {
                id: "beta".to_string(),
                anomaly_types: vec!["timeout".to_string()],
                content_ref: "playbooks/beta.yml".to_string(),
                priority: 5,
            },
        ]);

        let ids: Vec<&str> = catalog
            .find_by_type("timeout")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["beta", "alpha", "zeta"]);
    }

    #[test]
    fn catalog_file_round_trip() {
        let file: CatalogFile = toml::from_str(
            r#"
            [[entry]]
            id = "restart_application"
            anomaly_types = ["timeout"]
            content_ref = "playbooks/restart_application.yml"
            priority = 20
            "#,
        )
        .unwrap();
        let catalog = PlaybookCatalog::from_entries(file.entry);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.find_by_type("timeout")[0].id, "restart_application");
    }
}
