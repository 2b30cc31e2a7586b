//! Configuration management for remedyd.
//!
//! Loads settings from /etc/remedyd/config.toml or uses defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/remedyd/config.toml";

/// Matching policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum confidence for a candidate to count as a match.
    #[serde(default = "default_match_threshold")]
    pub threshold: f64,

    /// Fixed confidence assigned to every catalog entry.
    #[serde(default = "default_catalog_confidence")]
    pub catalog_confidence: f64,
}

fn default_match_threshold() -> f64 {
    0.8
}

fn default_catalog_confidence() -> f64 {
    0.9
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_match_threshold(),
            catalog_confidence: default_catalog_confidence(),
        }
    }
}

/// Advisory service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// OpenAI-compatible endpoint of the advisory service.
    #[serde(default = "default_advisory_endpoint")]
    pub endpoint: String,

    /// Model to consult for novel anomalies.
    #[serde(default = "default_advisory_model")]
    pub model: String,

    /// Hard ceiling on a single consultation round trip.
    #[serde(default = "default_advisory_timeout")]
    pub timeout_secs: u64,

    /// Optional bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_advisory_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_advisory_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_advisory_timeout() -> u64 {
    30
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_advisory_endpoint(),
            model: default_advisory_model(),
            timeout_secs: default_advisory_timeout(),
            api_key: None,
        }
    }
}

/// Learned playbook store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "/var/lib/remedyd/playbooks.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Static playbook catalog location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

fn default_catalog_path() -> String {
    "/etc/remedyd/catalog.toml".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub advisory: AdvisoryConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl EngineConfig {
    /// Load configuration from the default path, falling back to
    /// built-in defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: &str) -> Self {
        if !Path::new(path).exists() {
            warn!("Config file {} not found, using defaults", path);
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path);
                config
            }
            Err(e) => {
                warn!("Failed to load {}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    fn try_load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
