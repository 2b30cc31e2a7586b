//! Remedy daemon entry point.
//!
//! Loads configuration, opens the catalog and the learned playbook
//! store, and either processes a JSON file of anomaly reports given on
//! the command line (printing one recommendation per report) or idles
//! until ctrl-c.

use anyhow::{Context, Result};
use remedy_common::AnomalyReport;
use remedyd::advisory::ConsultationGateway;
use remedyd::catalog::PlaybookCatalog;
use remedyd::config::EngineConfig;
use remedyd::engine::RemediationEngine;
use remedyd::store::LearnedPlaybookStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("remedyd v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path =
        std::env::var("REMEDYD_CONFIG").unwrap_or_else(|_| remedyd::config::CONFIG_PATH.to_string());
    let config = EngineConfig::load_from(&config_path);

    let catalog = Arc::new(PlaybookCatalog::load(&config.catalog.path)?);
    info!("Engine ready ({} catalog entries)", catalog.len());

    let store = Arc::new(LearnedPlaybookStore::open(Path::new(&config.store.db_path))?);
    let gateway = ConsultationGateway::from_config(&config.advisory)?;
    let engine = RemediationEngine::new(&config, catalog, store, gateway);

    match std::env::args().nth(1) {
        Some(path) => process_report_file(&engine, &path).await,
        None => {
            info!("No report file given, idling (ctrl-c to stop)");
            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn process_report_file(engine: &RemediationEngine, path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report file {}", path))?;
    let reports: Vec<AnomalyReport> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path))?;

    info!("Processing {} anomaly reports from {}", reports.len(), path);

    for report in &reports {
        let incident_id = format!("inc-{}", Uuid::new_v4());
        match engine.handle_anomaly(report, None, &incident_id).await {
            Ok(recommendation) => {
                println!("{}", serde_json::to_string_pretty(&recommendation)?);
            }
            Err(e) => {
                // Attempt-scoped failure: surface it and move on to the
                // next report.
                error!(
                    "Anomaly {}/{} not handled: {}",
                    report.anomaly_type, report.service, e
                );
            }
        }
    }

    Ok(())
}
