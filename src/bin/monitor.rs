//! Snapshot monitor
//!
//! Watches the merged traffic snapshot and posts every new version to the
//! detection service, printing an operator banner for each verdict.

use std::time::Duration;
use anyhow::Context;
use dotenv::dotenv;
use log::{error, info, warn};

use ddos_stream_detector::core::{DetectionClient, Ingestor, IngestorSettings, PassOutcome};
use ddos_stream_detector::models::VerdictDetails;
use ddos_stream_detector::utils::current_timestamp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = ddos_stream_detector::config::load_config().context("Failed to load configuration")?;
    let monitor = &config.monitor;

    info!("Starting DDoS Detection Monitor...");
    info!("Monitoring file: {}", monitor.snapshot_path);

    let client = DetectionClient::new(&monitor.api_url, Duration::from_secs(monitor.request_timeout_secs))
        .context("Failed to create detection client")?;
    match client.health().await {
        Ok(true) => info!("Detection service is healthy at {}", monitor.api_url),
        Ok(false) => warn!("Detection service at {} reports unhealthy", monitor.api_url),
        Err(e) => warn!("Detection service at {} is unreachable: {}", monitor.api_url, e),
    }

    let ingestor = Ingestor::new(IngestorSettings::from(monitor), client);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    info!("Waiting for file updates...");
    ingestor.run(shutdown, report).await.context("Snapshot monitor failed")?;
    info!("Monitor stopped");
    Ok(())
}

fn report(outcome: &PassOutcome) {
    if let Some(banner) = banner(outcome) {
        println!("\n[{}] {}", current_timestamp(), banner);
    }
}

/// Operator-facing line for a pass; unchanged snapshots stay silent
fn banner(outcome: &PassOutcome) -> Option<String> {
    match outcome {
        PassOutcome::Submitted(verdict) if verdict.is_attack() => {
            let mut banner = "🚨 WARNING: DDoS attack detected! 🚨".to_string();
            if let VerdictDetails::Ensemble(details) = &verdict.details {
                banner.push_str(&format!(
                    "\nDetails: knn={}, rf={}, records={}, buffer={}",
                    details.knn_prediction,
                    details.rf_prediction,
                    details.data_points_processed,
                    details.current_buffer_size
                ));
            }
            Some(banner)
        }
        PassOutcome::Submitted(verdict) => Some(format!("✅ {}: no attack detected.", verdict.status.as_str())),
        PassOutcome::Failed(e) => Some(format!("❌ Failed to deliver snapshot: {}", e)),
        PassOutcome::Aborted(e) => Some(format!("⚠️ Snapshot skipped: {}", e)),
        PassOutcome::Unchanged => None,
    }
}
