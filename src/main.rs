//! DDoS Detection Service
//!
//! This is the main entry point for the detection service.
//! It loads the classifiers, creates the sliding window buffer and starts the web server.

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;

use ddos_stream_detector::api::{self, ApiState};
use ddos_stream_detector::core::{load_ensemble, DetectionService};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    info!("Starting DDoS Detection Service...");

    // Load configuration
    let config = ddos_stream_detector::config::load_config().context("Failed to load configuration")?;

    let metrics = if config.metrics.enabled {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to install metrics recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Load classifiers and create the buffer owner
    let ensemble = load_ensemble(&config.models, config.detection.window_size);
    let (primary, secondary) = ensemble.names();
    info!(
        "Ensemble {} + {} over a window of {} labels",
        primary, secondary, config.detection.window_size
    );
    let service = Arc::new(DetectionService::new(&config.detection, ensemble));

    // Create API state
    let state = web::Data::new(ApiState { service, metrics });

    // Start HTTP server
    info!("Listening on {}:{}", config.server.host, config.server.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
