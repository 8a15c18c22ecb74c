//! Configuration management for the detection pipeline.
//!
//! This module handles loading the service and monitor configuration
//! from built-in defaults, an optional TOML file and environment variables.

use std::env;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use crate::models::Config;

/// Load configuration from defaults, `CONFIG_FILE` and `DDOS_*` variables
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());
    let defaults = Config::default();

    let config = ConfigBuilder::builder()
        .set_default("server.host", defaults.server.host)?
        .set_default("server.port", defaults.server.port as i64)?
        .set_default("detection.window_size", defaults.detection.window_size as i64)?
        .set_default("detection.attack_length_threshold", defaults.detection.attack_length_threshold)?
        .set_default("models.knn_path", defaults.models.knn_path)?
        .set_default("models.forest_path", defaults.models.forest_path)?
        .set_default("monitor.snapshot_path", defaults.monitor.snapshot_path)?
        .set_default("monitor.api_url", defaults.monitor.api_url)?
        .set_default("monitor.debounce_ms", defaults.monitor.debounce_ms as i64)?
        .set_default("monitor.request_timeout_secs", defaults.monitor.request_timeout_secs as i64)?
        .set_default("monitor.liveness_interval_secs", defaults.monitor.liveness_interval_secs as i64)?
        .set_default("monitor.poll_interval_secs", defaults.monitor.poll_interval_secs as i64)?
        .set_default("monitor.schema.time_column", defaults.monitor.schema.time_column)?
        .set_default("monitor.schema.protocol_column", defaults.monitor.schema.protocol_column)?
        .set_default("monitor.schema.length_column", defaults.monitor.schema.length_column)?
        .set_default("metrics.enabled", defaults.metrics.enabled)?
        .add_source(File::with_name(&config_file).required(false))
        .add_source(
            Environment::with_prefix("DDOS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = config.try_deserialize()?;
    if config.detection.window_size == 0 {
        return Err(ConfigError::Message("detection.window_size must be at least 1".to_string()));
    }
    Ok(config)
}
