use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Sliding window and labelling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Number of labels handed to the classifiers; the buffer keeps twice as many
    pub window_size: usize,
    /// Packet length above which a record is labelled as attack traffic
    pub attack_length_threshold: i64,
}

/// Model artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Nearest-neighbour model artifact (JSON)
    pub knn_path: String,
    /// Random forest model artifact (JSON)
    pub forest_path: String,
}

/// Column binding between the snapshot table and feature records.
///
/// The defaults reproduce the layout written by the capture merger: the
/// `Destination` column carries the protocol name and the `Protocol` column
/// carries the frame length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotSchema {
    pub time_column: String,
    pub protocol_column: String,
    pub length_column: String,
}

impl Default for SnapshotSchema {
    fn default() -> Self {
        Self {
            time_column: "No.".to_string(),
            protocol_column: "Destination".to_string(),
            length_column: "Protocol".to_string(),
        }
    }
}

/// Snapshot monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Snapshot file to watch
    pub snapshot_path: String,
    /// Base URL of the detection service
    pub api_url: String,
    /// Delay between a change notification and inspecting the file
    pub debounce_ms: u64,
    /// Upper bound on one predict_batch call
    pub request_timeout_secs: u64,
    /// Heartbeat period of the watch loop
    pub liveness_interval_secs: u64,
    /// Fallback polling period, 0 disables polling
    pub poll_interval_secs: u64,
    /// Column binding of the snapshot table
    pub schema: SnapshotSchema,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder and expose /metrics
    pub enabled: bool,
}

/// Application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Detection configuration
    pub detection: DetectionConfig,
    /// Model artifact configuration
    pub models: ModelConfig,
    /// Snapshot monitor configuration
    pub monitor: MonitorConfig,
    /// Metrics configuration
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            detection: DetectionConfig {
                window_size: crate::core::window::WINDOW_SIZE,
                attack_length_threshold: crate::core::ensemble::ATTACK_LENGTH_THRESHOLD,
            },
            models: ModelConfig {
                knn_path: "models/knn_model.json".to_string(),
                forest_path: "models/rf_model.json".to_string(),
            },
            monitor: MonitorConfig {
                snapshot_path: "merged_data/merged_traffic.csv".to_string(),
                api_url: "http://localhost:8000".to_string(),
                debounce_ms: 500,
                request_timeout_secs: 10,
                liveness_interval_secs: 1,
                poll_interval_secs: 0,
                schema: SnapshotSchema::default(),
            },
            metrics: MetricsConfig { enabled: true },
        }
    }
}

/// One normalized packet, as sent to `/predict_batch`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "Protocol")]
    pub protocol: i64,
    #[serde(rename = "Length")]
    pub length: i64,
}

/// Verdict status, serialized with the operator-facing wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    #[serde(rename = "Chưa đủ dữ liệu")]
    InsufficientData,
    #[serde(rename = "Đang bị tấn công DDoS")]
    Attack,
    #[serde(rename = "Bình thường")]
    Normal,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::InsufficientData => "Chưa đủ dữ liệu",
            VerdictStatus::Attack => "Đang bị tấn công DDoS",
            VerdictStatus::Normal => "Bình thường",
        }
    }

    /// Short label for logs and metrics
    pub fn slug(&self) -> &'static str {
        match self {
            VerdictStatus::InsufficientData => "insufficient_data",
            VerdictStatus::Attack => "attack",
            VerdictStatus::Normal => "normal",
        }
    }
}

/// Raw outputs of both classifiers plus buffer bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleDetails {
    pub knn_prediction: u8,
    pub rf_prediction: u8,
    pub data_points_processed: usize,
    pub current_buffer_size: usize,
}

/// Diagnostics attached to a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerdictDetails {
    Ensemble(EnsembleDetails),
    Note(String),
}

/// Response body of `/predict_batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub details: VerdictDetails,
}

impl Verdict {
    pub fn collecting() -> Self {
        Self {
            status: VerdictStatus::InsufficientData,
            details: VerdictDetails::Note("Đang thu thập...".to_string()),
        }
    }

    pub fn is_attack(&self) -> bool {
        self.status == VerdictStatus::Attack
    }
}
