//! Core functionality for the streaming detection pipeline.
//!
//! This module contains the ingestion side (snapshot loading, normalization,
//! change-triggered ingestion, transport) and the service side (sliding
//! window buffer, classifiers, ensemble and detection state).

pub mod normalizer;
pub mod snapshot;
pub mod ingestor;
pub mod transport;
pub mod window;
pub mod ensemble;
pub mod knn;
pub mod forest;
pub mod detection;

pub use normalizer::{normalize, normalize_all, RawTrafficRow};
pub use ingestor::{Ingestor, IngestorSettings, PassOutcome};
pub use transport::{BatchSubmitter, DetectionClient, TransportError};
pub use window::SlidingWindowBuffer;
pub use ensemble::{BinaryClassifier, Ensemble};
pub use detection::{load_ensemble, DetectionService, ServiceError};
