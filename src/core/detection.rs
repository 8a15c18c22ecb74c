//! Detection service state.
//!
//! Owns the sliding window buffer for the lifetime of the process and turns
//! batches of feature records into verdicts. Appending a batch and cutting
//! the window happen under one lock, so the window always matches the buffer
//! size reported alongside it.

use std::path::Path;
use log::{debug, info, warn};
use metrics::{counter, gauge, increment_counter};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::core::ensemble::{length_over_threshold, BinaryClassifier, Ensemble, LabelPolicy, ModelError};
use crate::core::forest::ForestClassifier;
use crate::core::knn::KnnClassifier;
use crate::core::window::{BufferStatus, SlidingWindowBuffer};
use crate::models::{DetectionConfig, EnsembleDetails, FeatureRecord, ModelConfig, Verdict, VerdictDetails};

/// Errors that can occur while serving a prediction
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Liveness probe body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// Detection service implementation
pub struct DetectionService {
    buffer: Mutex<SlidingWindowBuffer>,
    ensemble: Ensemble,
    label_policy: LabelPolicy,
    attack_length_threshold: i64,
}

impl DetectionService {
    /// Create a new detection service with an empty buffer
    pub fn new(config: &DetectionConfig, ensemble: Ensemble) -> Self {
        Self {
            buffer: Mutex::new(SlidingWindowBuffer::new(config.window_size)),
            ensemble,
            label_policy: length_over_threshold,
            attack_length_threshold: config.attack_length_threshold,
        }
    }

    pub fn with_label_policy(mut self, policy: LabelPolicy) -> Self {
        self.label_policy = policy;
        self
    }

    /// Label every record, append to the buffer and classify the latest window
    pub fn predict_batch(&self, records: &[FeatureRecord]) -> Result<Verdict, ServiceError> {
        increment_counter!("predict_batch_requests_total");
        counter!("records_ingested_total", records.len() as u64);

        let (window, buffer_size) = {
            let mut buffer = self.buffer.lock();
            for record in records {
                buffer.push((self.label_policy)(record, self.attack_length_threshold));
            }
            (buffer.window(), buffer.len())
        };
        gauge!("window_buffer_size", buffer_size as f64);

        let window = match window {
            Some(window) => window,
            None => {
                debug!("Buffer holds {} labels, still collecting", buffer_size);
                increment_counter!("verdicts_total", "status" => "insufficient_data");
                return Ok(Verdict::collecting());
            }
        };

        let outcome = self.ensemble.classify(&window).map_err(|e| {
            increment_counter!("predict_batch_errors_total");
            warn!("Classification failed for window {:?}: {}", window, e);
            ServiceError::from(e)
        })?;
        increment_counter!("verdicts_total", "status" => outcome.status.slug());
        info!(
            "Window {:?} -> {} (knn={}, rf={}, records={}, buffer={})",
            window,
            outcome.status.slug(),
            outcome.primary,
            outcome.secondary,
            records.len(),
            buffer_size
        );

        Ok(Verdict {
            status: outcome.status,
            details: VerdictDetails::Ensemble(EnsembleDetails {
                knn_prediction: outcome.primary,
                rf_prediction: outcome.secondary,
                data_points_processed: records.len(),
                current_buffer_size: buffer_size,
            }),
        })
    }

    pub fn health(&self) -> Health {
        Health { status: "healthy" }
    }

    pub fn buffer_status(&self) -> BufferStatus {
        self.buffer.lock().status()
    }
}

/// Load both classifiers, falling back to reference models when an artifact is unusable
pub fn load_ensemble(models: &ModelConfig, window_size: usize) -> Ensemble {
    let knn: Box<dyn BinaryClassifier> = match KnnClassifier::load(Path::new(&models.knn_path)) {
        Ok(model) if model.dims() == window_size => {
            info!("Loaded knn model from {}", models.knn_path);
            Box::new(model)
        }
        Ok(model) => {
            warn!(
                "knn model at {} expects a window of {} labels, configured {}; using reference model",
                models.knn_path,
                model.dims(),
                window_size
            );
            Box::new(KnnClassifier::reference(window_size))
        }
        Err(e) => {
            warn!("Failed to load knn model from {}: {}; using reference model", models.knn_path, e);
            Box::new(KnnClassifier::reference(window_size))
        }
    };
    let forest: Box<dyn BinaryClassifier> = match ForestClassifier::load(Path::new(&models.forest_path)) {
        Ok(model) if model.window_len() == window_size => {
            info!("Loaded random forest model from {}", models.forest_path);
            Box::new(model)
        }
        Ok(model) => {
            warn!(
                "Random forest model at {} expects a window of {} labels, configured {}; using reference model",
                models.forest_path,
                model.window_len(),
                window_size
            );
            Box::new(ForestClassifier::reference(window_size))
        }
        Err(e) => {
            warn!(
                "Failed to load random forest model from {}: {}; using reference model",
                models.forest_path, e
            );
            Box::new(ForestClassifier::reference(window_size))
        }
    };
    Ensemble::new(knn, forest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ensemble::MockBinaryClassifier;
    use crate::models::VerdictStatus;
    use std::sync::Arc;

    fn config() -> DetectionConfig {
        DetectionConfig { window_size: 3, attack_length_threshold: 1000 }
    }

    fn record(length: i64) -> FeatureRecord {
        FeatureRecord { time: 0.0, protocol: 6, length }
    }

    fn fixed(output: u8) -> Box<dyn BinaryClassifier> {
        let mut mock = MockBinaryClassifier::new();
        mock.expect_predict().returning(move |_| Ok(output));
        Box::new(mock)
    }

    fn service(a: u8, b: u8) -> DetectionService {
        DetectionService::new(&config(), Ensemble::new(fixed(a), fixed(b)))
    }

    #[test]
    fn test_insufficient_data_regardless_of_labels() {
        for lengths in [vec![], vec![5000], vec![5000, 5000], vec![10, 10]] {
            let service = service(1, 1);
            let records: Vec<_> = lengths.into_iter().map(record).collect();
            let verdict = service.predict_batch(&records).unwrap();

            assert_eq!(verdict, Verdict::collecting());
            assert_eq!(service.buffer_status().current_size, records.len());
        }
    }

    #[test]
    fn test_labels_accumulate_across_calls() {
        let service = service(0, 0);
        assert_eq!(service.predict_batch(&[record(1500)]).unwrap().status, VerdictStatus::InsufficientData);
        assert_eq!(service.predict_batch(&[record(50)]).unwrap().status, VerdictStatus::InsufficientData);

        let verdict = service.predict_batch(&[record(2000)]).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Normal);
        assert_eq!(
            verdict.details,
            VerdictDetails::Ensemble(EnsembleDetails {
                knn_prediction: 0,
                rf_prediction: 0,
                data_points_processed: 1,
                current_buffer_size: 3,
            })
        );
    }

    #[test]
    fn test_five_row_scenario_window() {
        let mut knn = MockBinaryClassifier::new();
        knn.expect_predict()
            .withf(|window: &[u8]| window.to_vec() == vec![0, 1, 0])
            .times(1)
            .returning(|_| Ok(0));
        let mut forest = MockBinaryClassifier::new();
        forest
            .expect_predict()
            .withf(|window: &[u8]| window.to_vec() == vec![0, 1, 0])
            .times(1)
            .returning(|_| Ok(1));
        let service = DetectionService::new(&config(), Ensemble::new(Box::new(knn), Box::new(forest)));

        let records: Vec<_> = [200, 1500, 50, 2000, 10].into_iter().map(record).collect();
        let verdict = service.predict_batch(&records).unwrap();

        assert_eq!(verdict.status, VerdictStatus::Attack);
        assert_eq!(
            verdict.details,
            VerdictDetails::Ensemble(EnsembleDetails {
                knn_prediction: 0,
                rf_prediction: 1,
                data_points_processed: 5,
                current_buffer_size: 5,
            })
        );
    }

    #[test]
    fn test_buffer_is_bounded() {
        let service = service(0, 0);
        let records: Vec<_> = (0..20).map(|i| record(i * 100)).collect();
        let verdict = service.predict_batch(&records).unwrap();

        match verdict.details {
            VerdictDetails::Ensemble(details) => assert_eq!(details.current_buffer_size, 6),
            other => panic!("unexpected details: {:?}", other),
        }
        assert_eq!(service.buffer_status().capacity, 6);
    }

    #[test]
    fn test_model_error_keeps_buffer_usable() {
        let mut failing = MockBinaryClassifier::new();
        let mut calls = 0;
        failing.expect_predict().returning(move |window| {
            calls += 1;
            if calls == 1 {
                Err(ModelError::WindowLength { expected: 4, actual: window.len() })
            } else {
                Ok(0)
            }
        });
        let service = DetectionService::new(&config(), Ensemble::new(Box::new(failing), fixed(0)));

        let records: Vec<_> = [10, 20, 30].into_iter().map(record).collect();
        assert!(matches!(service.predict_batch(&records), Err(ServiceError::Model(_))));
        assert_eq!(service.buffer_status().current_size, 3);

        let verdict = service.predict_batch(&[record(40)]).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Normal);
    }

    #[test]
    fn test_concurrent_batches_report_consistent_sizes() {
        let service = Arc::new(service(0, 0));
        let warmup: Vec<_> = (0..6).map(record).collect();
        service.predict_batch(&warmup).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let verdict = service.predict_batch(&[record(5000), record(1)]).unwrap();
                        match verdict.details {
                            VerdictDetails::Ensemble(details) => assert_eq!(details.current_buffer_size, 6),
                            other => panic!("unexpected details: {:?}", other),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(service.buffer_status().current_size, 6);
    }

    #[test]
    fn test_custom_label_policy() {
        fn icmp_is_attack(record: &FeatureRecord, _threshold: i64) -> u8 {
            u8::from(record.protocol == 1)
        }
        let mut knn = MockBinaryClassifier::new();
        knn.expect_predict()
            .withf(|window: &[u8]| window.to_vec() == vec![1, 0, 1])
            .returning(|_| Ok(1));
        let service = DetectionService::new(&config(), Ensemble::new(Box::new(knn), fixed(0)))
            .with_label_policy(icmp_is_attack);

        let records = [
            FeatureRecord { time: 1.0, protocol: 1, length: 10 },
            FeatureRecord { time: 2.0, protocol: 6, length: 5000 },
            FeatureRecord { time: 3.0, protocol: 1, length: 10 },
        ];
        assert_eq!(service.predict_batch(&records).unwrap().status, VerdictStatus::Attack);
    }

    #[test]
    fn test_health() {
        assert_eq!(service(0, 0).health(), Health { status: "healthy" });
    }

    #[test]
    fn test_load_ensemble_falls_back_to_reference_models() {
        let models = ModelConfig {
            knn_path: "does/not/exist.json".to_string(),
            forest_path: "does/not/exist.json".to_string(),
        };
        let ensemble = load_ensemble(&models, 3);
        assert_eq!(ensemble.names(), ("knn", "random_forest"));
        assert_eq!(ensemble.classify(&[1, 1, 0]).unwrap().status, VerdictStatus::Attack);
        assert_eq!(ensemble.classify(&[0, 0, 1]).unwrap().status, VerdictStatus::Normal);
    }

    #[test]
    fn test_shipped_models_load_for_their_window() {
        let models = ModelConfig {
            knn_path: "models/knn_model.json".to_string(),
            forest_path: "models/rf_model.json".to_string(),
        };
        let service = DetectionService::new(&config(), load_ensemble(&models, 3));
        let records: Vec<_> = [200, 1500, 50, 2000, 10].into_iter().map(record).collect();
        assert_eq!(service.predict_batch(&records).unwrap().status, VerdictStatus::Normal);
    }

    #[test]
    fn test_artifacts_for_another_window_fall_back() {
        let models = ModelConfig {
            knn_path: "models/knn_model.json".to_string(),
            forest_path: "models/rf_model.json".to_string(),
        };
        let detection = DetectionConfig { window_size: 4, attack_length_threshold: 1000 };
        let service = DetectionService::new(&detection, load_ensemble(&models, 4));

        for _ in 0..3 {
            let records: Vec<_> = [5000, 5000, 5000, 10].into_iter().map(record).collect();
            let verdict = service.predict_batch(&records).unwrap();
            assert_eq!(verdict.status, VerdictStatus::Attack);
        }
        let records: Vec<_> = [5000, 10, 10, 10].into_iter().map(record).collect();
        assert_eq!(service.predict_batch(&records).unwrap().status, VerdictStatus::Normal);
    }

    #[test]
    fn test_wide_window_without_artifacts() {
        let models = ModelConfig {
            knn_path: "does/not/exist.json".to_string(),
            forest_path: "does/not/exist.json".to_string(),
        };
        let ensemble = load_ensemble(&models, 64);
        assert_eq!(ensemble.classify(&[1; 64]).unwrap().status, VerdictStatus::Attack);
        assert_eq!(ensemble.classify(&[0; 64]).unwrap().status, VerdictStatus::Normal);
    }
}
