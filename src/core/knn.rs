//! k-nearest-neighbour window classifier.

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::core::ensemble::{BinaryClassifier, ModelError};

/// A labelled training window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub window: Vec<f64>,
    pub label: u8,
}

/// Majority vote over the `k` training windows closest to the input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    pub k: usize,
    pub samples: Vec<Sample>,
}

impl KnnClassifier {
    pub fn new(k: usize, samples: Vec<Sample>) -> Result<Self, ModelError> {
        let model = Self { k, samples };
        model.validate()?;
        Ok(model)
    }

    /// Load a JSON artifact `{"k": .., "samples": [{"window": [..], "label": ..}]}`
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let model: KnnClassifier = serde_json::from_str(&raw)?;
        model.validate()?;
        Ok(model)
    }

    /// Reference model voting the window majority
    ///
    /// The squared distance to the all-zero window is the number of attack
    /// labels, so the nearest of the two prototypes is the majority. An even
    /// split is equidistant and the all-zero prototype wins on training order.
    pub fn reference(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        let samples = vec![
            Sample { window: vec![0.0; window_size], label: 0 },
            Sample { window: vec![1.0; window_size], label: 1 },
        ];
        Self { k: 1, samples }
    }

    fn validate(&self) -> Result<(), ModelError> {
        let first = self.samples.first().ok_or(ModelError::EmptyModel)?;
        let dims = first.window.len();
        if self.k == 0 {
            return Err(ModelError::EmptyModel);
        }
        if let Some(bad) = self.samples.iter().find(|s| s.window.len() != dims) {
            return Err(ModelError::WindowLength { expected: dims, actual: bad.window.len() });
        }
        Ok(())
    }

    /// Window length the training samples were built for
    pub fn dims(&self) -> usize {
        self.samples.first().map(|s| s.window.len()).unwrap_or(0)
    }
}

impl BinaryClassifier for KnnClassifier {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn predict(&self, window: &[u8]) -> Result<u8, ModelError> {
        if self.samples.is_empty() {
            return Err(ModelError::EmptyModel);
        }
        if window.len() != self.dims() {
            return Err(ModelError::WindowLength { expected: self.dims(), actual: window.len() });
        }

        let mut neighbours: Vec<(f64, u8)> = self
            .samples
            .iter()
            .map(|s| {
                let distance = s
                    .window
                    .iter()
                    .zip(window)
                    .map(|(a, &b)| (a - f64::from(b)).powi(2))
                    .sum::<f64>();
                (distance, s.label)
            })
            .collect();
        // stable sort keeps training order among equidistant samples
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));

        let nearest = &neighbours[..self.k.min(neighbours.len())];
        let attacks = nearest.iter().filter(|(_, label)| *label == 1).count();
        Ok(u8::from(attacks * 2 > nearest.len()))
    }
}
