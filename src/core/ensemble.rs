//! Ensemble classification over the label window.
//!
//! Two independently trained binary classifiers look at the same window and
//! their outputs are fused into a single verdict. The labelling rule and the
//! fusion rule are plain functions so they can be swapped without touching
//! the buffer mechanics.

use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::models::{FeatureRecord, VerdictStatus};

/// Default packet length above which a record is labelled as attack traffic
pub const ATTACK_LENGTH_THRESHOLD: i64 = 1000;

/// Errors that can occur during classification or model loading
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Window has {actual} labels, model expects {expected}")]
    WindowLength { expected: usize, actual: usize },
    #[error("Model produced a non-binary output: {0}")]
    InvalidOutput(u8),
    #[error("Model has no training data")]
    EmptyModel,
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A binary classifier over a fixed-length window of labels
#[cfg_attr(test, automock)]
pub trait BinaryClassifier: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Classify a window, returning `0` or `1`
    fn predict(&self, window: &[u8]) -> Result<u8, ModelError>;
}

/// Derives a `{0,1}` label from a single record
pub type LabelPolicy = fn(&FeatureRecord, i64) -> u8;

/// Combines the two classifier outputs into a verdict
pub type FusionPolicy = fn(u8, u8) -> VerdictStatus;

/// `1` when the record is longer than `threshold`
pub fn length_over_threshold(record: &FeatureRecord, threshold: i64) -> u8 {
    u8::from(record.length > threshold)
}

/// Attack if either classifier says so
pub fn or_fusion(primary: u8, secondary: u8) -> VerdictStatus {
    if primary == 1 || secondary == 1 {
        VerdictStatus::Attack
    } else {
        VerdictStatus::Normal
    }
}

/// Outcome of one ensemble evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleOutcome {
    pub status: VerdictStatus,
    pub primary: u8,
    pub secondary: u8,
}

/// Pair of classifiers plus the rule that fuses them
pub struct Ensemble {
    primary: Box<dyn BinaryClassifier>,
    secondary: Box<dyn BinaryClassifier>,
    fusion: FusionPolicy,
}

impl Ensemble {
    pub fn new(primary: Box<dyn BinaryClassifier>, secondary: Box<dyn BinaryClassifier>) -> Self {
        Self::with_fusion(primary, secondary, or_fusion)
    }

    pub fn with_fusion(
        primary: Box<dyn BinaryClassifier>,
        secondary: Box<dyn BinaryClassifier>,
        fusion: FusionPolicy,
    ) -> Self {
        Self { primary, secondary, fusion }
    }

    pub fn classify(&self, window: &[u8]) -> Result<EnsembleOutcome, ModelError> {
        let primary = binary(self.primary.predict(window)?)?;
        let secondary = binary(self.secondary.predict(window)?)?;
        Ok(EnsembleOutcome {
            status: (self.fusion)(primary, secondary),
            primary,
            secondary,
        })
    }

    pub fn names(&self) -> (&'static str, &'static str) {
        (self.primary.name(), self.secondary.name())
    }
}

fn binary(output: u8) -> Result<u8, ModelError> {
    match output {
        0 | 1 => Ok(output),
        other => Err(ModelError::InvalidOutput(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(output: u8) -> Box<dyn BinaryClassifier> {
        let mut mock = MockBinaryClassifier::new();
        mock.expect_predict().returning(move |_| Ok(output));
        mock.expect_name().return_const("fixed");
        Box::new(mock)
    }

    #[test]
    fn test_length_threshold_label() {
        let record = |length| FeatureRecord { time: 0.0, protocol: 6, length };
        assert_eq!(length_over_threshold(&record(200), ATTACK_LENGTH_THRESHOLD), 0);
        assert_eq!(length_over_threshold(&record(1000), ATTACK_LENGTH_THRESHOLD), 0);
        assert_eq!(length_over_threshold(&record(1001), ATTACK_LENGTH_THRESHOLD), 1);
    }

    #[test]
    fn test_or_fusion_table() {
        assert_eq!(or_fusion(0, 0), VerdictStatus::Normal);
        assert_eq!(or_fusion(1, 0), VerdictStatus::Attack);
        assert_eq!(or_fusion(0, 1), VerdictStatus::Attack);
        assert_eq!(or_fusion(1, 1), VerdictStatus::Attack);
    }

    #[test]
    fn test_ensemble_fuses_outputs() {
        for (a, b, expected) in [
            (0, 0, VerdictStatus::Normal),
            (1, 0, VerdictStatus::Attack),
            (0, 1, VerdictStatus::Attack),
            (1, 1, VerdictStatus::Attack),
        ] {
            let ensemble = Ensemble::new(fixed(a), fixed(b));
            let outcome = ensemble.classify(&[0, 1, 0]).unwrap();
            assert_eq!(outcome, EnsembleOutcome { status: expected, primary: a, secondary: b });
        }
    }

    #[test]
    fn test_both_classifiers_see_the_same_window() {
        let mut primary = MockBinaryClassifier::new();
        primary
            .expect_predict()
            .withf(|window: &[u8]| window.to_vec() == vec![0, 1, 0])
            .times(1)
            .returning(|_| Ok(0));
        let mut secondary = MockBinaryClassifier::new();
        secondary
            .expect_predict()
            .withf(|window: &[u8]| window.to_vec() == vec![0, 1, 0])
            .times(1)
            .returning(|_| Ok(1));

        let ensemble = Ensemble::new(Box::new(primary), Box::new(secondary));
        let outcome = ensemble.classify(&[0, 1, 0]).unwrap();
        assert_eq!(outcome.status, VerdictStatus::Attack);
    }

    #[test]
    fn test_non_binary_output_is_rejected() {
        let ensemble = Ensemble::new(fixed(2), fixed(0));
        assert!(matches!(ensemble.classify(&[0, 0, 0]), Err(ModelError::InvalidOutput(2))));
    }

    #[test]
    fn test_custom_fusion_policy() {
        fn and_fusion(a: u8, b: u8) -> VerdictStatus {
            if a == 1 && b == 1 { VerdictStatus::Attack } else { VerdictStatus::Normal }
        }
        let ensemble = Ensemble::with_fusion(fixed(1), fixed(0), and_fusion);
        assert_eq!(ensemble.classify(&[1, 1, 1]).unwrap().status, VerdictStatus::Normal);
    }
}
