//! Random forest window classifier.

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::core::ensemble::{BinaryClassifier, ModelError};

/// Decision tree node; `x[feature] <= threshold` goes left
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Leaf(u8),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    /// Highest window position any split in this tree reads
    fn max_feature(&self) -> Option<usize> {
        match self {
            Node::Leaf(_) => None,
            Node::Split { feature, left, right, .. } => {
                [Some(*feature), left.max_feature(), right.max_feature()].into_iter().flatten().max()
            }
        }
    }

    fn evaluate(&self, window: &[u8]) -> Result<u8, ModelError> {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(label) => return Ok(*label),
                Node::Split { feature, threshold, left, right } => {
                    let value = window.get(*feature).ok_or(ModelError::WindowLength {
                        expected: feature + 1,
                        actual: window.len(),
                    })?;
                    node = if f64::from(*value) <= *threshold { left.as_ref() } else { right.as_ref() };
                }
            }
        }
    }
}

/// Majority vote of decision trees; a tied vote is `0`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestClassifier {
    /// Window length the forest was trained on; inferred from the splits when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    pub trees: Vec<Node>,
}

impl ForestClassifier {
    pub fn new(trees: Vec<Node>) -> Result<Self, ModelError> {
        if trees.is_empty() {
            return Err(ModelError::EmptyModel);
        }
        Ok(Self { window_size: None, trees })
    }

    /// Load a JSON artifact `{"trees": [..]}`
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let model: ForestClassifier = serde_json::from_str(&raw)?;
        if model.trees.is_empty() {
            return Err(ModelError::EmptyModel);
        }
        Ok(model)
    }

    /// Window length this forest expects
    pub fn window_len(&self) -> usize {
        self.window_size.unwrap_or_else(|| {
            self.trees.iter().filter_map(Node::max_feature).max().map_or(0, |f| f + 1)
        })
    }

    /// One stump per window position, so the vote is the window majority
    pub fn reference(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        let trees = (0..window_size)
            .map(|feature| Node::Split {
                feature,
                threshold: 0.5,
                left: Box::new(Node::Leaf(0)),
                right: Box::new(Node::Leaf(1)),
            })
            .collect();
        Self { window_size: Some(window_size), trees }
    }
}

impl BinaryClassifier for ForestClassifier {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn predict(&self, window: &[u8]) -> Result<u8, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::EmptyModel);
        }
        let mut attacks = 0;
        for tree in &self.trees {
            if tree.evaluate(window)? == 1 {
                attacks += 1;
            }
        }
        Ok(u8::from(attacks * 2 > self.trees.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reference_model_majority() {
        let model = ForestClassifier::reference(3);
        assert_eq!(model.predict(&[0, 1, 0]).unwrap(), 0);
        assert_eq!(model.predict(&[1, 0, 1]).unwrap(), 1);
        assert_eq!(model.predict(&[1, 1, 1]).unwrap(), 1);
    }

    #[test]
    fn test_tied_vote_is_normal() {
        let model = ForestClassifier::new(vec![Node::Leaf(1), Node::Leaf(0)]).unwrap();
        assert_eq!(model.predict(&[1, 1, 1]).unwrap(), 0);
    }

    #[test]
    fn test_split_outside_window() {
        let model = ForestClassifier::reference(4);
        assert!(matches!(model.predict(&[1, 1, 1]), Err(ModelError::WindowLength { .. })));
    }

    #[test]
    fn test_load_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"trees": [
                {{"split": {{"feature": 2, "threshold": 0.5, "left": {{"leaf": 0}}, "right": {{"leaf": 1}}}}}},
                {{"leaf": 1}},
                {{"leaf": 0}}
            ]}}"#
        )
        .unwrap();

        let model = ForestClassifier::load(file.path()).unwrap();
        assert_eq!(model.predict(&[0, 0, 1]).unwrap(), 1);
        assert_eq!(model.predict(&[1, 1, 0]).unwrap(), 0);
        assert_eq!(model.window_len(), 3);
    }

    #[test]
    fn test_declared_window_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"window_size": 5, "trees": [
                {{"split": {{"feature": 0, "threshold": 0.5, "left": {{"leaf": 0}}, "right": {{"leaf": 1}}}}}}
            ]}}"#
        )
        .unwrap();

        let model = ForestClassifier::load(file.path()).unwrap();
        assert_eq!(model.window_len(), 5);
        assert_eq!(ForestClassifier::reference(4).window_len(), 4);
    }

    #[test]
    fn test_rejects_empty_forest() {
        assert!(matches!(ForestClassifier::new(vec![]), Err(ModelError::EmptyModel)));
    }
}
