//! Pre-trained random forest churn classifier

use std::fs;
use std::path::Path;

use linfa::traits::PredictInplace;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DashboardError;
use crate::features::MODEL_FEATURES;

const MODEL_ARTIFACT: &str = "model";

/// Node of an exported decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, else to `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class probabilities `[no churn, churn]`
    Leaf { probabilities: [f64; 2] },
}

/// A single decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn leaf_probabilities(&self, row: ArrayView1<f64>) -> [f64; 2] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { probabilities } => return *probabilities,
            }
        }
    }

    /// Children must point forward so every walk reaches a leaf
    fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {} splits on unknown feature {}", index, feature));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", index));
                    }
                    for child in [left, right] {
                        if *child <= index || *child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", index, child));
                        }
                    }
                }
                TreeNode::Leaf { probabilities } => {
                    if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
                        return Err(format!("leaf {} has invalid probabilities", index));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Random forest exported from the training pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Load and validate a forest from its JSON export
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let json =
            fs::read_to_string(path).map_err(|e| DashboardError::artifact(MODEL_ARTIFACT, path, e))?;
        let forest = Self::from_json(&json)
            .map_err(|reason| DashboardError::artifact(MODEL_ARTIFACT, path, reason))?;
        debug!(trees = forest.trees.len(), path = %path.display(), "model loaded");
        Ok(forest)
    }

    /// Parse and validate a forest from a JSON string
    pub fn from_json(json: &str) -> Result<Self, String> {
        let forest: RandomForest = serde_json::from_str(json).map_err(|e| e.to_string())?;
        forest.check()?;
        Ok(forest)
    }

    fn check(&self) -> Result<(), String> {
        if self.n_features != MODEL_FEATURES.len() {
            return Err(format!(
                "model expects {} features, inputs have {}",
                self.n_features,
                MODEL_FEATURES.len()
            ));
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features)
                .map_err(|reason| format!("tree {}: {}", i, reason))?;
        }
        Ok(())
    }

    /// Mean class probabilities `[no churn, churn]` over all trees
    pub fn predict_proba(&self, row: ArrayView1<f64>) -> [f64; 2] {
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let p = tree.leaf_probabilities(row);
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }

    /// Class with the larger mean probability; ties go to class 0
    pub fn predict_class(&self, row: ArrayView1<f64>) -> usize {
        let [no_churn, churn] = self.predict_proba(row);
        usize::from(churn > no_churn)
    }
}

impl PredictInplace<Array2<f64>, Array1<usize>> for RandomForest {
    fn predict_inplace(&self, x: &Array2<f64>, y: &mut Array1<usize>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );
        for (row, target) in x.outer_iter().zip(y.iter_mut()) {
            *target = self.predict_class(row);
        }
    }

    fn default_target(&self, x: &Array2<f64>) -> Array1<usize> {
        Array1::zeros(x.nrows())
    }
}

/// Predicted class of every row of `records`
pub fn predict_classes<M>(model: &M, records: &Array2<f64>) -> Array1<usize>
where
    M: PredictInplace<Array2<f64>, Array1<usize>>,
{
    let mut targets = model.default_target(records);
    model.predict_inplace(records, &mut targets);
    targets
}

/// Forests shared by tests
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A one-split forest: churn when `Tenure Months <= 6`
    pub fn short_tenure_forest() -> RandomForest {
        RandomForest {
            n_features: 11,
            trees: vec![DecisionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 0,
                        threshold: 6.0,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf {
                        probabilities: [0.1, 0.9],
                    },
                    TreeNode::Leaf {
                        probabilities: [0.8, 0.2],
                    },
                ],
            }],
        }
    }

    pub fn short_tenure_json() -> String {
        serde_json::to_string(&short_tenure_forest()).unwrap()
    }
}
