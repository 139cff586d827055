use crate::encoder::EncodedRow;
use crate::errors::{PredictError, PredictResult};
use serde::{Deserialize, Serialize};

/// Coefficients for the linear duration model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearWeights {
    pub intercept: f64,
    pub coef: Vec<f64>,
}

/// One node of a regression tree, stored in a flat array
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {idx}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx}: non-finite threshold"));
                    }
                    // children always follow their parent, so traversal terminates
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(format!("node {idx}: invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("node {idx}: non-finite leaf value"));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, row: &EncodedRow) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // sklearn convention: x <= threshold goes left
                    idx = if row.get(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Regression model artifact, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressionModel {
    LinearRegression(LinearWeights),
    RandomForest {
        n_features: usize,
        trees: Vec<RegressionTree>,
    },
}

impl RegressionModel {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let model: RegressionModel =
            serde_json::from_slice(bytes).map_err(|e| format!("invalid model JSON: {e}"))?;
        model.validate()?;
        Ok(model)
    }

    /// Structural checks run once at load time.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            RegressionModel::LinearRegression(w) => {
                if w.coef.is_empty() {
                    return Err("linear model has no coefficients".to_string());
                }
                if !w.intercept.is_finite() || w.coef.iter().any(|c| !c.is_finite()) {
                    return Err("linear model has non-finite weights".to_string());
                }
                Ok(())
            }
            RegressionModel::RandomForest { n_features, trees } => {
                if trees.is_empty() {
                    return Err("forest has no trees".to_string());
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(*n_features)
                        .map_err(|e| format!("tree {i}: {e}"))?;
                }
                Ok(())
            }
        }
    }

    /// Input width the model was fitted on
    pub fn n_features(&self) -> usize {
        match self {
            RegressionModel::LinearRegression(w) => w.coef.len(),
            RegressionModel::RandomForest { n_features, .. } => *n_features,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RegressionModel::LinearRegression(_) => "linear_regression",
            RegressionModel::RandomForest { .. } => "random_forest",
        }
    }

    /// Predict a duration in minutes. Negative outputs are returned as-is.
    pub fn predict(&self, row: &EncodedRow) -> PredictResult<f64> {
        if row.n_features != self.n_features() {
            return Err(PredictError::inference(format!(
                "feature width mismatch: got {}, model expects {}",
                row.n_features,
                self.n_features()
            )));
        }

        let score = match self {
            // intercept + sum(coef_i * x_i) over the non-zero columns
            RegressionModel::LinearRegression(w) => {
                w.intercept
                    + row
                        .entries
                        .iter()
                        .map(|(col, x)| w.coef.get(*col).map_or(0.0, |c| c * x))
                        .sum::<f64>()
            }
            RegressionModel::RandomForest { trees, .. } => {
                trees.iter().map(|t| t.evaluate(row)).sum::<f64>() / trees.len() as f64
            }
        };

        if score.is_finite() {
            Ok(score)
        } else {
            Err(PredictError::inference("model produced a non-finite prediction"))
        }
    }
}
