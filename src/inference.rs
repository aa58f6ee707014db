//! Scaling & Inference Adapter.
//!
//! The fitted scaler and classifier are exported from training as JSON. The
//! scaler standardizes a named subset of columns; the classifier is either a
//! logistic regression or a gradient-boosted tree ensemble, both producing a
//! purchase probability through the logistic link.

use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AnalyticsError, Result};
use crate::features::FeatureVector;

/// Probability below which a customer is flagged as very unlikely to buy.
pub const LOW_LIKELIHOOD: f64 = 0.10;

const DECISION_THRESHOLD: f64 = 0.5;

pub trait FittedScaler {
    fn feature_names(&self) -> &[String];

    fn transform(&self, values: &[f64]) -> Result<Vec<f64>>;
}

pub trait Classifier {
    fn feature_names(&self) -> &[String];

    fn predict(&self, row: &[f64]) -> Result<u8>;

    /// `[P(class 0), P(class 1)]`.
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_class: u8,
    pub probabilities: [f64; 2],
}

impl PredictionResult {
    pub fn will_purchase(&self) -> bool {
        self.predicted_class == 1
    }

    pub fn purchase_probability(&self) -> f64 {
        self.probabilities[1]
    }

    pub fn confidence(&self) -> f64 {
        self.probabilities[usize::from(self.predicted_class.min(1))]
    }

    pub fn is_unlikely(&self) -> bool {
        self.purchase_probability() < LOW_LIKELIHOOD
    }

    pub fn headline(&self) -> &'static str {
        if self.will_purchase() {
            "Will Purchase At The End"
        } else {
            "Will Not Purchase At The End"
        }
    }
}

/// Scale the scaler's columns in a copy of `vector`, then classify it.
pub fn predict<S, C>(vector: &FeatureVector, scaler: &S, model: &C) -> Result<PredictionResult>
where
    S: FittedScaler + ?Sized,
    C: Classifier + ?Sized,
{
    let mut positions = Vec::with_capacity(scaler.feature_names().len());
    let mut missing = Vec::new();
    for name in scaler.feature_names() {
        match vector.position(name) {
            Some(index) => positions.push(index),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(AnalyticsError::ScalerFeatureMismatch { missing });
    }

    if model.feature_names() != vector.names() {
        return Err(AnalyticsError::ModelInputShapeMismatch {
            expected: model.feature_names().to_vec(),
            actual: vector.names().to_vec(),
        });
    }

    let mut row = vector.values().to_vec();
    let subset: Vec<f64> = positions.iter().map(|&i| row[i]).collect();
    let scaled = scaler.transform(&subset)?;
    for (&index, value) in positions.iter().zip(scaled) {
        row[index] = value;
    }

    let predicted_class = model.predict(&row)?;
    let probabilities = model.predict_proba(&row)?;

    debug!(
        predicted_class,
        p_purchase = probabilities[1],
        scaled = positions.len(),
        "prediction complete"
    );

    Ok(PredictionResult {
        predicted_class,
        probabilities,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn validate(&self) -> Result<()> {
        let n = self.feature_names.len();
        if self.mean.len() != n || self.scale.len() != n {
            return Err(AnalyticsError::artifact(
                "scaler",
                format!(
                    "{} features but {} means and {} scales",
                    n,
                    self.mean.len(),
                    self.scale.len()
                ),
            ));
        }
        ensure_unique("scaler", &self.feature_names)
    }
}

impl FittedScaler for StandardScaler {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.validate()?;
        if values.len() != self.feature_names.len() {
            return Err(AnalyticsError::ScalerFeatureMismatch {
                missing: self.feature_names[values.len().min(self.feature_names.len())..].to_vec(),
            });
        }

        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // Constant columns are fitted with a zero scale.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Children always sit after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn score(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { leaf } => return leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[feature] < threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleModel {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic(LogisticModel),
    TreeEnsemble(TreeEnsembleModel),
}

impl ModelArtifact {
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelArtifact::Logistic(model) => {
                if model.coefficients.len() != model.feature_names.len() {
                    return Err(AnalyticsError::artifact(
                        "model",
                        format!(
                            "{} features but {} coefficients",
                            model.feature_names.len(),
                            model.coefficients.len()
                        ),
                    ));
                }
                ensure_unique("model", &model.feature_names)
            }
            ModelArtifact::TreeEnsemble(model) => {
                let features = model.feature_names.len();
                for (t, tree) in model.trees.iter().enumerate() {
                    if tree.nodes.is_empty() {
                        return Err(AnalyticsError::artifact("model", format!("tree {t} is empty")));
                    }
                    for (i, node) in tree.nodes.iter().enumerate() {
                        if let TreeNode::Split {
                            feature,
                            left,
                            right,
                            ..
                        } = *node
                        {
                            let child_ok = |c: usize| c > i && c < tree.nodes.len();
                            if feature >= features || !child_ok(left) || !child_ok(right) {
                                return Err(AnalyticsError::artifact(
                                    "model",
                                    format!("tree {t} node {i} points outside the tree"),
                                ));
                            }
                        }
                    }
                }
                ensure_unique("model", &model.feature_names)
            }
        }
    }

    fn margin(&self, row: &[f64]) -> f64 {
        match self {
            ModelArtifact::Logistic(model) => {
                model.intercept
                    + model
                        .coefficients
                        .iter()
                        .zip(row)
                        .map(|(w, x)| w * x)
                        .sum::<f64>()
            }
            ModelArtifact::TreeEnsemble(model) => {
                model.base_score + model.trees.iter().map(|t| t.score(row)).sum::<f64>()
            }
        }
    }

    fn purchase_probability(&self, row: &[f64]) -> Result<f64> {
        // Artifacts can be built in code, not only through `load_model`.
        self.validate()?;
        let expected = self.feature_names();
        if row.len() != expected.len() {
            return Err(AnalyticsError::ModelInputShapeMismatch {
                expected: expected.to_vec(),
                actual: vec![format!("{} values", row.len())],
            });
        }
        Ok(sigmoid(self.margin(row)))
    }
}

impl Classifier for ModelArtifact {
    fn feature_names(&self) -> &[String] {
        match self {
            ModelArtifact::Logistic(model) => &model.feature_names,
            ModelArtifact::TreeEnsemble(model) => &model.feature_names,
        }
    }

    fn predict(&self, row: &[f64]) -> Result<u8> {
        let p = self.purchase_probability(row)?;
        Ok(u8::from(p >= DECISION_THRESHOLD))
    }

    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]> {
        let p = self.purchase_probability(row)?;
        Ok([1.0 - p, p])
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn ensure_unique(artifact: &str, names: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(AnalyticsError::artifact(
                artifact,
                format!("duplicate feature {name:?}"),
            ));
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, artifact: &str) -> Result<T> {
    let bytes =
        std::fs::read(path).map_err(|e| AnalyticsError::unavailable(path.display(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| AnalyticsError::artifact(artifact, e))
}

pub fn load_scaler(path: &Path) -> Result<StandardScaler> {
    let scaler: StandardScaler = read_json(path, "scaler")?;
    scaler.validate()?;
    info!(path = %path.display(), features = scaler.feature_names.len(), "scaler loaded");
    Ok(scaler)
}

pub fn load_model(path: &Path) -> Result<ModelArtifact> {
    let model: ModelArtifact = read_json(path, "model")?;
    model.validate()?;
    info!(
        path = %path.display(),
        features = model.feature_names().len(),
        "model loaded"
    );
    Ok(model)
}
