//! Persisted scoring artifacts.
//!
//! An artifact is a JSON document holding the feature names a model was fitted
//! on and the fitted model itself. It is loaded once at start and never
//! changes afterwards. Fitting happens elsewhere.
//!
//! ```json
//! {
//!   "feature_names": ["Urgency_Score", "Days_Left", "Normalized_Urgency"],
//!   "model": { "kind": "linear", "weights": [0.5, -0.1, 2.0], "bias": 1.0 }
//! }
//! ```
//!
//! Names match the extractor's canonical names case-insensitively, so the
//! declared order may differ from [`FEATURE_NAMES`]; the scorer reorders its
//! input to match.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ArtifactError, ScoreError};
use crate::features::{FEATURE_NAMES, Features};
use crate::scorer::Scorer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringArtifact {
    pub feature_names: Vec<String>,
    pub model: ModelSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// `bias + sum(weights[i] * x[i])` over the declared features.
    Linear {
        weights: Vec<f64>,
        #[serde(default)]
        bias: f64,
    },
    /// Decision-tree ensemble.
    Forest {
        trees: Vec<Tree>,
        #[serde(default)]
        aggregate: Aggregate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    /// Average of the tree outputs (regression).
    #[default]
    Mean,
    /// Most frequent tree output (classification). Ties go to the larger value.
    Vote,
}

/// Nodes are stored flat; `nodes[0]` is the root and children always sit
/// after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// `x[feature] <= threshold` goes left. `feature` indexes the declared names.
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

impl Tree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn check(&self, tree: usize, n_features: usize) -> Result<(), ArtifactError> {
        let malformed = |reason: String| ArtifactError::MalformedTree { tree, reason };

        if self.nodes.is_empty() {
            return Err(malformed("no nodes".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(malformed(format!(
                        "node {i} splits on feature {feature}, only {n_features} declared"
                    )));
                }
                for child in [*left, *right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(malformed(format!("node {i} has bad child index {child}")));
                    }
                }
            }
        }
        Ok(())
    }
}

impl ScoringArtifact {
    pub fn from_json(s: &str) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&s)
    }

    /// Validate the artifact and build a scorer from it.
    pub fn into_scorer(self) -> Result<ArtifactScorer, ArtifactError> {
        let order = align_features(&self.feature_names)?;
        let n = order.len();

        match &self.model {
            ModelSpec::Linear { weights, .. } => {
                if weights.len() != n {
                    return Err(ArtifactError::WeightCount {
                        weights: weights.len(),
                        features: n,
                    });
                }
            }
            ModelSpec::Forest { trees, .. } => {
                if trees.is_empty() {
                    return Err(ArtifactError::EmptyForest);
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.check(t, n)?;
                }
            }
        }

        Ok(ArtifactScorer {
            feature_names: self.feature_names,
            order,
            model: self.model,
        })
    }
}

/// Map each declared name to its index in [`FEATURE_NAMES`].
fn align_features(declared: &[String]) -> Result<Vec<usize>, ArtifactError> {
    if declared.is_empty() {
        return Err(ArtifactError::NoFeatures);
    }

    let mut order = Vec::with_capacity(declared.len());
    for name in declared {
        let wanted = name.trim().to_lowercase();
        let idx = FEATURE_NAMES
            .iter()
            .position(|canonical| *canonical == wanted)
            .ok_or_else(|| ArtifactError::UnknownFeature(name.clone()))?;
        if order.contains(&idx) {
            return Err(ArtifactError::DuplicateFeature(name.clone()));
        }
        order.push(idx);
    }
    Ok(order)
}

/// Scorer backed by a validated [`ScoringArtifact`].
#[derive(Debug, Clone)]
pub struct ArtifactScorer {
    feature_names: Vec<String>,
    order: Vec<usize>,
    model: ModelSpec,
}

impl ArtifactScorer {
    /// Feature names as the artifact declared them.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl Scorer for ArtifactScorer {
    fn name(&self) -> &str {
        match self.model {
            ModelSpec::Linear { .. } => "linear",
            ModelSpec::Forest { .. } => "forest",
        }
    }

    fn score(&self, features: &Features) -> Result<f64, ScoreError> {
        let x: Vec<f64> = self.order.iter().map(|&c| features[c]).collect();

        match &self.model {
            ModelSpec::Linear { weights, bias } => {
                Ok(bias + weights.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>())
            }
            ModelSpec::Forest { trees, aggregate } => {
                let outputs: Vec<f64> = trees.iter().map(|t| t.predict(&x)).collect();
                match aggregate {
                    Aggregate::Mean => Ok(outputs.iter().sum::<f64>() / outputs.len() as f64),
                    Aggregate::Vote => majority(outputs)
                        .ok_or_else(|| ScoreError::Model("forest produced no votes".to_string())),
                }
            }
        }
    }
}

fn majority(mut votes: Vec<f64>) -> Option<f64> {
    votes.sort_by(f64::total_cmp);

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < votes.len() {
        let value = votes[i];
        let mut j = i;
        while j < votes.len() && votes[j] == value {
            j += 1;
        }
        let count = j - i;
        // Ascending scan with >= lets the larger value win a tie.
        if best.is_none_or(|(_, c)| count >= c) {
            best = Some((value, count));
        }
        i = j.max(i + 1);
    }
    best.map(|(value, _)| value)
}
