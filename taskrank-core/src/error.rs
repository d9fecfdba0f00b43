//! Error types for the prioritization engine.
//!
//! [`EngineError`] aborts a whole call. [`TaskError`] is recorded on the task
//! that raised it and never escapes the engine loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scorer unavailable: {0}")]
    ScorerUnavailable(String),
}

/// Why a single task could not be scored.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("dependencies must be a list of task ids, got {0}")]
    MalformedDependencies(String),

    #[error("Feature mismatch. Expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Feature mismatch. Feature {index} ({name}) is not numeric: {value}")]
    NonNumericFeature {
        index: usize,
        name: String,
        value: String,
    },

    #[error(transparent)]
    Scorer(#[from] ScoreError),
}

/// Failure reported by a [`crate::Scorer`] for one feature vector.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error("scorer returned a non-finite score: {0}")]
    NonFinite(f64),

    #[error("model error: {0}")]
    Model(String),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("reading artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("artifact declares no features")]
    NoFeatures,

    #[error("unknown feature name in artifact: {0}")]
    UnknownFeature(String),

    #[error("feature declared twice in artifact: {0}")]
    DuplicateFeature(String),

    #[error("linear model has {weights} weights for {features} features")]
    WeightCount { weights: usize, features: usize },

    #[error("forest has no trees")]
    EmptyForest,

    #[error("tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
