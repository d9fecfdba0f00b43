//! taskrank-core: dependency-aware task prioritization
//!
//! Tasks with unmet prerequisites are marked blocked and never scored. Ready
//! tasks are encoded as a fixed five-value feature vector, scored by an
//! injected [`Scorer`], and returned highest score first with ties kept in
//! input order.

pub mod artifact;
pub mod engine;
pub mod error;
pub mod features;
pub mod readiness;
pub mod request;
pub mod scorer;
pub mod task;
pub mod time;

pub use artifact::{Aggregate, ArtifactScorer, ModelSpec, Node, ScoringArtifact, Tree};
pub use engine::{Engine, rank};
pub use error::{ArtifactError, EngineError, EngineResult, ScoreError, TaskError};
pub use features::{
    DEADLINE_FORMAT, FEATURE_COUNT, FEATURE_NAMES, FeatureValue, FeatureVector, Features,
    days_left, extract_features, validate_features,
};
pub use readiness::{dependencies_met, unmet_dependencies};
pub use request::{
    PrioritizeRequest, PrioritizeResponse, REQUIRED_FIELDS, RequestError, handle_request,
    handle_request_annotated,
};
pub use scorer::{FnScorer, Scorer};
pub use task::{EXCLUDED_SCORE, STATUS_BLOCKED, STATUS_OVERDUE, STATUS_READY, Task, TaskId};
pub use time::now_in;
