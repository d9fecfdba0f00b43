//! Scorer contract: a read-only mapping from a validated feature vector to a priority.
//!
//! Higher scores are more urgent. The engine treats implementations as opaque;
//! they must be deterministic for a given input and safe to share across
//! threads.

use crate::error::ScoreError;
use crate::features::Features;

pub trait Scorer: Send + Sync {
    /// Stable name for logs.
    fn name(&self) -> &str;

    fn score(&self, features: &Features) -> Result<f64, ScoreError>;
}

/// Wraps a plain function or closure as a [`Scorer`].
pub struct FnScorer<F> {
    name: String,
    f: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&Features) -> f64 + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(&Features) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &Features) -> Result<f64, ScoreError> {
        Ok((self.f)(features))
    }
}
