//! Prioritization engine: gate, encode, score and rank one batch of tasks.
//!
//! The engine is built once from an immutable scorer and feature list and holds
//! no state between calls. Each call:
//! - captures a single reference "now" for the whole batch
//! - marks tasks with unmet dependencies `blocked` (score -1) without scoring them
//! - reads, extracts, validates and scores the rest, recording any failure on
//!   the task (score -1, `error` set, status left as it was)
//! - returns the tasks with a non-negative score, highest first
//!
//! Every input task is annotated in place, including the ones left out of the
//! returned ranking. Callers that need blocked or errored tasks read them back
//! from the slice they passed in.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::artifact::ScoringArtifact;
use crate::error::{ArtifactError, EngineError, EngineResult, ScoreError, TaskError};
use crate::features::{FEATURE_NAMES, extract_features};
use crate::readiness::{dependencies_met, unmet_dependencies};
use crate::scorer::Scorer;
use crate::task::{EXCLUDED_SCORE, STATUS_BLOCKED, STATUS_READY, Task, TaskId};
use crate::time::now_in;

#[derive(Clone)]
enum ScorerSlot {
    Loaded(Arc<dyn Scorer>),
    Unavailable(String),
}

#[derive(Clone)]
pub struct Engine {
    scorer: ScorerSlot,
    feature_names: Vec<String>,
    timezone: Tz,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scorer = match &self.scorer {
            ScorerSlot::Loaded(s) => s.name().to_string(),
            ScorerSlot::Unavailable(reason) => format!("unavailable ({reason})"),
        };
        f.debug_struct("Engine")
            .field("scorer", &scorer)
            .field("feature_names", &self.feature_names)
            .field("timezone", &self.timezone)
            .finish()
    }
}

/// Per-call counts, logged at the end of a batch.
#[derive(Debug, Default)]
struct BatchSummary {
    scored: usize,
    blocked: usize,
    errored: usize,
    ranked: usize,
}

impl Engine {
    /// Engine over an already-built scorer. `feature_names` is reported back to
    /// callers for diagnostics only.
    pub fn new(scorer: Arc<dyn Scorer>, feature_names: Vec<String>) -> Self {
        Self {
            scorer: ScorerSlot::Loaded(scorer),
            feature_names,
            timezone: Tz::UTC,
        }
    }

    /// Engine whose every call fails with [`EngineError::ScorerUnavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            scorer: ScorerSlot::Unavailable(reason.into()),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            timezone: Tz::UTC,
        }
    }

    pub fn from_artifact(artifact: ScoringArtifact) -> Result<Self, ArtifactError> {
        let scorer = artifact.into_scorer()?;
        let names = scorer.feature_names().to_vec();
        Ok(Self::new(Arc::new(scorer), names))
    }

    /// Zone used to take "now" in [`Engine::prioritize`]. Defaults to UTC.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn is_available(&self) -> bool {
        matches!(self.scorer, ScorerSlot::Loaded(_))
    }

    /// Why the scorer is missing, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.scorer {
            ScorerSlot::Loaded(_) => None,
            ScorerSlot::Unavailable(reason) => Some(reason.as_str()),
        }
    }

    /// Feature names the scorer expects, in its declared order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn scorer(&self) -> EngineResult<&dyn Scorer> {
        match &self.scorer {
            ScorerSlot::Loaded(s) => Ok(s.as_ref()),
            ScorerSlot::Unavailable(reason) => Err(EngineError::ScorerUnavailable(reason.clone())),
        }
    }

    /// Rank `tasks` against the current time in the engine's zone.
    pub fn prioritize(&self, tasks: &mut [Task], completed: &[TaskId]) -> EngineResult<Vec<Task>> {
        self.prioritize_at(tasks, completed, now_in(self.timezone))
    }

    /// Rank `tasks` against a caller-supplied reference time.
    ///
    /// Fails only when the scorer is unavailable, before any task is touched.
    /// Per-task failures are recorded on the task (score -1, `error` set).
    pub fn prioritize_at(
        &self,
        tasks: &mut [Task],
        completed: &[TaskId],
        now: NaiveDateTime,
    ) -> EngineResult<Vec<Task>> {
        let scorer = match self.scorer() {
            Ok(s) => s,
            Err(e) => {
                warn!(tasks = tasks.len(), "rejecting batch: {e}");
                return Err(e);
            }
        };

        let completed: HashSet<TaskId> = completed.iter().cloned().collect();
        let mut summary = BatchSummary::default();

        for task in tasks.iter_mut() {
            let outcome = match dependencies_met(task, &completed) {
                Ok(false) => {
                    debug!(
                        task = %task.label(),
                        unmet = ?unmet_dependencies(task, &completed).unwrap_or_default(),
                        "blocked"
                    );
                    task.score = Some(EXCLUDED_SCORE);
                    task.set_status(STATUS_BLOCKED);
                    summary.blocked += 1;
                    continue;
                }
                Ok(true) => score_task(scorer, task, now),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(score) => {
                    debug!(task = %task.label(), score, "scored");
                    task.score = Some(score);
                    task.set_status(STATUS_READY);
                    summary.scored += 1;
                }
                Err(e) => {
                    warn!(task = %task.label(), "task failed: {e}");
                    task.score = Some(EXCLUDED_SCORE);
                    task.error = Some(e.to_string());
                    summary.errored += 1;
                }
            }
        }

        let ranked = rank(tasks);
        summary.ranked = ranked.len();
        info!(
            scorer = scorer.name(),
            scored = summary.scored,
            blocked = summary.blocked,
            errored = summary.errored,
            ranked = summary.ranked,
            "prioritized batch"
        );

        Ok(ranked)
    }
}

fn score_task(scorer: &dyn Scorer, task: &Task, now: NaiveDateTime) -> Result<f64, TaskError> {
    let features = extract_features(task, now).to_features()?;
    let score = scorer.score(&features)?;
    if !score.is_finite() {
        return Err(ScoreError::NonFinite(score).into());
    }
    Ok(score)
}

/// Tasks with a non-negative score, highest first.
///
/// `sort_by` is stable, so equal scores keep their input order.
pub fn rank(tasks: &[Task]) -> Vec<Task> {
    let mut ranked: Vec<Task> = tasks.iter().filter(|t| t.is_ranked()).cloned().collect();
    ranked.sort_by(|a, b| {
        let sa = a.score.unwrap_or(EXCLUDED_SCORE);
        let sb = b.score.unwrap_or(EXCLUDED_SCORE);
        sb.total_cmp(&sa)
    });
    ranked
}
