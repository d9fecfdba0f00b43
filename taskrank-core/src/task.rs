//! Task record consumed and annotated by the prioritization engine.
//!
//! Records arrive from the caller, get scored in place, and are handed back
//! with every field they came in with. Inputs stay as raw JSON values until the
//! engine's per-task step reads them, so a badly typed field only fails its
//! own task.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::TaskError;

/// Score attached to tasks that are excluded from the ranking (blocked or errored).
pub const EXCLUDED_SCORE: f64 = -1.0;

pub const STATUS_READY: &str = "ready";
pub const STATUS_BLOCKED: &str = "blocked";

/// Status label (compared case-insensitively) that sets the overdue feature.
pub const STATUS_OVERDUE: &str = "overdue";

/// Identifier a dependency or a completed task is matched by: a JSON integer
/// or a string.
///
/// `42` and `"42"` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Int(i64),
    Text(String),
}

impl TaskId {
    /// Read an id out of a JSON value. Floats, booleans and containers are not ids.
    pub fn from_json(v: &Value) -> Option<Self> {
        match v {
            Value::Number(n) => n.as_i64().map(TaskId::Int),
            Value::String(s) => Some(TaskId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TaskId::Int(n) => Value::from(*n),
            TaskId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Int(n) => write!(f, "{n}"),
            TaskId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(n: i64) -> Self {
        TaskId::Int(n)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId::Text(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId::Text(s)
    }
}

/// Any JSON object is a task: decoding never fails, and `null` reads as absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Task {
    /// Opaque; only echoed back and used in log lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Calendar date as `YYYY-MM-DD`. Anything else degrades to zero days left.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Value>,

    /// Defaults to 0 when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency_score: Option<Value>,

    /// Expected in 0..=1, defaults to 0.0 when absent. Range is not enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_urgency: Option<Value>,

    /// Should be a list of [`TaskId`]s; see [`Task::dependency_ids`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Value>,

    /// Free text on input; the engine writes `ready` or `blocked`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,

    /// Set by the engine: a non-negative priority, or [`EXCLUDED_SCORE`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Set by the engine when reading, validating or scoring the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Caller fields the engine does not interpret; echoed back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn take(m: &mut Map<String, Value>, key: &str) -> Option<Value> {
    m.remove(key).filter(|v| !v.is_null())
}

impl From<Map<String, Value>> for Task {
    fn from(mut m: Map<String, Value>) -> Self {
        let id = take(&mut m, "id");
        let deadline = take(&mut m, "deadline");
        let urgency_score = take(&mut m, "urgency_score");
        let normalized_urgency = take(&mut m, "normalized_urgency");
        let dependencies = take(&mut m, "dependencies");
        let status = take(&mut m, "status");

        // Engine-owned outputs: a stale value of the wrong type is simply overwritten later.
        let score = take(&mut m, "score").and_then(|v| v.as_f64());
        let error = take(&mut m, "error").map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        });

        Self {
            id,
            deadline,
            urgency_score,
            normalized_urgency,
            dependencies,
            status,
            score,
            error,
            extra: m,
        }
    }
}

impl Task {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: Some(id.into().to_json()),
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: impl Into<String>) -> Self {
        self.deadline = Some(Value::String(deadline.into()));
        self
    }

    pub fn with_urgency_score(mut self, urgency: f64) -> Self {
        self.urgency_score = Some(Value::from(urgency));
        self
    }

    pub fn with_normalized_urgency(mut self, normalized: f64) -> Self {
        self.normalized_urgency = Some(Value::from(normalized));
        self
    }

    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = Some(Value::Array(
            deps.into_iter().map(|d| d.into().to_json()).collect(),
        ));
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(Value::String(status.into()));
        self
    }

    /// Dependencies as ids. Absent means none; anything other than a list of
    /// integer or string ids is an error for this task.
    pub fn dependency_ids(&self) -> Result<Vec<TaskId>, TaskError> {
        let malformed = || {
            TaskError::MalformedDependencies(
                self.dependencies
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_default(),
            )
        };

        match &self.dependencies {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| TaskId::from_json(v).ok_or_else(malformed))
                .collect(),
            Some(_) => Err(malformed()),
        }
    }

    /// Status text, if the status is a string.
    pub fn status_str(&self) -> Option<&str> {
        self.status.as_ref().and_then(Value::as_str)
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = Some(Value::String(status.to_string()));
    }

    /// True when the status label reads "overdue" in any case.
    pub fn is_overdue(&self) -> bool {
        self.status_str()
            .is_some_and(|s| s.to_lowercase() == STATUS_OVERDUE)
    }

    /// True once the engine has given this task a rankable (non-negative) score.
    pub fn is_ranked(&self) -> bool {
        self.score.is_some_and(|s| s >= 0.0)
    }

    pub fn is_blocked(&self) -> bool {
        self.status_str() == Some(STATUS_BLOCKED)
    }

    /// Id for log lines; tasks without one print as `-`.
    pub fn label(&self) -> String {
        match &self.id {
            None => "-".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}
