//! Request boundary: turns a raw JSON batch into an engine call.
//!
//! This is what a transport (HTTP handler, CLI, queue consumer) calls. It
//! rejects malformed batches before the engine runs and reports an unloaded
//! scorer separately from per-task failures.
//!
//! Accepted body:
//!
//! ```json
//! { "tasks": [ { "id": 1, "deadline": "2026-03-11", ... } ], "completed_task_ids": [4, 7] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::task::{Task, TaskId};

/// Keys every task in a request must carry, even if the engine has defaults for them.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "deadline",
    "urgency_score",
    "dependencies",
    "status",
    "normalized_urgency",
];

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("No tasks provided in request body")]
    NoTasks,

    #[error("Task {index} is not an object")]
    NotAnObject { index: usize },

    #[error("Task missing required fields: {}", required.join(", "))]
    MissingFields {
        index: usize,
        required: Vec<String>,
        received: Vec<String>,
    },

    #[error("completed_task_ids is malformed: {0}")]
    MalformedCompleted(#[source] serde_json::Error),

    #[error("Model not loaded: {reason}")]
    ScorerUnavailable { reason: String },
}

impl From<EngineError> for RequestError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ScorerUnavailable(reason) => RequestError::ScorerUnavailable { reason },
        }
    }
}

impl RequestError {
    /// True when the caller sent a bad batch, false when the service itself cannot answer.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RequestError::ScorerUnavailable { .. })
    }

    /// Error body for the transport, with the diagnostics a caller needs to fix
    /// the request or the deployment.
    pub fn to_body(&self, engine: &Engine) -> Value {
        let model_status = if engine.is_available() {
            "loaded"
        } else {
            "not loaded"
        };
        let mut body = json!({
            "error": self.to_string(),
            "expected_features": engine.feature_names(),
            "model_status": model_status,
        });
        if let RequestError::MissingFields { index, received, .. } = self {
            body["task_index"] = json!(index);
            body["received"] = json!(received);
        }
        body
    }
}

/// A validated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizeRequest {
    pub tasks: Vec<Task>,
    pub completed_task_ids: Vec<TaskId>,
}

impl PrioritizeRequest {
    /// Check the shape of `body` and decode it.
    ///
    /// Only a missing `tasks` array, a task that is not an object, or a task
    /// missing a required key rejects the batch. Badly typed values are left
    /// for the engine to fail per task.
    pub fn from_json(body: Value) -> Result<Self, RequestError> {
        let Value::Object(mut body) = body else {
            return Err(RequestError::NoTasks);
        };
        let Some(Value::Array(raw_tasks)) = body.remove("tasks") else {
            return Err(RequestError::NoTasks);
        };

        let mut tasks = Vec::with_capacity(raw_tasks.len());
        for (index, raw) in raw_tasks.into_iter().enumerate() {
            let Value::Object(obj) = raw else {
                return Err(RequestError::NotAnObject { index });
            };
            check_required_fields(index, &obj)?;
            tasks.push(Task::from(obj));
        }

        let completed_task_ids = match body.remove("completed_task_ids") {
            None | Some(Value::Null) => Vec::new(),
            Some(ids) => serde_json::from_value(ids).map_err(RequestError::MalformedCompleted)?,
        };

        Ok(Self {
            tasks,
            completed_task_ids,
        })
    }
}

fn check_required_fields(index: usize, obj: &Map<String, Value>) -> Result<(), RequestError> {
    if REQUIRED_FIELDS.iter().all(|f| obj.contains_key(*f)) {
        return Ok(());
    }
    Err(RequestError::MissingFields {
        index,
        required: REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect(),
        received: obj.keys().cloned().collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrioritizeResponse {
    pub prioritized_tasks: Vec<Task>,
    /// Feature names the scorer expects, for debugging clients.
    pub feature_set: Vec<String>,
}

/// Validate `body`, run the engine, and build the response.
pub fn handle_request(engine: &Engine, body: Value) -> Result<PrioritizeResponse, RequestError> {
    handle_request_annotated(engine, body).map(|(response, _)| response)
}

/// Like [`handle_request`], but also hands back every task as the engine left
/// it, including blocked and errored ones that the ranking omits.
pub fn handle_request_annotated(
    engine: &Engine,
    body: Value,
) -> Result<(PrioritizeResponse, Vec<Task>), RequestError> {
    if !body.get("tasks").is_some_and(Value::is_array) {
        return Err(RequestError::NoTasks);
    }
    if let Some(reason) = engine.unavailable_reason() {
        return Err(RequestError::ScorerUnavailable {
            reason: reason.to_string(),
        });
    }

    let mut request = PrioritizeRequest::from_json(body)?;
    let ranked = engine.prioritize(&mut request.tasks, &request.completed_task_ids)?;

    let response = PrioritizeResponse {
        prioritized_tasks: ranked,
        feature_set: engine.feature_names().to_vec(),
    };
    Ok((response, request.tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_NAMES;
    use crate::scorer::FnScorer;
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(
            Arc::new(FnScorer::new("normalized", |x: &crate::Features| x[3])),
            FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn full_task(id: i64, normalized: f64, deps: Value) -> Value {
        json!({
            "id": id,
            "deadline": "2030-01-01",
            "urgency_score": 3,
            "dependencies": deps,
            "status": "pending",
            "normalized_urgency": normalized,
        })
    }

    #[test]
    fn ranks_valid_batch() {
        let body = json!({
            "tasks": [full_task(1, 0.2, json!([])), full_task(2, 0.8, json!([]))],
        });

        let resp = handle_request(&engine(), body).unwrap();

        assert_eq!(resp.prioritized_tasks.len(), 2);
        assert_eq!(resp.prioritized_tasks[0].id, Some(json!(2)));
        assert_eq!(resp.feature_set[0], "days_left");
    }

    #[test]
    fn annotated_result_keeps_blocked_tasks() {
        let body = json!({
            "tasks": [full_task(1, 0.2, json!([9])), full_task(2, 0.8, json!([5]))],
            "completed_task_ids": [5],
        });

        let (resp, all) = handle_request_annotated(&engine(), body).unwrap();

        assert_eq!(resp.prioritized_tasks.len(), 1);
        assert_eq!(all.len(), 2);
        assert!(all[0].is_blocked());
        assert_eq!(all[0].score, Some(-1.0));
    }

    #[test]
    fn missing_tasks_key_is_rejected() {
        assert!(matches!(
            handle_request(&engine(), json!({ "completed_task_ids": [] })),
            Err(RequestError::NoTasks)
        ));
        assert!(matches!(
            handle_request(&engine(), json!([1, 2])),
            Err(RequestError::NoTasks)
        ));
    }

    #[test]
    fn missing_required_field_rejects_whole_batch() {
        let mut partial = full_task(2, 0.5, json!([]));
        partial.as_object_mut().unwrap().remove("status");
        let body = json!({ "tasks": [full_task(1, 0.2, json!([])), partial] });

        let err = handle_request(&engine(), body).unwrap_err();

        match &err {
            RequestError::MissingFields {
                index, received, ..
            } => {
                assert_eq!(*index, 1);
                assert!(!received.contains(&"status".to_string()));
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
        assert!(err.is_client_error());
        let body = err.to_body(&engine());
        assert_eq!(body["model_status"], "loaded");
        assert_eq!(body["task_index"], 1);
    }

    #[test]
    fn unavailable_scorer_is_reported_before_field_checks() {
        let engine = Engine::unavailable("no artifact at ~/.taskrank/model.json");
        let body = json!({ "tasks": [ { "id": 1 } ] });

        let err = handle_request(&engine, body).unwrap_err();

        assert!(matches!(
            &err,
            RequestError::ScorerUnavailable { reason } if reason.contains("no artifact")
        ));
        assert!(!err.is_client_error());
        let body = err.to_body(&engine);
        assert_eq!(body["model_status"], "not loaded");
        assert_eq!(body["expected_features"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn badly_typed_fields_fail_only_their_task() {
        let mut bad_status = full_task(2, 0.9, json!([]));
        bad_status["status"] = json!(5);
        let bad_deps = full_task(3, 0.7, json!("1,2"));
        let mut float_id = full_task(4, 0.5, json!([]));
        float_id["id"] = json!(2.5);
        let body = json!({
            "tasks": [full_task(1, 0.2, json!([])), bad_status, bad_deps, float_id],
        });

        let (resp, all) = handle_request_annotated(&engine(), body).unwrap();

        let ranked: Vec<_> = resp.prioritized_tasks.iter().map(|t| t.label()).collect();
        assert_eq!(ranked, vec!["2.5", "1"]);
        assert!(all[1].error.as_deref().is_some_and(|e| e.contains("status_overdue")));
        assert_eq!(all[1].status, Some(json!(5)));
        assert!(all[2].error.as_deref().is_some_and(|e| e.contains("dependencies")));
        assert_eq!(all[2].score, Some(-1.0));
        assert!(all[3].error.is_none());
        assert_eq!(all[3].id, Some(json!(2.5)));
    }

    #[test]
    fn non_object_task_rejects_whole_batch() {
        let body = json!({ "tasks": [full_task(1, 0.2, json!([])), "task 2"] });
        assert!(matches!(
            handle_request(&engine(), body),
            Err(RequestError::NotAnObject { index: 1 })
        ));
    }

    #[test]
    fn non_numeric_urgency_is_a_task_error_not_a_request_error() {
        let mut task = full_task(1, 0.2, json!([]));
        task["urgency_score"] = json!("urgent");
        let body = json!({ "tasks": [task, full_task(2, 0.1, json!([]))] });

        let (resp, all) = handle_request_annotated(&engine(), body).unwrap();

        assert_eq!(resp.prioritized_tasks.len(), 1);
        assert!(all[0].error.is_some());
    }
}
