//! Batch loading: JSON request bodies or a flat CSV of tasks.
//!
//! CSV columns: `id,deadline,urgency_score,normalized_urgency,dependencies,status`,
//! with dependency ids separated by `;`. Cells are turned into the same JSON a
//! request body would carry, so both inputs go through one validation path.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvTask {
    id: String,
    deadline: String,
    urgency_score: String,
    normalized_urgency: String,
    dependencies: String,
    status: String,
}

impl CsvTask {
    fn into_json(self) -> Value {
        json!({
            "id": parse_id(&self.id),
            "deadline": text_cell(&self.deadline),
            "urgency_score": number_cell(&self.urgency_score),
            "normalized_urgency": number_cell(&self.normalized_urgency),
            "dependencies": parse_id_list(&self.dependencies),
            "status": self.status.trim(),
        })
    }
}

/// Read a batch from `path` as a request body `{ "tasks": [...], ... }`.
///
/// A `.csv` extension selects the CSV reader. A JSON file may hold either a
/// full request body or a bare array of tasks.
pub fn load_batch(path: &Path) -> Result<Value> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        return load_csv(path);
    }

    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let body: Value =
        serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    match body {
        Value::Array(tasks) => Ok(json!({ "tasks": tasks })),
        Value::Object(_) => Ok(body),
        _ => bail!("{}: expected a JSON object or array", path.display()),
    }
}

fn load_csv(path: &Path) -> Result<Value> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let mut tasks = Vec::new();
    for (i, row) in rdr.deserialize::<CsvTask>().enumerate() {
        let row = row.with_context(|| format!("{}: row {}", path.display(), i + 1))?;
        tasks.push(row.into_json());
    }
    Ok(json!({ "tasks": tasks }))
}

/// Set `completed_task_ids` on `body`, replacing whatever the file carried.
pub fn set_completed(body: &mut Value, ids: &[String]) -> Result<()> {
    let Some(obj) = body.as_object_mut() else {
        bail!("request body is not an object");
    };
    let ids: Vec<Value> = ids.iter().map(|s| parse_id(s)).collect();
    obj.insert("completed_task_ids".to_string(), Value::Array(ids));
    Ok(())
}

/// Integer-looking ids become integers so they match JSON batches; the rest stay strings.
pub fn parse_id(raw: &str) -> Value {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(raw.to_string()),
    }
}

fn parse_id_list(raw: &str) -> Value {
    Value::Array(
        raw.split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_id)
            .collect(),
    )
}

fn text_cell(raw: &str) -> Value {
    match raw.trim() {
        "" => Value::Null,
        s => Value::String(s.to_string()),
    }
}

/// Numbers parse; anything else is kept as text so the engine reports it on the task.
fn number_cell(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    match raw.parse::<f64>() {
        Ok(x) if x.is_finite() => Value::from(x),
        _ => Value::String(raw.to_string()),
    }
}

/// The `tasks` array of a body, or an empty list.
pub fn raw_tasks(body: &Value) -> Vec<Map<String, Value>> {
    body.get("tasks")
        .and_then(Value::as_array)
        .map(|tasks| {
            tasks
                .iter()
                .filter_map(|t| t.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}
