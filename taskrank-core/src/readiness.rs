//! Dependency gate: a task is ready only when every prerequisite is completed.

use std::collections::HashSet;

use crate::error::TaskError;
use crate::task::{Task, TaskId};

/// True iff every dependency of `task` is in `completed`. No dependencies is ready.
///
/// A `dependencies` field that is not a list of ids is an error for this task only.
pub fn dependencies_met(task: &Task, completed: &HashSet<TaskId>) -> Result<bool, TaskError> {
    Ok(task
        .dependency_ids()?
        .iter()
        .all(|dep| completed.contains(dep)))
}

/// Dependencies of `task` that are not yet completed, in declaration order.
pub fn unmet_dependencies(task: &Task, completed: &HashSet<TaskId>) -> Result<Vec<TaskId>, TaskError> {
    Ok(task
        .dependency_ids()?
        .into_iter()
        .filter(|dep| !completed.contains(dep))
        .collect())
}
