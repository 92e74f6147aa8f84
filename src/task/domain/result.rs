//! Result records aggregating the task runs of a completed task.

use super::{ResultId, TaskId, TaskRunId};
use crate::project::domain::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A result row about to be inserted as the current result of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskResult {
    /// Owning project.
    pub project_id: ProjectId,
    /// Completed task.
    pub task_id: TaskId,
    /// Every run present at completion time, ascending.
    pub task_run_ids: Vec<TaskRunId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl NewTaskResult {
    /// Attaches the store-assigned identifier. New rows are always current.
    #[must_use]
    pub fn into_result(self, id: ResultId) -> TaskResult {
        TaskResult {
            id,
            project_id: self.project_id,
            task_id: self.task_id,
            task_run_ids: self.task_run_ids,
            last_version: true,
            created_at: self.created_at,
        }
    }
}

/// Immutable snapshot of the runs that completed a task.
///
/// At most one row per task has `last_version` set. Superseded rows stay
/// for audit with the flag cleared. Run ids are weak references: deleting a
/// run later does not touch existing rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    id: ResultId,
    project_id: ProjectId,
    task_id: TaskId,
    task_run_ids: Vec<TaskRunId>,
    last_version: bool,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedResultData {
    /// Persisted identifier.
    pub id: ResultId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Completed task.
    pub task_id: TaskId,
    /// Referenced runs.
    pub task_run_ids: Vec<TaskRunId>,
    /// Whether this is the current row for the task.
    pub last_version: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TaskResult {
    /// Reconstructs a result from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedResultData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            task_id: data.task_id,
            task_run_ids: data.task_run_ids,
            last_version: data.last_version,
            created_at: data.created_at,
        }
    }

    /// Returns the result identifier.
    #[must_use]
    pub const fn id(&self) -> ResultId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the completed task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the referenced run ids in submission order.
    #[must_use]
    pub fn task_run_ids(&self) -> &[TaskRunId] {
        &self.task_run_ids
    }

    /// Returns `true` for the current row of the task.
    #[must_use]
    pub const fn last_version(&self) -> bool {
        self.last_version
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) const fn supersede(&mut self) {
        self.last_version = false;
    }
}
