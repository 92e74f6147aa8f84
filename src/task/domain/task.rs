//! Task aggregate and its completion state.

use super::{
    Fingerprint, ParseTaskStateError, Priority, Redundancy, TaskDomainError, TaskId,
    values::validate_payload,
};
use crate::project::domain::ProjectId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// The task still needs task runs.
    Ongoing,
    /// The task reached its redundancy target at the last re-evaluation.
    Completed,
}

impl TaskState {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<&str> for TaskState {
    type Error = ParseTaskStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "ongoing" => Ok(Self::Ongoing),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseTaskStateError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated replacement payload with its fingerprint.
///
/// Stores write only the payload columns, so concurrent changes to the
/// priority, export flag or completion state survive the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfoUpdate {
    info: Value,
    fingerprint: Fingerprint,
}

impl TaskInfoUpdate {
    /// Validates `info` and computes its fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyPayload`] when `info` is `null` or an
    /// empty object.
    pub fn new(info: Value) -> Result<Self, TaskDomainError> {
        validate_payload(&info)?;
        Ok(Self {
            fingerprint: Fingerprint::of(&info),
            info,
        })
    }

    /// Returns the new payload.
    #[must_use]
    pub const fn info(&self) -> &Value {
        &self.info
    }

    /// Returns the fingerprint of the new payload.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Validated task data that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    project_id: ProjectId,
    info: Value,
    fingerprint: Fingerprint,
    priority: Priority,
    n_answers: Redundancy,
    created_at: DateTime<Utc>,
}

impl NewTask {
    /// Creates an ongoing task for `project_id` with default priority and
    /// redundancy.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyPayload`] when `info` is `null` or an
    /// empty object.
    pub fn new(
        project_id: ProjectId,
        info: Value,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        validate_payload(&info)?;
        Ok(Self {
            project_id,
            fingerprint: Fingerprint::of(&info),
            info,
            priority: Priority::default(),
            n_answers: Redundancy::default(),
            created_at: clock.utc(),
        })
    }

    /// Sets the scheduling priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the redundancy target.
    #[must_use]
    pub const fn with_redundancy(mut self, n_answers: Redundancy) -> Self {
        self.n_answers = n_answers;
        self
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the task payload.
    #[must_use]
    pub const fn info(&self) -> &Value {
        &self.info
    }

    /// Returns the payload fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the scheduling priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the redundancy target.
    #[must_use]
    pub const fn n_answers(&self) -> Redundancy {
        self.n_answers
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Attaches the store-assigned identifier. New tasks start ongoing and
    /// not exported.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            project_id: self.project_id,
            info: self.info,
            fingerprint: self.fingerprint,
            priority: self.priority,
            n_answers: self.n_answers,
            state: TaskState::Ongoing,
            exported: false,
            created_at: self.created_at,
        }
    }
}

/// Unit of work that volunteers answer.
///
/// `state` and `n_answers` only change through the completion engine; plain
/// updates persist the payload, priority and export flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    project_id: ProjectId,
    info: Value,
    fingerprint: Fingerprint,
    priority: Priority,
    n_answers: Redundancy,
    state: TaskState,
    exported: bool,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTaskData {
    /// Persisted identifier.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Persisted payload.
    pub info: Value,
    /// Persisted payload fingerprint.
    pub fingerprint: Fingerprint,
    /// Persisted priority.
    pub priority: Priority,
    /// Persisted redundancy target.
    pub n_answers: Redundancy,
    /// Persisted completion state.
    pub state: TaskState,
    /// Persisted export flag.
    pub exported: bool,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            info: data.info,
            fingerprint: data.fingerprint,
            priority: data.priority,
            n_answers: data.n_answers,
            state: data.state,
            exported: data.exported,
            created_at: data.created_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the task payload.
    #[must_use]
    pub const fn info(&self) -> &Value {
        &self.info
    }

    /// Returns the payload fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the scheduling priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the redundancy target.
    #[must_use]
    pub const fn n_answers(&self) -> Redundancy {
        self.n_answers
    }

    /// Returns the completion state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Returns `true` when the task was part of a prior export snapshot.
    #[must_use]
    pub const fn exported(&self) -> bool {
        self.exported
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replaces the payload and its fingerprint.
    pub(crate) fn apply_info(&mut self, update: &TaskInfoUpdate) {
        self.info.clone_from(&update.info);
        self.fingerprint.clone_from(&update.fingerprint);
    }

    /// Sets the scheduling priority.
    pub const fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// Sets the export flag.
    pub const fn set_exported(&mut self, exported: bool) {
        self.exported = exported;
    }

    pub(crate) const fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) const fn set_n_answers(&mut self, n_answers: Redundancy) {
        self.n_answers = n_answers;
    }
}
