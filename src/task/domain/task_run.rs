//! Task runs: answers submitted by contributors.

use super::{TaskDomainError, TaskId, TaskRunId, values::validate_payload};
use crate::project::domain::{ProjectId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who submitted a task run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Contributor {
    /// A registered user.
    User(UserId),
    /// An anonymous volunteer identified by an opaque token such as an
    /// address hash.
    Anonymous(String),
}

impl Contributor {
    /// Creates an anonymous contributor.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyAnonymousId`] for blank identifiers.
    pub fn anonymous(id: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = id.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TaskDomainError::EmptyAnonymousId);
        }
        Ok(Self::Anonymous(trimmed.to_owned()))
    }

    /// Returns the registered user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(user) => Some(*user),
            Self::Anonymous(_) => None,
        }
    }

    /// Returns the anonymous identifier, if any.
    #[must_use]
    pub fn anonymous_id(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Anonymous(id) => Some(id),
        }
    }
}

/// Validated task-run data that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskRun {
    project_id: ProjectId,
    task_id: TaskId,
    contributor: Contributor,
    info: Value,
    created_at: DateTime<Utc>,
    finish_time: DateTime<Utc>,
}

impl NewTaskRun {
    /// Creates a task run finished at submission time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyPayload`] when the answer is `null`
    /// or an empty object.
    pub fn new(
        project_id: ProjectId,
        task_id: TaskId,
        contributor: Contributor,
        info: Value,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        validate_payload(&info)?;
        let now = clock.utc();
        Ok(Self {
            project_id,
            task_id,
            contributor,
            info,
            created_at: now,
            finish_time: now,
        })
    }

    /// Overrides the finish timestamp reported by the client.
    #[must_use]
    pub const fn with_finish_time(mut self, finish_time: DateTime<Utc>) -> Self {
        self.finish_time = finish_time;
        self
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the answered task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the contributor.
    #[must_use]
    pub const fn contributor(&self) -> &Contributor {
        &self.contributor
    }

    /// Returns the answer payload.
    #[must_use]
    pub const fn info(&self) -> &Value {
        &self.info
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the finish timestamp.
    #[must_use]
    pub const fn finish_time(&self) -> DateTime<Utc> {
        self.finish_time
    }

    /// Attaches the store-assigned identifier.
    #[must_use]
    pub fn into_task_run(self, id: TaskRunId) -> TaskRun {
        TaskRun {
            id,
            project_id: self.project_id,
            task_id: self.task_id,
            contributor: self.contributor,
            info: self.info,
            created_at: self.created_at,
            finish_time: self.finish_time,
        }
    }
}

/// A stored answer. Immutable apart from administrative deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRun {
    id: TaskRunId,
    project_id: ProjectId,
    task_id: TaskId,
    contributor: Contributor,
    info: Value,
    created_at: DateTime<Utc>,
    finish_time: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskRunData {
    /// Persisted identifier.
    pub id: TaskRunId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Answered task.
    pub task_id: TaskId,
    /// Contributor.
    pub contributor: Contributor,
    /// Answer payload.
    pub info: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Finish timestamp.
    pub finish_time: DateTime<Utc>,
}

impl TaskRun {
    /// Reconstructs a task run from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskRunData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            task_id: data.task_id,
            contributor: data.contributor,
            info: data.info,
            created_at: data.created_at,
            finish_time: data.finish_time,
        }
    }

    /// Returns the task-run identifier.
    #[must_use]
    pub const fn id(&self) -> TaskRunId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the answered task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the contributor.
    #[must_use]
    pub const fn contributor(&self) -> &Contributor {
        &self.contributor
    }

    /// Returns the answer payload.
    #[must_use]
    pub const fn info(&self) -> &Value {
        &self.info
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the finish timestamp.
    #[must_use]
    pub const fn finish_time(&self) -> DateTime<Utc> {
        self.finish_time
    }
}
