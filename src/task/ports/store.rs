//! Store port for tasks, task runs and results.

use crate::project::domain::ProjectId;
use crate::task::domain::{
    CompiledFilter, Contributor, Fingerprint, NewTask, NewTaskResult, NewTaskRun, Page, Priority,
    ProjectProgress, Redundancy, Task, TaskId, TaskInfoUpdate, TaskResult, TaskRun, TaskRunId,
    TaskState, TaskTally,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Selection of task runs inside a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRunQuery {
    /// Restrict to runs of one task.
    pub task_id: Option<TaskId>,
    /// Restrict to runs of one contributor.
    pub contributor: Option<Contributor>,
    /// Listing window.
    pub page: Page,
}

impl TaskRunQuery {
    /// Selects every run of the project.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects the runs of `task_id`.
    #[must_use]
    pub fn for_task(task_id: TaskId) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    /// Restricts the query to `contributor`.
    #[must_use]
    pub fn by(mut self, contributor: Contributor) -> Self {
        self.contributor = Some(contributor);
        self
    }

    /// Sets the listing window.
    #[must_use]
    pub const fn with_page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }
}

/// Rows removed by a deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionCounts {
    /// Deleted tasks.
    pub tasks: u64,
    /// Deleted task runs.
    pub task_runs: u64,
    /// Deleted result rows.
    pub results: u64,
}

/// Task, task-run and result persistence contract.
///
/// Every mutating method is atomic: on error nothing was written. Cache
/// signals are emitted by the services around the store, not by adapters.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task and returns it with its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Integrity`] when the store rejects the row.
    async fn create_task(&self, task: &NewTask) -> TaskStoreResult<Task>;

    /// Replaces the payload and fingerprint of a task and returns the stored
    /// task. No other column is written.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    async fn update_task_info(&self, id: TaskId, update: &TaskInfoUpdate)
    -> TaskStoreResult<Task>;

    /// Sets the export flag of a task and returns the stored task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    async fn set_exported(&self, id: TaskId, exported: bool) -> TaskStoreResult<Task>;

    /// Finds a task by identifier.
    async fn find_task(&self, id: TaskId) -> TaskStoreResult<Option<Task>>;

    /// Lists the project's tasks matching `filter`.
    async fn find_tasks(
        &self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        page: Page,
    ) -> TaskStoreResult<Vec<Task>>;

    /// Counts the project's tasks matching `filter`.
    async fn count_tasks(
        &self,
        project_id: ProjectId,
        filter: &CompiledFilter,
    ) -> TaskStoreResult<u64>;

    /// Finds an ongoing task of the project whose payload fingerprint equals
    /// `fingerprint`. The lowest id wins when several match.
    async fn find_ongoing_by_fingerprint(
        &self,
        project_id: ProjectId,
        fingerprint: &Fingerprint,
    ) -> TaskStoreResult<Option<TaskId>>;

    /// Deletes a task with its runs and results; returns the removed rows,
    /// or `None` when the task is not part of the project.
    async fn delete_task(
        &self,
        project_id: ProjectId,
        id: TaskId,
    ) -> TaskStoreResult<Option<DeletionCounts>>;

    /// Stores a new task run.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::TaskNotInProject`] when the task does not
    /// exist in the run's project.
    async fn create_task_run(&self, run: &NewTaskRun) -> TaskStoreResult<TaskRun>;

    /// Finds a task run by identifier.
    async fn find_task_run(&self, id: TaskRunId) -> TaskStoreResult<Option<TaskRun>>;

    /// Lists the project's runs selected by `query`.
    async fn find_task_runs(
        &self,
        project_id: ProjectId,
        query: &TaskRunQuery,
    ) -> TaskStoreResult<Vec<TaskRun>>;

    /// Counts the project's runs, optionally for one task.
    async fn count_task_runs(
        &self,
        project_id: ProjectId,
        task_id: Option<TaskId>,
    ) -> TaskStoreResult<u64>;

    /// Lists runs of completed tasks in ascending run id order, optionally
    /// restricted by the task's export flag.
    async fn find_completed_task_runs(
        &self,
        project_id: ProjectId,
        exported: Option<bool>,
        page: Page,
    ) -> TaskStoreResult<Vec<TaskRun>>;

    /// Deletes every run of the project; results are kept.
    async fn delete_project_task_runs(&self, project_id: ProjectId) -> TaskStoreResult<u64>;

    /// Lists every result row of a task, oldest first.
    async fn find_results(&self, task_id: TaskId) -> TaskStoreResult<Vec<TaskResult>>;

    /// Finds the current result of a task.
    async fn find_current_result(&self, task_id: TaskId) -> TaskStoreResult<Option<TaskResult>>;

    /// Lists the project's results in ascending id order.
    async fn find_project_results(
        &self,
        project_id: ProjectId,
        current_only: bool,
        page: Page,
    ) -> TaskStoreResult<Vec<TaskResult>>;

    /// Computes progress statistics for the project.
    async fn project_progress(&self, project_id: ProjectId) -> TaskStoreResult<ProjectProgress>;

    /// Runs `work` inside one store transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back
    /// otherwise, returning the error unchanged.
    async fn transaction<F, T>(&self, work: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut dyn CompletionUnit) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static;
}

/// Operations available inside a store transaction.
///
/// Selection methods lock the rows they return until the transaction ends,
/// always in ascending id order.
pub trait CompletionUnit {
    /// Locks one task and reads its tally.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn lock_task(&mut self, id: TaskId) -> TaskStoreResult<Option<TaskTally>>;

    /// Locks the project's tasks matching `filter` and reads their tallies.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn lock_tasks(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
    ) -> TaskStoreResult<Vec<TaskTally>>;

    /// Clears the export flag.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn reset_exported(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64>;

    /// Sets `n_answers`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn set_redundancy(&mut self, ids: &[TaskId], n_answers: Redundancy) -> TaskStoreResult<u64>;

    /// Sets the completion state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn set_state(&mut self, ids: &[TaskId], state: TaskState) -> TaskStoreResult<u64>;

    /// Clears `last_version` on the current results.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn supersede_current_results(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64>;

    /// Inserts a new current result.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateCurrentResult`] when the task
    /// already has a current result.
    fn insert_result(&mut self, result: &NewTaskResult) -> TaskStoreResult<TaskResult>;

    /// Deletes the current results; superseded rows stay.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete_current_results(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64>;

    /// Sets the priority of the project's tasks matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn set_priority(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        priority: Priority,
    ) -> TaskStoreResult<u64>;

    /// Deletes the project's tasks matching `filter` with their runs and
    /// results. Without `force`, tasks with any result row are kept.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store fails.
    fn delete_tasks(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        force: bool,
    ) -> TaskStoreResult<DeletionCounts>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A task run referenced a task outside its project.
    #[error("task {task_id} does not belong to project {project_id}")]
    TaskNotInProject {
        /// Referenced task.
        task_id: TaskId,
        /// Project of the run.
        project_id: ProjectId,
    },

    /// A concurrent writer already inserted the current result.
    #[error("task {0} already has a current result")]
    DuplicateCurrentResult(TaskId),

    /// The store rejected a write and rolled the transaction back.
    #[error("integrity violation on {constraint}: {cause}")]
    Integrity {
        /// Violated constraint.
        constraint: String,
        /// Original store error.
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Wraps a constraint violation.
    pub fn integrity(
        constraint: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Integrity {
            constraint: constraint.into(),
            cause: Arc::new(cause),
        }
    }
}
