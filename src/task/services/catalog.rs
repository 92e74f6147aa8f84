//! Task creation, import and read access.

use super::{DuplicateDetector, notify_project};
use crate::project::domain::ProjectId;
use crate::task::domain::{
    NewTask, Page, Priority, ProjectProgress, Redundancy, Task, TaskDomainError, TaskFilter,
    TaskId, TaskInfoUpdate, TaskResult, TaskRun, TaskRunId,
};
use crate::task::ports::{CacheInvalidator, TaskRunQuery, TaskStore, TaskStoreError};
use mockable::Clock;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Service-level errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Input validation failed before any write.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Values applied when a create request leaves them out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskDefaults {
    /// Default scheduling priority.
    pub priority: Priority,
    /// Default redundancy target.
    pub n_answers: Redundancy,
}

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
    project_id: ProjectId,
    info: Value,
    priority: Option<f64>,
    n_answers: Option<u32>,
}

impl CreateTaskRequest {
    /// Creates a request using the service defaults.
    #[must_use]
    pub const fn new(project_id: ProjectId, info: Value) -> Self {
        Self {
            project_id,
            info,
            priority: None,
            n_answers: None,
        }
    }

    /// Sets the priority; it must lie in `[0.0, 1.0]`.
    #[must_use]
    pub const fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the redundancy target.
    #[must_use]
    pub const fn with_redundancy(mut self, n_answers: u32) -> Self {
        self.n_answers = Some(n_answers);
        self
    }
}

/// Outcome of [`TaskCatalogService::import_task`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// A new task was stored.
    Created(Task),
    /// An ongoing task with the same payload already exists.
    Duplicate(TaskId),
}

/// Task catalog orchestration service.
#[derive(Clone)]
pub struct TaskCatalogService<S, K, C>
where
    S: TaskStore,
    K: CacheInvalidator,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    cache: Arc<K>,
    clock: Arc<C>,
    duplicates: DuplicateDetector<S>,
    defaults: TaskDefaults,
}

impl<S, K, C> TaskCatalogService<S, K, C>
where
    S: TaskStore,
    K: CacheInvalidator,
    C: Clock + Send + Sync,
{
    /// Creates a new catalog service with built-in task defaults.
    #[must_use]
    pub fn new(store: Arc<S>, cache: Arc<K>, clock: Arc<C>) -> Self {
        Self {
            duplicates: DuplicateDetector::new(Arc::clone(&store)),
            store,
            cache,
            clock,
            defaults: TaskDefaults::default(),
        }
    }

    /// Replaces the task defaults.
    #[must_use]
    pub const fn with_defaults(mut self, defaults: TaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn build_task(&self, request: CreateTaskRequest) -> CatalogResult<NewTask> {
        let priority = request
            .priority
            .map(Priority::new)
            .transpose()?
            .unwrap_or(self.defaults.priority);
        let n_answers = request
            .n_answers
            .map(Redundancy::new)
            .transpose()?
            .unwrap_or(self.defaults.n_answers);
        Ok(NewTask::new(request.project_id, request.info, &*self.clock)?
            .with_priority(priority)
            .with_redundancy(n_answers))
    }

    /// Creates a task.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Domain`] for an empty payload or an
    /// out-of-range priority or redundancy, and [`CatalogError::Store`]
    /// when persistence fails.
    pub async fn create_task(&self, request: CreateTaskRequest) -> CatalogResult<Task> {
        let new_task = self.build_task(request)?;
        let task = self.store.create_task(&new_task).await?;
        debug!(project_id = %task.project_id(), task_id = %task.id(), "task created");
        notify_project(&*self.cache, task.project_id()).await;
        Ok(task)
    }

    /// Creates a task unless an ongoing task of the project already carries
    /// the same payload.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] under the same conditions as
    /// [`Self::create_task`].
    pub async fn import_task(&self, request: CreateTaskRequest) -> CatalogResult<ImportOutcome> {
        let new_task = self.build_task(request)?;
        if let Some(existing) = self
            .duplicates
            .find_duplicate(new_task.project_id(), new_task.info())
            .await?
        {
            info!(
                project_id = %new_task.project_id(),
                task_id = %existing,
                "skipping duplicate task import"
            );
            return Ok(ImportOutcome::Duplicate(existing));
        }
        let task = self.store.create_task(&new_task).await?;
        notify_project(&*self.cache, task.project_id()).await;
        Ok(ImportOutcome::Created(task))
    }

    /// Replaces a task payload and refreshes its fingerprint. Priority,
    /// export flag and completion state are left as stored.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Domain`] for an empty payload and
    /// [`TaskStoreError::NotFound`] when the task does not exist.
    pub async fn update_task_info(&self, task_id: TaskId, info: Value) -> CatalogResult<Task> {
        let update = TaskInfoUpdate::new(info)?;
        let task = self.store.update_task_info(task_id, &update).await?;
        notify_project(&*self.cache, task.project_id()).await;
        Ok(task)
    }

    /// Sets the export flag of one task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    pub async fn set_exported(&self, task_id: TaskId, exported: bool) -> CatalogResult<Task> {
        let task = self.store.set_exported(task_id, exported).await?;
        notify_project(&*self.cache, task.project_id()).await;
        Ok(task)
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the lookup fails.
    pub async fn get_task(&self, task_id: TaskId) -> CatalogResult<Option<Task>> {
        Ok(self.store.find_task(task_id).await?)
    }

    /// Lists the project's tasks matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Domain`] for a malformed filter.
    pub async fn find_tasks(
        &self,
        project_id: ProjectId,
        filter: &TaskFilter,
        page: Page,
    ) -> CatalogResult<Vec<Task>> {
        let compiled = filter.compile()?;
        Ok(self.store.find_tasks(project_id, &compiled, page).await?)
    }

    /// Counts the project's tasks matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Domain`] for a malformed filter.
    pub async fn count_tasks(
        &self,
        project_id: ProjectId,
        filter: &TaskFilter,
    ) -> CatalogResult<u64> {
        let compiled = filter.compile()?;
        Ok(self.store.count_tasks(project_id, &compiled).await?)
    }

    /// Retrieves a task run by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the lookup fails.
    pub async fn get_task_run(&self, run_id: TaskRunId) -> CatalogResult<Option<TaskRun>> {
        Ok(self.store.find_task_run(run_id).await?)
    }

    /// Lists the project's runs selected by `query`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the lookup fails.
    pub async fn find_task_runs(
        &self,
        project_id: ProjectId,
        query: &TaskRunQuery,
    ) -> CatalogResult<Vec<TaskRun>> {
        Ok(self.store.find_task_runs(project_id, query).await?)
    }

    /// Counts the project's runs, optionally for one task.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the lookup fails.
    pub async fn count_task_runs(
        &self,
        project_id: ProjectId,
        task_id: Option<TaskId>,
    ) -> CatalogResult<u64> {
        Ok(self.store.count_task_runs(project_id, task_id).await?)
    }

    /// Lists every result row of a task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the lookup fails.
    pub async fn results(&self, task_id: TaskId) -> CatalogResult<Vec<TaskResult>> {
        Ok(self.store.find_results(task_id).await?)
    }

    /// Returns the current result of a task.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the lookup fails.
    pub async fn current_result(&self, task_id: TaskId) -> CatalogResult<Option<TaskResult>> {
        Ok(self.store.find_current_result(task_id).await?)
    }

    /// Computes project progress statistics.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Store`] when the lookup fails.
    pub async fn progress(&self, project_id: ProjectId) -> CatalogResult<ProjectProgress> {
        Ok(self.store.project_progress(project_id).await?)
    }
}
