//! Deletion paths with cache signalling and export artifact cleanup.

use super::{ExportArtifacts, notify_project, notify_reset};
use crate::project::domain::ProjectId;
use crate::project::ports::ProjectRepository;
use crate::task::domain::{TaskDomainError, TaskFilter, TaskId};
use crate::task::ports::{
    CacheInvalidator, DeletionCounts, FileStorage, TaskStore, TaskStoreError,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Service-level errors for deletions.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// The filter was malformed; nothing was deleted.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The store rejected the deletion and rolled it back.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for deletions.
pub type CleanupResult<T> = Result<T, CleanupError>;

/// Deletes tasks, runs and results.
///
/// Every committed deletion invalidates the project cache, requests a cache
/// reset and purges the project's export artifacts. Artifact removal is best
/// effort and never fails the deletion.
#[derive(Clone)]
pub struct TaskCleanupService<S, P, F, K>
where
    S: TaskStore,
    P: ProjectRepository,
    F: FileStorage,
    K: CacheInvalidator,
{
    store: Arc<S>,
    projects: Arc<P>,
    artifacts: ExportArtifacts<F>,
    cache: Arc<K>,
}

impl<S, P, F, K> TaskCleanupService<S, P, F, K>
where
    S: TaskStore,
    P: ProjectRepository,
    F: FileStorage,
    K: CacheInvalidator,
{
    /// Creates a new cleanup service.
    #[must_use]
    pub const fn new(store: Arc<S>, projects: Arc<P>, storage: Arc<F>, cache: Arc<K>) -> Self {
        Self {
            store,
            projects,
            artifacts: ExportArtifacts::new(storage),
            cache,
        }
    }

    /// Deletes one task with its runs and results. Returns `None` when the
    /// task is not part of the project.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Store`] when the deletion fails.
    pub async fn delete_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> CleanupResult<Option<DeletionCounts>> {
        let deleted = self.store.delete_task(project_id, task_id).await?;
        if let Some(counts) = deleted {
            info!(
                %project_id,
                %task_id,
                task_runs = counts.task_runs,
                results = counts.results,
                "task deleted"
            );
            self.after_deletion(project_id).await;
        }
        Ok(deleted)
    }

    /// Deletes the project's tasks matching `filter`. Without `force`,
    /// tasks that have any result row are kept.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Domain`] for a malformed filter and
    /// [`CleanupError::Store`] when the transaction fails.
    pub async fn delete_tasks(
        &self,
        project_id: ProjectId,
        filter: &TaskFilter,
        force: bool,
    ) -> CleanupResult<DeletionCounts> {
        let compiled = filter.compile()?;
        let counts = self
            .store
            .transaction(move |unit| unit.delete_tasks(project_id, &compiled, force))
            .await?;
        info!(
            %project_id,
            force,
            tasks = counts.tasks,
            task_runs = counts.task_runs,
            results = counts.results,
            "tasks deleted"
        );
        self.after_deletion(project_id).await;
        Ok(counts)
    }

    /// Deletes every task matching `filter` together with its runs and
    /// results, whether or not it completed.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError`] under the same conditions as
    /// [`Self::delete_tasks`].
    pub async fn force_reset(
        &self,
        project_id: ProjectId,
        filter: &TaskFilter,
    ) -> CleanupResult<DeletionCounts> {
        self.delete_tasks(project_id, filter, true).await
    }

    /// Deletes every run of the project. Tasks and results stay.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Store`] when the deletion fails.
    pub async fn delete_project_task_runs(&self, project_id: ProjectId) -> CleanupResult<u64> {
        let deleted = self.store.delete_project_task_runs(project_id).await?;
        info!(%project_id, task_runs = deleted, "project task runs deleted");
        self.after_deletion(project_id).await;
        Ok(deleted)
    }

    async fn after_deletion(&self, project_id: ProjectId) {
        notify_project(&*self.cache, project_id).await;
        notify_reset(&*self.cache).await;
        self.purge_artifacts(project_id).await;
    }

    async fn purge_artifacts(&self, project_id: ProjectId) {
        match self.projects.find_by_id(project_id).await {
            Ok(Some(project)) => {
                self.artifacts.purge(&project).await;
            }
            Ok(None) => warn!(%project_id, "project not found; export artifacts left in place"),
            Err(err) => warn!(
                %project_id,
                error = %err,
                "project lookup failed; export artifacts left in place"
            ),
        }
    }
}
