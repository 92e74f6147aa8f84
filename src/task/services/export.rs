//! Export artifact naming, publication and batched row sources.

use crate::project::domain::{Project, ProjectId};
use crate::task::domain::{CompiledFilter, Page, Task, TaskDomainError, TaskResult, TaskRun};
use crate::task::ports::{
    FileStorage, FileStorageResult, StorageContainer, TaskRunQuery, TaskStore, TaskStoreError,
    TaskStoreResult,
};
use futures::stream::{self, Stream};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Table an export artifact was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportTable {
    /// Task payloads.
    Task,
    /// Contributor answers.
    TaskRun,
    /// Completion results.
    Result,
}

impl ExportTable {
    /// Every exportable table.
    pub const ALL: [Self; 3] = [Self::Task, Self::TaskRun, Self::Result];

    /// Returns the table name used in artifact names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::TaskRun => "task_run",
            Self::Result => "result",
        }
    }
}

/// Serialisation format of an export artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Comma-separated values.
    Csv,
    /// JSON documents.
    Json,
}

impl ExportFormat {
    /// Every supported format.
    pub const ALL: [Self; 2] = [Self::Csv, Self::Json];

    /// Returns the format name used in artifact names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Publishes and removes a project's zipped export artifacts.
///
/// Artifacts live in the owner's container under deterministic names, so a
/// purge never needs to list the container.
#[derive(Clone)]
pub struct ExportArtifacts<F>
where
    F: FileStorage,
{
    storage: Arc<F>,
}

impl<F> ExportArtifacts<F>
where
    F: FileStorage,
{
    /// Creates the artifact manager over `storage`.
    #[must_use]
    pub const fn new(storage: Arc<F>) -> Self {
        Self { storage }
    }

    /// Returns `<project_id>_<short_name>_<table>_<format>.zip`.
    #[must_use]
    pub fn download_name(project: &Project, table: ExportTable, format: ExportFormat) -> String {
        format!(
            "{}_{}_{}_{}.zip",
            project.id(),
            project.short_name().as_str(),
            table.as_str(),
            format.as_str()
        )
    }

    /// Uploads a freshly built artifact and returns its name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::task::ports::FileStorageError`] when the upload
    /// fails.
    pub async fn publish(
        &self,
        project: &Project,
        table: ExportTable,
        format: ExportFormat,
        bytes: Vec<u8>,
    ) -> FileStorageResult<String> {
        let container = StorageContainer::for_owner(project.owner_id());
        let name = Self::download_name(project, table, format);
        self.storage.upload_file(&container, &name, bytes).await?;
        debug!(project_id = %project.id(), %container, %name, "export artifact published");
        Ok(name)
    }

    /// Removes every export artifact of `project` and returns how many
    /// existed. Failures are logged and skipped.
    pub async fn purge(&self, project: &Project) -> usize {
        let container = StorageContainer::for_owner(project.owner_id());
        let mut removed = 0;
        for table in ExportTable::ALL {
            for format in ExportFormat::ALL {
                let name = Self::download_name(project, table, format);
                match self.storage.delete_file(&container, &name).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(
                            project_id = %project.id(),
                            %container,
                            %name,
                            error = %err,
                            "failed to remove export artifact"
                        );
                    }
                }
            }
        }
        removed
    }
}

/// Streams project rows in fixed-size batches using keyset pagination.
#[derive(Clone)]
pub struct ExportRowSource<S>
where
    S: TaskStore,
{
    store: Arc<S>,
    batch: Page,
}

impl<S> ExportRowSource<S>
where
    S: TaskStore + 'static,
{
    /// Creates a source reading `batch_size` rows per query.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ZeroPageLimit`] when `batch_size` is zero.
    pub fn new(store: Arc<S>, batch_size: u32) -> Result<Self, TaskDomainError> {
        Ok(Self {
            store,
            batch: Page::first(batch_size)?,
        })
    }

    /// Streams every task of the project in ascending id order.
    #[must_use]
    pub fn tasks(
        &self,
        project_id: ProjectId,
    ) -> impl Stream<Item = TaskStoreResult<Vec<Task>>> + Send + 'static {
        let store = Arc::clone(&self.store);
        batches(
            self.batch,
            move |page| {
                let store = Arc::clone(&store);
                async move {
                    let filter = CompiledFilter::all();
                    store.find_tasks(project_id, &filter, page).await
                }
            },
            |task: &Task| task.id().value(),
        )
    }

    /// Streams every run of the project in ascending id order.
    #[must_use]
    pub fn task_runs(
        &self,
        project_id: ProjectId,
    ) -> impl Stream<Item = TaskStoreResult<Vec<TaskRun>>> + Send + 'static {
        let store = Arc::clone(&self.store);
        batches(
            self.batch,
            move |page| {
                let store = Arc::clone(&store);
                async move {
                    let query = TaskRunQuery::all().with_page(page);
                    store.find_task_runs(project_id, &query).await
                }
            },
            |run: &TaskRun| run.id().value(),
        )
    }

    /// Streams runs of completed tasks, optionally restricted by the task
    /// export flag.
    #[must_use]
    pub fn completed_task_runs(
        &self,
        project_id: ProjectId,
        exported: Option<bool>,
    ) -> impl Stream<Item = TaskStoreResult<Vec<TaskRun>>> + Send + 'static {
        let store = Arc::clone(&self.store);
        batches(
            self.batch,
            move |page| {
                let store = Arc::clone(&store);
                async move {
                    store
                        .find_completed_task_runs(project_id, exported, page)
                        .await
                }
            },
            |run: &TaskRun| run.id().value(),
        )
    }

    /// Streams the current result of every completed task.
    #[must_use]
    pub fn current_results(
        &self,
        project_id: ProjectId,
    ) -> impl Stream<Item = TaskStoreResult<Vec<TaskResult>>> + Send + 'static {
        let store = Arc::clone(&self.store);
        batches(
            self.batch,
            move |page| {
                let store = Arc::clone(&store);
                async move { store.find_project_results(project_id, true, page).await }
            },
            |result: &TaskResult| result.id().value(),
        )
    }
}

fn batches<T, Fetch, Fut>(
    batch: Page,
    fetch: Fetch,
    id_of: fn(&T) -> i64,
) -> impl Stream<Item = TaskStoreResult<Vec<T>>> + Send + 'static
where
    T: Send + 'static,
    Fetch: Fn(Page) -> Fut + Send + 'static,
    Fut: Future<Output = TaskStoreResult<Vec<T>>> + Send + 'static,
{
    let limit = batch
        .limit()
        .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
    stream::try_unfold(Some(batch), move |cursor| {
        let pending = cursor.map(&fetch);
        async move {
            let Some(pending) = pending else {
                return Ok(None);
            };
            let rows = pending.await?;
            let Some(last) = rows.last() else {
                return Ok(None);
            };
            let next = (rows.len() >= limit).then(|| batch.after(id_of(last)));
            Ok::<_, TaskStoreError>(Some((rows, next)))
        }
    })
}
