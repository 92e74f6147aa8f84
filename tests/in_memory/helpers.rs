//! Shared wiring for the in-memory integration tests.

use crowdtally::project::adapters::memory::InMemoryProjectRepository;
use crowdtally::project::domain::{NewProject, Project, ProjectId, UserId};
use crowdtally::project::ports::ProjectRepository;
use crowdtally::task::adapters::memory::{InMemoryTaskStore, RecordingCacheInvalidator};
use crowdtally::task::adapters::storage::InMemoryFileStorage;
use crowdtally::task::domain::{CompletionOutcome, Contributor, TaskId};
use crowdtally::task::services::{
    CompletionEngine, SubmitTaskRunRequest, TaskCatalogService, TaskCleanupService,
};
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tokio::runtime::Runtime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Provides a tokio runtime for async operations in tests.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
#[fixture]
pub fn runtime() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Every service wired over shared in-memory adapters.
pub struct Platform {
    pub projects: Arc<InMemoryProjectRepository>,
    pub store: Arc<InMemoryTaskStore>,
    pub storage: Arc<InMemoryFileStorage>,
    pub cache: Arc<RecordingCacheInvalidator>,
    pub engine: CompletionEngine<InMemoryTaskStore, RecordingCacheInvalidator, DefaultClock>,
    pub catalog: TaskCatalogService<InMemoryTaskStore, RecordingCacheInvalidator, DefaultClock>,
    pub cleanup: TaskCleanupService<
        InMemoryTaskStore,
        InMemoryProjectRepository,
        InMemoryFileStorage,
        RecordingCacheInvalidator,
    >,
}

/// Provides a platform with no projects.
#[fixture]
pub fn platform() -> Platform {
    let projects = Arc::new(InMemoryProjectRepository::new());
    let store = Arc::new(InMemoryTaskStore::new());
    let storage = Arc::new(InMemoryFileStorage::new());
    let cache = Arc::new(RecordingCacheInvalidator::new());
    let clock = Arc::new(DefaultClock);
    Platform {
        engine: CompletionEngine::new(Arc::clone(&store), Arc::clone(&cache), Arc::clone(&clock)),
        catalog: TaskCatalogService::new(Arc::clone(&store), Arc::clone(&cache), clock),
        cleanup: TaskCleanupService::new(
            Arc::clone(&store),
            Arc::clone(&projects),
            Arc::clone(&storage),
            Arc::clone(&cache),
        ),
        projects,
        store,
        storage,
        cache,
    }
}

impl Platform {
    /// Registers a project owned by `owner`.
    pub async fn project(&self, short_name: &str, owner: i64) -> Result<Project, BoxError> {
        let new_project = NewProject::new(
            short_name,
            format!("{short_name} survey"),
            UserId::new(owner),
            &DefaultClock,
        )?;
        Ok(self.projects.create(&new_project).await?)
    }

    /// Submits an answer from registered user `user`.
    pub async fn answer(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        user: i64,
    ) -> Result<CompletionOutcome, BoxError> {
        let request = SubmitTaskRunRequest::new(
            project_id,
            task_id,
            Contributor::User(UserId::new(user)),
            json!({"answer": format!("from {user}")}),
        );
        Ok(self.engine.submit_task_run(request).await?.outcome)
    }
}
