//! Shared world state for redundancy lifecycle BDD scenarios.

use std::sync::Arc;

use crowdtally::project::domain::{ProjectId, UserId};
use crowdtally::task::{
    adapters::memory::{InMemoryTaskStore, RecordingCacheInvalidator},
    domain::{Contributor, Task, TaskRunId},
    services::{CompletionEngine, SubmitTaskRunRequest, TaskCatalogService},
};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::json;

/// Engine type used by the BDD world.
pub type TestEngine = CompletionEngine<InMemoryTaskStore, RecordingCacheInvalidator, DefaultClock>;

/// Catalog type used by the BDD world.
pub type TestCatalog =
    TaskCatalogService<InMemoryTaskStore, RecordingCacheInvalidator, DefaultClock>;

/// Scenario world for redundancy behaviour tests.
pub struct RedundancyWorld {
    pub project_id: ProjectId,
    pub engine: TestEngine,
    pub catalog: TestCatalog,
    pub task: Option<Task>,
    pub submitted_runs: Vec<TaskRunId>,
}

impl RedundancyWorld {
    /// Creates a world over an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let cache = Arc::new(RecordingCacheInvalidator::new());
        let clock = Arc::new(DefaultClock);
        Self {
            project_id: ProjectId::new(1),
            engine: CompletionEngine::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::clone(&clock),
            ),
            catalog: TaskCatalogService::new(store, cache, clock),
            task: None,
            submitted_runs: Vec::new(),
        }
    }

    /// Returns the scenario task as currently stored.
    pub fn reload_task(&self) -> Result<Task, eyre::Report> {
        let task = self
            .task
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))?;
        run_async(self.catalog.get_task(task.id()))
            .wrap_err("reload scenario task")?
            .ok_or_else(|| eyre::eyre!("scenario task disappeared"))
    }

    /// Submits one run from a fresh contributor.
    pub fn submit_run(&mut self) -> Result<(), eyre::Report> {
        let task_id = self
            .task
            .as_ref()
            .map(Task::id)
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))?;
        let contributor_number = i64::try_from(self.submitted_runs.len())? + 1;
        let submitted = run_async(self.engine.submit_task_run(SubmitTaskRunRequest::new(
            self.project_id,
            task_id,
            Contributor::User(UserId::new(contributor_number)),
            json!({"answer": contributor_number}),
        )))
        .wrap_err("submit task run")?;
        self.submitted_runs.push(submitted.run.id());
        Ok(())
    }
}

impl Default for RedundancyWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> RedundancyWorld {
    RedundancyWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
