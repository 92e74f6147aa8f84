//! Template database and store fixtures for `PostgreSQL` tests.

use super::cluster::{BoxError, PostgresCluster, TemporaryDatabase};
use crowdtally::project::adapters::postgres::PostgresProjectRepository;
use crowdtally::project::domain::{NewProject, Project, UserId};
use crowdtally::project::ports::ProjectRepository;
use crowdtally::task::adapters::memory::RecordingCacheInvalidator;
use crowdtally::task::adapters::postgres::{PostgresTaskStore, TaskPgPool};
use crowdtally::task::domain::{CompletionOutcome, Contributor, Task, TaskId};
use crowdtally::task::services::{
    CompletionEngine, CreateTaskRequest, SubmitTaskRunRequest, TaskCatalogService,
};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::Connection;
use mockable::DefaultClock;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// Template database holding the migrated schema.
pub const TEMPLATE_DB: &str = "crowdtally_test_template";

/// Engine type used across the suite.
pub type PgEngine = CompletionEngine<PostgresTaskStore, RecordingCacheInvalidator, DefaultClock>;

/// Catalog type used across the suite.
pub type PgCatalog = TaskCatalogService<PostgresTaskStore, RecordingCacheInvalidator, DefaultClock>;

/// Creates the migrated template once per cluster.
pub fn ensure_template(cluster: PostgresCluster) -> Result<(), BoxError> {
    cluster.ensure_template_exists(TEMPLATE_DB, |url| {
        let mut connection = PgConnection::establish(url)?;
        crowdtally::migrations::run(&mut connection)?;
        Ok(())
    })
}

/// A migrated scratch database with services wired over it.
pub struct StoreWorld {
    pub store: Arc<PostgresTaskStore>,
    pub projects: Arc<PostgresProjectRepository>,
    pub cache: Arc<RecordingCacheInvalidator>,
    pub engine: PgEngine,
    pub catalog: PgCatalog,
    pub project: Project,
    _database: TemporaryDatabase,
}

impl StoreWorld {
    /// Clones the template into a fresh database and creates one project.
    pub async fn setup(cluster: PostgresCluster) -> Result<Self, BoxError> {
        ensure_template(cluster)?;
        let name = format!("crowdtally_test_{}", Uuid::new_v4().simple());
        let database = cluster.temporary_database_from_template(&name, TEMPLATE_DB)?;
        let pool: TaskPgPool = Pool::builder()
            .max_size(8)
            .build(ConnectionManager::<PgConnection>::new(database.url()))?;

        let store = Arc::new(PostgresTaskStore::new(pool.clone()));
        let projects = Arc::new(PostgresProjectRepository::new(pool));
        let cache = Arc::new(RecordingCacheInvalidator::new());
        let clock = Arc::new(DefaultClock);
        let project = projects
            .create(&NewProject::new(
                "birds",
                "Bird survey",
                UserId::new(42),
                &DefaultClock,
            )?)
            .await?;

        Ok(Self {
            engine: CompletionEngine::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::clone(&clock),
            ),
            catalog: TaskCatalogService::new(Arc::clone(&store), Arc::clone(&cache), clock),
            store,
            projects,
            cache,
            project,
            _database: database,
        })
    }

    /// Creates another project owned by the same user.
    pub async fn other_project(&self) -> Result<Project, BoxError> {
        let project = self
            .projects
            .create(&NewProject::new(
                "bugs",
                "Insect survey",
                UserId::new(42),
                &DefaultClock,
            )?)
            .await?;
        Ok(project)
    }

    /// Creates a task of the main project.
    pub async fn task(&self, info: Value, n_answers: u32) -> Result<Task, BoxError> {
        let request =
            CreateTaskRequest::new(self.project.id(), info).with_redundancy(n_answers);
        Ok(self.catalog.create_task(request).await?)
    }

    /// Submits a run from registered user `user`.
    pub async fn submit(
        &self,
        task_id: TaskId,
        user: i64,
    ) -> Result<CompletionOutcome, BoxError> {
        let request = SubmitTaskRunRequest::new(
            self.project.id(),
            task_id,
            Contributor::User(UserId::new(user)),
            json!({"answer": "sparrow"}),
        );
        Ok(self.engine.submit_task_run(request).await?.outcome)
    }

    /// Reloads a task that must exist.
    pub async fn reload(&self, task_id: TaskId) -> Result<Task, BoxError> {
        self.catalog
            .get_task(task_id)
            .await?
            .ok_or_else(|| format!("task {task_id} vanished").into())
    }
}
