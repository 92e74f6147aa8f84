//! Administrative command-line tool for crowdtally deployments.
//!
//! ```text
//! crowdtally-admin --config crowdtally.toml migrate
//! crowdtally-admin set-redundancy --project 7 --n-answers 5 --filter '{"state":"ongoing"}'
//! crowdtally-admin progress --project 7
//! ```
//!
//! Filters are JSON objects with the keys `task_id`, `priority_from`,
//! `priority_to`, `created_from`, `created_to`, `n_task_runs_from`,
//! `n_task_runs_to`, `finish_time_from`, `finish_time_to`,
//! `has_finish_time`, `state` and `text`.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use crowdtally::config::{ConfigError, CrowdtallyConfig};
use crowdtally::migrations;
use crowdtally::project::adapters::postgres::PostgresProjectRepository;
use crowdtally::project::domain::ProjectId;
use crowdtally::task::adapters::memory::NoopCacheInvalidator;
use crowdtally::task::adapters::postgres::{PostgresTaskStore, TaskPgPool};
use crowdtally::task::adapters::storage::LocalFileStorage;
use crowdtally::task::domain::{FilterParams, TaskFilter};
use crowdtally::task::ports::{FileStorageError, TaskStoreError};
use crowdtally::task::services::{
    CatalogError, CleanupError, CompletionEngine, CompletionError, DuplicateDetector,
    TaskCatalogService, TaskCleanupService,
};
use crowdtally::telemetry;
use mockable::DefaultClock;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// crowdtally-admin - maintenance commands for task distribution data
#[derive(Parser, Debug)]
#[command(name = "crowdtally-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "CROWDTALLY_CONFIG")]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Project selection plus an optional task filter.
#[derive(Args, Debug)]
struct Scope {
    /// Project identifier
    #[arg(long)]
    project: i64,

    /// Task filter as a JSON object
    #[arg(long, value_parser = parse_filter)]
    filter: Option<FilterParams>,
}

impl Scope {
    const fn project_id(&self) -> ProjectId {
        ProjectId::new(self.project)
    }

    fn task_filter(&self) -> TaskFilter {
        self.filter
            .clone()
            .map_or_else(TaskFilter::all, TaskFilter::from)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema
    Migrate,

    /// Set the redundancy target of matching tasks and re-evaluate them
    SetRedundancy {
        #[command(flatten)]
        scope: Scope,

        /// Required number of task runs, 1 to 1000
        #[arg(long)]
        n_answers: u32,
    },

    /// Set the priority of matching tasks, clamped to [0, 1]
    SetPriority {
        #[command(flatten)]
        scope: Scope,

        /// New priority
        #[arg(long, allow_negative_numbers = true)]
        priority: f64,
    },

    /// Delete matching tasks with their runs and results
    Reset {
        #[command(flatten)]
        scope: Scope,
    },

    /// Delete matching tasks; without --force, tasks with results are kept
    DeleteTasks {
        #[command(flatten)]
        scope: Scope,

        /// Also delete tasks that have results
        #[arg(long)]
        force: bool,
    },

    /// Print project progress statistics
    Progress {
        /// Project identifier
        #[arg(long)]
        project: i64,
    },

    /// Print the ongoing task carrying the given payload, if any
    FindDuplicate {
        /// Project identifier
        #[arg(long)]
        project: i64,

        /// Task payload as JSON
        #[arg(long, value_parser = parse_json)]
        info: serde_json::Value,
    },
}

#[derive(Debug, Error)]
enum AdminError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    #[error(transparent)]
    Storage(#[from] FileStorageError),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("failed to write output: {0}")]
    Output(String),
}

fn parse_filter(raw: &str) -> Result<FilterParams, String> {
    serde_json::from_str(raw).map_err(|err| format!("invalid filter: {err}"))
}

fn parse_json(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {err}"))
}

fn emit(value: &impl Serialize) -> Result<(), AdminError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| AdminError::Output(err.to_string()))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(|err| AdminError::Output(err.to_string()))
}

type Engine = CompletionEngine<PostgresTaskStore, NoopCacheInvalidator, DefaultClock>;

struct Services {
    store: Arc<PostgresTaskStore>,
    engine: Engine,
    catalog: TaskCatalogService<PostgresTaskStore, NoopCacheInvalidator, DefaultClock>,
    cleanup: TaskCleanupService<
        PostgresTaskStore,
        PostgresProjectRepository,
        LocalFileStorage,
        NoopCacheInvalidator,
    >,
}

impl Services {
    fn build(config: &CrowdtallyConfig, pool: TaskPgPool) -> Result<Self, AdminError> {
        let store = Arc::new(PostgresTaskStore::new(pool.clone()));
        let projects = Arc::new(PostgresProjectRepository::new(pool));
        let storage = Arc::new(LocalFileStorage::open(&config.storage.root)?);
        let cache = Arc::new(NoopCacheInvalidator);
        let clock = Arc::new(DefaultClock);
        Ok(Self {
            engine: CompletionEngine::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::clone(&clock),
            ),
            catalog: TaskCatalogService::new(Arc::clone(&store), Arc::clone(&cache), clock)
                .with_defaults(config.tasks),
            cleanup: TaskCleanupService::new(Arc::clone(&store), projects, storage, cache),
            store,
        })
    }
}

async fn migrate(pool: TaskPgPool) -> Result<(), AdminError> {
    tokio::task::spawn_blocking(move || {
        let mut connection = pool
            .get()
            .map_err(|err| AdminError::Migration(err.to_string()))?;
        migrations::run(&mut connection).map_err(|err| AdminError::Migration(err.to_string()))
    })
    .await
    .map_err(|err| AdminError::Migration(err.to_string()))?
}

async fn dispatch(command: &Command, services: &Services) -> Result<(), AdminError> {
    match command {
        Command::Migrate => Ok(()),
        Command::SetRedundancy { scope, n_answers } => {
            let summary = services
                .engine
                .reevaluate_completion(scope.project_id(), *n_answers, &scope.task_filter())
                .await?;
            emit(&summary)
        }
        Command::SetPriority { scope, priority } => {
            let updated = services
                .engine
                .update_priority(scope.project_id(), *priority, &scope.task_filter())
                .await?;
            emit(&serde_json::json!({ "updated": updated }))
        }
        Command::Reset { scope } => {
            let counts = services
                .cleanup
                .force_reset(scope.project_id(), &scope.task_filter())
                .await?;
            emit(&serde_json::json!({
                "tasks": counts.tasks,
                "task_runs": counts.task_runs,
                "results": counts.results,
            }))
        }
        Command::DeleteTasks { scope, force } => {
            let counts = services
                .cleanup
                .delete_tasks(scope.project_id(), &scope.task_filter(), *force)
                .await?;
            emit(&serde_json::json!({
                "tasks": counts.tasks,
                "task_runs": counts.task_runs,
                "results": counts.results,
            }))
        }
        Command::Progress { project } => {
            let progress = services.catalog.progress(ProjectId::new(*project)).await?;
            emit(&serde_json::json!({
                "n_tasks": progress.n_tasks,
                "n_completed_tasks": progress.n_completed_tasks,
                "n_task_runs": progress.n_task_runs,
                "n_contributors": progress.n_contributors,
                "last_activity": progress.last_activity,
                "percent_complete": progress.percent_complete(),
            }))
        }
        Command::FindDuplicate { project, info } => {
            let detector = DuplicateDetector::new(Arc::clone(&services.store));
            let found = detector
                .find_duplicate(ProjectId::new(*project), info)
                .await?;
            emit(&serde_json::json!({ "task_id": found.map(|id| id.value()) }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AdminError> {
    telemetry::init_tracing();
    let cli = Cli::parse();
    let config = CrowdtallyConfig::load(cli.config.as_deref())?;
    let pool = config.build_pool()?;

    if matches!(cli.command, Command::Migrate) {
        migrate(pool).await?;
        info!("schema created");
        return Ok(());
    }

    let services = Services::build(&config, pool)?;
    dispatch(&cli.command, &services).await
}
