//! `PostgreSQL` task store implementation.

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::BigInt;

use super::errors::map_diesel_error;
use super::filter_sql::{SqlBind, filtered_cte};
use super::models::{CountRow, NewTaskRow, NewTaskRunRow, ProgressRow, ResultRow, TaskRow, TaskRunRow};
use super::rows::{result_from_row, task_from_row, task_run_from_row};
use super::schema::{result, task, task_run};
use super::unit::{PgCompletionUnit, delete_task_rows};
use crate::project::domain::ProjectId;
use crate::task::domain::{
    CompiledFilter, Contributor, Fingerprint, NewTask, NewTaskRun, Order, Page, ProjectProgress,
    Task, TaskId, TaskInfoUpdate, TaskResult, TaskRun, TaskRunId, TaskState,
};
use crate::task::ports::{
    CompletionUnit, DeletionCounts, TaskRunQuery, TaskStore, TaskStoreError, TaskStoreResult,
};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const TASK_COLUMNS: &str = "task.id, task.project_id, task.info, task.info_fingerprint, \
     task.priority_0, task.n_answers, task.state, task.exported, task.created";

const PROGRESS_SQL: &str = "SELECT \
     (SELECT COUNT(*) FROM task WHERE project_id = $1) AS n_tasks, \
     (SELECT COUNT(*) FROM task WHERE project_id = $1 AND state = 'completed') \
     AS n_completed_tasks, \
     (SELECT COUNT(*) FROM task_run WHERE project_id = $1) AS n_task_runs, \
     (SELECT COUNT(DISTINCT COALESCE('user:' || user_id::text, 'anon:' || anonymous_id)) \
     FROM task_run WHERE project_id = $1) AS n_contributors, \
     (SELECT MAX(finish_time) FROM task_run WHERE project_id = $1) AS last_activity";

/// `PostgreSQL`-backed task store.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: TaskPgPool,
}

impl PostgresTaskStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskStoreError::persistence)?
    }
}

fn to_count(value: i64) -> TaskStoreResult<u64> {
    u64::try_from(value).map_err(TaskStoreError::persistence)
}

fn page_bounds(page: Page) -> TaskStoreResult<(Option<i64>, i64)> {
    let offset = i64::try_from(page.offset()).map_err(TaskStoreError::persistence)?;
    Ok((page.limit().map(i64::from), offset))
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn create_task(&self, new_task: &NewTask) -> TaskStoreResult<Task> {
        let row = NewTaskRow {
            project_id: new_task.project_id().value(),
            info: new_task.info().clone(),
            info_fingerprint: new_task.fingerprint().as_str().to_owned(),
            priority_0: new_task.priority().value(),
            n_answers: i32::try_from(new_task.n_answers().value())
                .map_err(TaskStoreError::persistence)?,
            state: TaskState::Ongoing.as_str().to_owned(),
            exported: false,
            created: new_task.created_at(),
        };
        self.run_blocking(move |connection| {
            let stored = diesel::insert_into(task::table)
                .values(&row)
                .returning(TaskRow::as_returning())
                .get_result::<TaskRow>(connection)
                .map_err(map_diesel_error)?;
            task_from_row(stored)
        })
        .await
    }

    async fn update_task_info(
        &self,
        id: TaskId,
        update: &TaskInfoUpdate,
    ) -> TaskStoreResult<Task> {
        let info = update.info().clone();
        let fingerprint = update.fingerprint().as_str().to_owned();
        self.run_blocking(move |connection| {
            let stored = diesel::update(task::table.filter(task::id.eq(id.value())))
                .set((task::info.eq(info), task::info_fingerprint.eq(fingerprint)))
                .returning(TaskRow::as_returning())
                .get_result::<TaskRow>(connection)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or(TaskStoreError::NotFound(id))?;
            task_from_row(stored)
        })
        .await
    }

    async fn set_exported(&self, id: TaskId, exported: bool) -> TaskStoreResult<Task> {
        self.run_blocking(move |connection| {
            let stored = diesel::update(task::table.filter(task::id.eq(id.value())))
                .set(task::exported.eq(exported))
                .returning(TaskRow::as_returning())
                .get_result::<TaskRow>(connection)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or(TaskStoreError::NotFound(id))?;
            task_from_row(stored)
        })
        .await
    }

    async fn find_task(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        self.run_blocking(move |connection| {
            task::table
                .filter(task::id.eq(id.value()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(map_diesel_error)?
                .map(task_from_row)
                .transpose()
        })
        .await
    }

    async fn find_tasks(
        &self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        page: Page,
    ) -> TaskStoreResult<Vec<Task>> {
        let filter = filter.clone();
        let (limit, offset) = page_bounds(page)?;
        self.run_blocking(move |connection| {
            let mut rendered = filtered_cte(project_id.value(), &filter);
            rendered.sql(&format!(
                "SELECT {TASK_COLUMNS} FROM task WHERE task.id IN (SELECT id FROM filtered)"
            ));
            if let Some(after) = page.after_id() {
                let placeholder = rendered.param(SqlBind::BigInt(after));
                rendered.sql(&format!(" AND task.id > {placeholder}"));
            }
            rendered.sql(match page.order() {
                Order::IdAscending => " ORDER BY task.id",
                Order::CreatedDescending => " ORDER BY task.created DESC, task.id DESC",
            });
            if let Some(limit) = limit {
                let placeholder = rendered.param(SqlBind::BigInt(limit));
                rendered.sql(&format!(" LIMIT {placeholder}"));
            }
            let placeholder = rendered.param(SqlBind::BigInt(offset));
            rendered.sql(&format!(" OFFSET {placeholder}"));
            rendered
                .into_query()
                .load::<TaskRow>(connection)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(task_from_row)
                .collect()
        })
        .await
    }

    async fn count_tasks(
        &self,
        project_id: ProjectId,
        filter: &CompiledFilter,
    ) -> TaskStoreResult<u64> {
        let filter = filter.clone();
        self.run_blocking(move |connection| {
            let mut rendered = filtered_cte(project_id.value(), &filter);
            rendered.sql("SELECT COUNT(*) AS count FROM filtered");
            let row = rendered
                .into_query()
                .get_result::<CountRow>(connection)
                .map_err(map_diesel_error)?;
            to_count(row.count)
        })
        .await
    }

    async fn find_ongoing_by_fingerprint(
        &self,
        project_id: ProjectId,
        fingerprint: &Fingerprint,
    ) -> TaskStoreResult<Option<TaskId>> {
        let fingerprint = fingerprint.as_str().to_owned();
        self.run_blocking(move |connection| {
            let found = task::table
                .filter(task::project_id.eq(project_id.value()))
                .filter(task::state.eq(TaskState::Ongoing.as_str()))
                .filter(task::info_fingerprint.eq(fingerprint))
                .order(task::id.asc())
                .select(task::id)
                .first::<i64>(connection)
                .optional()
                .map_err(map_diesel_error)?;
            Ok(found.map(TaskId::new))
        })
        .await
    }

    async fn delete_task(
        &self,
        project_id: ProjectId,
        id: TaskId,
    ) -> TaskStoreResult<Option<DeletionCounts>> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskStoreError, _>(|tx| {
                let locked = task::table
                    .filter(task::id.eq(id.value()))
                    .filter(task::project_id.eq(project_id.value()))
                    .select(task::id)
                    .for_update()
                    .first::<i64>(tx)
                    .optional()
                    .map_err(map_diesel_error)?;
                match locked {
                    Some(locked) => delete_task_rows(tx, &[locked]).map(Some),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    async fn create_task_run(&self, run: &NewTaskRun) -> TaskStoreResult<TaskRun> {
        let task_id = run.task_id();
        let project_id = run.project_id();
        let row = NewTaskRunRow {
            project_id: project_id.value(),
            task_id: task_id.value(),
            user_id: run.contributor().user_id().map(|user| user.value()),
            anonymous_id: run.contributor().anonymous_id().map(str::to_owned),
            info: run.info().clone(),
            created: run.created_at(),
            finish_time: run.finish_time(),
        };
        self.run_blocking(move |connection| {
            let stored = diesel::insert_into(task_run::table)
                .values(&row)
                .returning(TaskRunRow::as_returning())
                .get_result::<TaskRunRow>(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        TaskStoreError::TaskNotInProject {
                            task_id,
                            project_id,
                        }
                    }
                    other => map_diesel_error(other),
                })?;
            task_run_from_row(stored)
        })
        .await
    }

    async fn find_task_run(&self, id: TaskRunId) -> TaskStoreResult<Option<TaskRun>> {
        self.run_blocking(move |connection| {
            task_run::table
                .filter(task_run::id.eq(id.value()))
                .select(TaskRunRow::as_select())
                .first::<TaskRunRow>(connection)
                .optional()
                .map_err(map_diesel_error)?
                .map(task_run_from_row)
                .transpose()
        })
        .await
    }

    async fn find_task_runs(
        &self,
        project_id: ProjectId,
        query: &TaskRunQuery,
    ) -> TaskStoreResult<Vec<TaskRun>> {
        let query = query.clone();
        let (limit, offset) = page_bounds(query.page)?;
        self.run_blocking(move |connection| {
            let mut statement = task_run::table
                .filter(task_run::project_id.eq(project_id.value()))
                .select(TaskRunRow::as_select())
                .into_boxed();
            if let Some(task_id) = query.task_id {
                statement = statement.filter(task_run::task_id.eq(task_id.value()));
            }
            statement = match query.contributor {
                Some(Contributor::User(user)) => {
                    statement.filter(task_run::user_id.eq(user.value()))
                }
                Some(Contributor::Anonymous(anonymous)) => {
                    statement.filter(task_run::anonymous_id.eq(anonymous))
                }
                None => statement,
            };
            if let Some(after) = query.page.after_id() {
                statement = statement.filter(task_run::id.gt(after));
            }
            statement = match query.page.order() {
                Order::IdAscending => statement.order(task_run::id.asc()),
                Order::CreatedDescending => {
                    statement.order((task_run::created.desc(), task_run::id.desc()))
                }
            };
            if let Some(limit) = limit {
                statement = statement.limit(limit);
            }
            statement
                .offset(offset)
                .load::<TaskRunRow>(connection)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(task_run_from_row)
                .collect()
        })
        .await
    }

    async fn count_task_runs(
        &self,
        project_id: ProjectId,
        task_id: Option<TaskId>,
    ) -> TaskStoreResult<u64> {
        self.run_blocking(move |connection| {
            let mut statement = task_run::table
                .filter(task_run::project_id.eq(project_id.value()))
                .into_boxed();
            if let Some(task_id) = task_id {
                statement = statement.filter(task_run::task_id.eq(task_id.value()));
            }
            let total = statement
                .count()
                .get_result::<i64>(connection)
                .map_err(map_diesel_error)?;
            to_count(total)
        })
        .await
    }

    async fn find_completed_task_runs(
        &self,
        project_id: ProjectId,
        exported: Option<bool>,
        page: Page,
    ) -> TaskStoreResult<Vec<TaskRun>> {
        let (limit, offset) = page_bounds(page)?;
        self.run_blocking(move |connection| {
            let mut statement = task_run::table
                .inner_join(task::table)
                .filter(task_run::project_id.eq(project_id.value()))
                .filter(task::state.eq(TaskState::Completed.as_str()))
                .select(TaskRunRow::as_select())
                .into_boxed();
            if let Some(exported) = exported {
                statement = statement.filter(task::exported.eq(exported));
            }
            if let Some(after) = page.after_id() {
                statement = statement.filter(task_run::id.gt(after));
            }
            statement = statement.order(task_run::id.asc());
            if let Some(limit) = limit {
                statement = statement.limit(limit);
            }
            statement
                .offset(offset)
                .load::<TaskRunRow>(connection)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(task_run_from_row)
                .collect()
        })
        .await
    }

    async fn delete_project_task_runs(&self, project_id: ProjectId) -> TaskStoreResult<u64> {
        self.run_blocking(move |connection| {
            let deleted =
                diesel::delete(task_run::table.filter(task_run::project_id.eq(project_id.value())))
                    .execute(connection)
                    .map_err(map_diesel_error)?;
            Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
        })
        .await
    }

    async fn find_results(&self, task_id: TaskId) -> TaskStoreResult<Vec<TaskResult>> {
        self.run_blocking(move |connection| {
            let rows = result::table
                .filter(result::task_id.eq(task_id.value()))
                .order(result::id.asc())
                .select(ResultRow::as_select())
                .load::<ResultRow>(connection)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(result_from_row).collect())
        })
        .await
    }

    async fn find_current_result(&self, task_id: TaskId) -> TaskStoreResult<Option<TaskResult>> {
        self.run_blocking(move |connection| {
            let row = result::table
                .filter(result::task_id.eq(task_id.value()))
                .filter(result::last_version.eq(true))
                .select(ResultRow::as_select())
                .first::<ResultRow>(connection)
                .optional()
                .map_err(map_diesel_error)?;
            Ok(row.map(result_from_row))
        })
        .await
    }

    async fn find_project_results(
        &self,
        project_id: ProjectId,
        current_only: bool,
        page: Page,
    ) -> TaskStoreResult<Vec<TaskResult>> {
        let (limit, offset) = page_bounds(page)?;
        self.run_blocking(move |connection| {
            let mut statement = result::table
                .filter(result::project_id.eq(project_id.value()))
                .select(ResultRow::as_select())
                .into_boxed();
            if current_only {
                statement = statement.filter(result::last_version.eq(true));
            }
            if let Some(after) = page.after_id() {
                statement = statement.filter(result::id.gt(after));
            }
            statement = statement.order(result::id.asc());
            if let Some(limit) = limit {
                statement = statement.limit(limit);
            }
            let rows = statement
                .offset(offset)
                .load::<ResultRow>(connection)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(result_from_row).collect())
        })
        .await
    }

    async fn project_progress(&self, project_id: ProjectId) -> TaskStoreResult<ProjectProgress> {
        self.run_blocking(move |connection| {
            let row = diesel::sql_query(PROGRESS_SQL)
                .bind::<BigInt, _>(project_id.value())
                .get_result::<ProgressRow>(connection)
                .map_err(map_diesel_error)?;
            Ok(ProjectProgress {
                n_tasks: to_count(row.n_tasks)?,
                n_completed_tasks: to_count(row.n_completed_tasks)?,
                n_task_runs: to_count(row.n_task_runs)?,
                n_contributors: to_count(row.n_contributors)?,
                last_activity: row.last_activity,
            })
        })
        .await
    }

    async fn transaction<F, T>(&self, work: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut dyn CompletionUnit) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskStoreError, _>(|tx| {
                let mut unit = PgCompletionUnit::new(tx);
                work(&mut unit)
            })
        })
        .await
    }
}
