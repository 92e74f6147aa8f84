//! Completion transaction unit over a `PostgreSQL` connection.
//!
//! Selections lock task rows with `FOR UPDATE` in ascending id order before
//! reading tallies, so concurrent re-evaluations of the same task serialise
//! on the row lock. The partial unique index `idx_result_current_per_task`
//! backs the one-current-result rule.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Array, BigInt};

use super::errors::map_diesel_error;
use super::filter_sql::filtered_cte;
use super::models::{IdRow, NewResultRow, ResultRow, TallyRow};
use super::rows::{result_from_row, tally_from_row};
use super::schema::{result, task, task_run};
use crate::project::domain::ProjectId;
use crate::task::domain::{
    CompiledFilter, NewTaskResult, Priority, Redundancy, TaskId, TaskResult, TaskState, TaskTally,
};
use crate::task::ports::{CompletionUnit, DeletionCounts, TaskStoreError, TaskStoreResult};

const CURRENT_RESULT_INDEX: &str = "idx_result_current_per_task";

const TALLY_SQL: &str = "SELECT task.id AS task_id, task.state, task.n_answers, task.exported, \
     COALESCE((SELECT array_agg(task_run.id ORDER BY task_run.id) FROM task_run \
     WHERE task_run.task_id = task.id), '{}'::BIGINT[]) AS run_ids, \
     (SELECT result.task_run_ids FROM result \
     WHERE result.task_id = task.id AND result.last_version) AS current_result_runs \
     FROM task WHERE task.id = ANY($1) ORDER BY task.id";

/// Transaction-scoped unit used by the completion engine.
pub(super) struct PgCompletionUnit<'conn> {
    connection: &'conn mut PgConnection,
}

impl<'conn> PgCompletionUnit<'conn> {
    pub(super) const fn new(connection: &'conn mut PgConnection) -> Self {
        Self { connection }
    }
}

fn raw_ids(ids: &[TaskId]) -> Vec<i64> {
    ids.iter().map(|id| id.value()).collect()
}

fn affected(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

/// Locks the project's tasks matching `filter` and returns their ids.
pub(super) fn lock_filtered_ids(
    connection: &mut PgConnection,
    project_id: ProjectId,
    filter: &CompiledFilter,
) -> TaskStoreResult<Vec<i64>> {
    let mut rendered = filtered_cte(project_id.value(), filter);
    rendered.sql(
        "SELECT task.id FROM task WHERE task.id IN (SELECT id FROM filtered) \
         ORDER BY task.id FOR UPDATE",
    );
    let rows = rendered
        .into_query()
        .load::<IdRow>(connection)
        .map_err(map_diesel_error)?;
    Ok(rows.into_iter().map(|row| row.id).collect())
}

fn read_tallies(connection: &mut PgConnection, ids: Vec<i64>) -> TaskStoreResult<Vec<TaskTally>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    diesel::sql_query(TALLY_SQL)
        .bind::<Array<BigInt>, _>(ids)
        .load::<TallyRow>(connection)
        .map_err(map_diesel_error)?
        .into_iter()
        .map(tally_from_row)
        .collect()
}

/// Deletes results, runs and tasks for `ids` in dependency order.
pub(super) fn delete_task_rows(
    connection: &mut PgConnection,
    ids: &[i64],
) -> TaskStoreResult<DeletionCounts> {
    if ids.is_empty() {
        return Ok(DeletionCounts::default());
    }
    let results = diesel::delete(result::table.filter(result::task_id.eq_any(ids)))
        .execute(connection)
        .map_err(map_diesel_error)?;
    let task_runs = diesel::delete(task_run::table.filter(task_run::task_id.eq_any(ids)))
        .execute(connection)
        .map_err(map_diesel_error)?;
    let tasks = diesel::delete(task::table.filter(task::id.eq_any(ids)))
        .execute(connection)
        .map_err(map_diesel_error)?;
    Ok(DeletionCounts {
        tasks: affected(tasks),
        task_runs: affected(task_runs),
        results: affected(results),
    })
}

impl CompletionUnit for PgCompletionUnit<'_> {
    fn lock_task(&mut self, id: TaskId) -> TaskStoreResult<Option<TaskTally>> {
        let locked = task::table
            .filter(task::id.eq(id.value()))
            .select(task::id)
            .for_update()
            .first::<i64>(self.connection)
            .optional()
            .map_err(map_diesel_error)?;
        let Some(locked) = locked else {
            return Ok(None);
        };
        Ok(read_tallies(self.connection, vec![locked])?.into_iter().next())
    }

    fn lock_tasks(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
    ) -> TaskStoreResult<Vec<TaskTally>> {
        let ids = lock_filtered_ids(self.connection, project_id, filter)?;
        read_tallies(self.connection, ids)
    }

    fn reset_exported(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64> {
        diesel::update(task::table.filter(task::id.eq_any(raw_ids(ids))))
            .set(task::exported.eq(false))
            .execute(self.connection)
            .map(affected)
            .map_err(map_diesel_error)
    }

    fn set_redundancy(&mut self, ids: &[TaskId], n_answers: Redundancy) -> TaskStoreResult<u64> {
        let target = i32::try_from(n_answers.value()).map_err(TaskStoreError::persistence)?;
        diesel::update(task::table.filter(task::id.eq_any(raw_ids(ids))))
            .set(task::n_answers.eq(target))
            .execute(self.connection)
            .map(affected)
            .map_err(map_diesel_error)
    }

    fn set_state(&mut self, ids: &[TaskId], state: TaskState) -> TaskStoreResult<u64> {
        diesel::update(task::table.filter(task::id.eq_any(raw_ids(ids))))
            .set(task::state.eq(state.as_str()))
            .execute(self.connection)
            .map(affected)
            .map_err(map_diesel_error)
    }

    fn supersede_current_results(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64> {
        diesel::update(
            result::table
                .filter(result::task_id.eq_any(raw_ids(ids)))
                .filter(result::last_version.eq(true)),
        )
        .set(result::last_version.eq(false))
        .execute(self.connection)
        .map(affected)
        .map_err(map_diesel_error)
    }

    fn insert_result(&mut self, new_result: &NewTaskResult) -> TaskStoreResult<TaskResult> {
        let task_id = new_result.task_id;
        let row = NewResultRow {
            project_id: new_result.project_id.value(),
            task_id: task_id.value(),
            task_run_ids: new_result
                .task_run_ids
                .iter()
                .map(|run| run.value())
                .collect(),
            last_version: true,
            created: new_result.created_at,
        };
        let stored = diesel::insert_into(result::table)
            .values(&row)
            .returning(ResultRow::as_returning())
            .get_result::<ResultRow>(self.connection)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                    if info.constraint_name() == Some(CURRENT_RESULT_INDEX) =>
                {
                    TaskStoreError::DuplicateCurrentResult(task_id)
                }
                other => map_diesel_error(other),
            })?;
        Ok(result_from_row(stored))
    }

    fn delete_current_results(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64> {
        diesel::delete(
            result::table
                .filter(result::task_id.eq_any(raw_ids(ids)))
                .filter(result::last_version.eq(true)),
        )
        .execute(self.connection)
        .map(affected)
        .map_err(map_diesel_error)
    }

    fn set_priority(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        priority: Priority,
    ) -> TaskStoreResult<u64> {
        let ids = lock_filtered_ids(self.connection, project_id, filter)?;
        diesel::update(task::table.filter(task::id.eq_any(ids)))
            .set(task::priority_0.eq(priority.value()))
            .execute(self.connection)
            .map(affected)
            .map_err(map_diesel_error)
    }

    fn delete_tasks(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        force: bool,
    ) -> TaskStoreResult<DeletionCounts> {
        let mut ids = lock_filtered_ids(self.connection, project_id, filter)?;
        if !force && !ids.is_empty() {
            let with_results: Vec<i64> = result::table
                .filter(result::task_id.eq_any(&ids))
                .select(result::task_id)
                .distinct()
                .load(self.connection)
                .map_err(map_diesel_error)?;
            ids.retain(|id| !with_results.contains(id));
        }
        delete_task_rows(self.connection, &ids)
    }
}
