//! Diesel row models for task persistence.

use super::schema::{result, task, task_run};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Array, BigInt, Bool, Integer, Nullable, Timestamptz, Varchar};
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = task)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Task payload.
    pub info: Value,
    /// Payload fingerprint.
    pub info_fingerprint: String,
    /// Scheduling priority.
    pub priority_0: f64,
    /// Redundancy target.
    pub n_answers: i32,
    /// Completion state.
    pub state: String,
    /// Export flag.
    pub exported: bool,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task)]
pub struct NewTaskRow {
    /// Owning project.
    pub project_id: i64,
    /// Task payload.
    pub info: Value,
    /// Payload fingerprint.
    pub info_fingerprint: String,
    /// Scheduling priority.
    pub priority_0: f64,
    /// Redundancy target.
    pub n_answers: i32,
    /// Completion state.
    pub state: String,
    /// Export flag.
    pub exported: bool,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

/// Query result row for task-run records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_run)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRunRow {
    /// Run identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Answered task.
    pub task_id: i64,
    /// Registered contributor.
    pub user_id: Option<i64>,
    /// Anonymous contributor.
    pub anonymous_id: Option<String>,
    /// Answer payload.
    pub info: Value,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Finish timestamp.
    pub finish_time: DateTime<Utc>,
}

/// Insert model for task-run records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_run)]
pub struct NewTaskRunRow {
    /// Owning project.
    pub project_id: i64,
    /// Answered task.
    pub task_id: i64,
    /// Registered contributor.
    pub user_id: Option<i64>,
    /// Anonymous contributor.
    pub anonymous_id: Option<String>,
    /// Answer payload.
    pub info: Value,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Finish timestamp.
    pub finish_time: DateTime<Utc>,
}

/// Query result row for result records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = result)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ResultRow {
    /// Result identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Completed task.
    pub task_id: i64,
    /// Referenced runs.
    pub task_run_ids: Vec<i64>,
    /// Current-row flag.
    pub last_version: bool,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

/// Insert model for result records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = result)]
pub struct NewResultRow {
    /// Owning project.
    pub project_id: i64,
    /// Completed task.
    pub task_id: i64,
    /// Referenced runs.
    pub task_run_ids: Vec<i64>,
    /// Current-row flag.
    pub last_version: bool,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

/// Per-task tally read inside completion transactions.
#[derive(Debug, Clone, QueryableByName)]
pub struct TallyRow {
    /// Task identifier.
    #[diesel(sql_type = BigInt)]
    pub task_id: i64,
    /// Completion state.
    #[diesel(sql_type = Varchar)]
    pub state: String,
    /// Redundancy target.
    #[diesel(sql_type = Integer)]
    pub n_answers: i32,
    /// Export flag.
    #[diesel(sql_type = Bool)]
    pub exported: bool,
    /// Stored runs, ascending.
    #[diesel(sql_type = Array<BigInt>)]
    pub run_ids: Vec<i64>,
    /// Runs referenced by the current result.
    #[diesel(sql_type = Nullable<Array<BigInt>>)]
    pub current_result_runs: Option<Vec<i64>>,
}

/// Single identifier column.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct IdRow {
    /// Identifier.
    #[diesel(sql_type = BigInt)]
    pub id: i64,
}

/// Single count column.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct CountRow {
    /// Count.
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

/// Project progress aggregates.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct ProgressRow {
    /// Stored tasks.
    #[diesel(sql_type = BigInt)]
    pub n_tasks: i64,
    /// Completed tasks.
    #[diesel(sql_type = BigInt)]
    pub n_completed_tasks: i64,
    /// Stored runs.
    #[diesel(sql_type = BigInt)]
    pub n_task_runs: i64,
    /// Distinct contributors.
    #[diesel(sql_type = BigInt)]
    pub n_contributors: i64,
    /// Latest finish time.
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub last_activity: Option<DateTime<Utc>>,
}
