//! Conversions between Diesel rows and domain values.

use super::models::{ResultRow, TallyRow, TaskRow, TaskRunRow};
use crate::project::domain::{ProjectId, UserId};
use crate::task::domain::{
    Contributor, Fingerprint, PersistedResultData, PersistedTaskData, PersistedTaskRunData,
    Priority, Redundancy, ResultId, Task, TaskId, TaskResult, TaskRun, TaskRunId, TaskState,
    TaskTally,
};
use crate::task::ports::{TaskStoreError, TaskStoreResult};

fn redundancy_from(value: i32) -> TaskStoreResult<Redundancy> {
    let value = u32::try_from(value).map_err(TaskStoreError::persistence)?;
    Redundancy::new(value).map_err(TaskStoreError::persistence)
}

fn state_from(value: &str) -> TaskStoreResult<TaskState> {
    TaskState::try_from(value).map_err(TaskStoreError::persistence)
}

fn run_ids_from(values: Vec<i64>) -> Vec<TaskRunId> {
    values.into_iter().map(TaskRunId::new).collect()
}

pub(super) fn task_from_row(row: TaskRow) -> TaskStoreResult<Task> {
    let TaskRow {
        id,
        project_id,
        info,
        info_fingerprint,
        priority_0,
        n_answers,
        state,
        exported,
        created,
    } = row;
    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::new(id),
        project_id: ProjectId::new(project_id),
        info,
        fingerprint: Fingerprint::from_persisted(info_fingerprint),
        priority: Priority::new(priority_0).map_err(TaskStoreError::persistence)?,
        n_answers: redundancy_from(n_answers)?,
        state: state_from(&state)?,
        exported,
        created_at: created,
    }))
}

pub(super) fn task_run_from_row(row: TaskRunRow) -> TaskStoreResult<TaskRun> {
    let TaskRunRow {
        id,
        project_id,
        task_id,
        user_id,
        anonymous_id,
        info,
        created,
        finish_time,
    } = row;
    let contributor = match (user_id, anonymous_id) {
        (Some(user), _) => Contributor::User(UserId::new(user)),
        (None, Some(anonymous)) => Contributor::Anonymous(anonymous),
        (None, None) => {
            return Err(TaskStoreError::persistence(std::io::Error::other(format!(
                "task run {id} has no contributor"
            ))));
        }
    };
    Ok(TaskRun::from_persisted(PersistedTaskRunData {
        id: TaskRunId::new(id),
        project_id: ProjectId::new(project_id),
        task_id: TaskId::new(task_id),
        contributor,
        info,
        created_at: created,
        finish_time,
    }))
}

pub(super) fn result_from_row(row: ResultRow) -> TaskResult {
    TaskResult::from_persisted(PersistedResultData {
        id: ResultId::new(row.id),
        project_id: ProjectId::new(row.project_id),
        task_id: TaskId::new(row.task_id),
        task_run_ids: run_ids_from(row.task_run_ids),
        last_version: row.last_version,
        created_at: row.created,
    })
}

pub(super) fn tally_from_row(row: TallyRow) -> TaskStoreResult<TaskTally> {
    Ok(TaskTally {
        task_id: TaskId::new(row.task_id),
        state: state_from(&row.state)?,
        n_answers: redundancy_from(row.n_answers)?,
        exported: row.exported,
        run_ids: run_ids_from(row.run_ids),
        current_result_runs: row.current_result_runs.map(run_ids_from),
    })
}
