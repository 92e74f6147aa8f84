//! In-memory task store for tests and embedded use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::project::domain::ProjectId;
use crate::task::{
    domain::{
        CompiledFilter, Fingerprint, NewTask, NewTaskResult, NewTaskRun, Order, Page, Priority,
        ProjectProgress, Redundancy, ResultId, Task, TaskFacts, TaskId, TaskInfoUpdate,
        TaskResult, TaskRun, TaskRunId, TaskState, TaskTally,
    },
    ports::{
        CompletionUnit, DeletionCounts, TaskRunQuery, TaskStore, TaskStoreError, TaskStoreResult,
    },
};

/// Thread-safe in-memory task store.
///
/// A transaction holds the write lock, works on a copy of the state and
/// swaps it in only when the work succeeds.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Clone, Default)]
struct InMemoryTaskState {
    last_task_id: i64,
    last_run_id: i64,
    last_result_id: i64,
    tasks: BTreeMap<TaskId, Task>,
    runs: BTreeMap<TaskRunId, TaskRun>,
    results: BTreeMap<ResultId, TaskResult>,
}

impl InMemoryTaskStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&InMemoryTaskState) -> T) -> TaskStoreResult<T> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(f(&state))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut InMemoryTaskState) -> TaskStoreResult<T>,
    ) -> TaskStoreResult<T> {
        let mut state = self.state.write().map_err(lock_error)?;
        let mut draft = state.clone();
        let value = f(&mut draft)?;
        *state = draft;
        Ok(value)
    }
}

fn lock_error(err: impl std::fmt::Display) -> TaskStoreError {
    TaskStoreError::persistence(std::io::Error::other(err.to_string()))
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

impl InMemoryTaskState {
    fn run_ids_of(&self, task_id: TaskId) -> Vec<TaskRunId> {
        self.runs
            .values()
            .filter(|run| run.task_id() == task_id)
            .map(TaskRun::id)
            .collect()
    }

    fn finish_time_of(&self, task_id: TaskId) -> Option<DateTime<Utc>> {
        self.runs
            .values()
            .filter(|run| run.task_id() == task_id)
            .map(TaskRun::finish_time)
            .max()
    }

    fn current_result_of(&self, task_id: TaskId) -> Option<&TaskResult> {
        self.results
            .values()
            .find(|result| result.task_id() == task_id && result.last_version())
    }

    fn matches(&self, task: &Task, filter: &CompiledFilter) -> bool {
        if filter.is_empty() {
            return true;
        }
        let facts = TaskFacts {
            id: task.id(),
            priority: task.priority(),
            created_at: task.created_at(),
            run_count: self.run_ids_of(task.id()).len(),
            finish_time: self.finish_time_of(task.id()),
            state: task.state(),
            info: task.info(),
        };
        filter.matches(&facts)
    }

    fn matching_ids(&self, project_id: ProjectId, filter: &CompiledFilter) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|task| task.project_id() == project_id && self.matches(task, filter))
            .map(Task::id)
            .collect()
    }

    fn tally(&self, task: &Task) -> TaskTally {
        TaskTally {
            task_id: task.id(),
            state: task.state(),
            n_answers: task.n_answers(),
            exported: task.exported(),
            run_ids: self.run_ids_of(task.id()),
            current_result_runs: self
                .current_result_of(task.id())
                .map(|result| result.task_run_ids().to_vec()),
        }
    }

    fn update_tasks(&mut self, ids: &[TaskId], mut apply: impl FnMut(&mut Task)) -> u64 {
        let mut updated = 0;
        for id in ids {
            if let Some(task) = self.tasks.get_mut(id) {
                apply(task);
                updated += 1;
            }
        }
        updated
    }

    fn remove_tasks(&mut self, ids: &HashSet<TaskId>) -> DeletionCounts {
        let results_before = self.results.len();
        let runs_before = self.runs.len();
        let tasks_before = self.tasks.len();
        self.results.retain(|_, result| !ids.contains(&result.task_id()));
        self.runs.retain(|_, run| !ids.contains(&run.task_id()));
        self.tasks.retain(|id, _| !ids.contains(id));
        DeletionCounts {
            tasks: count(tasks_before - self.tasks.len()),
            task_runs: count(runs_before - self.runs.len()),
            results: count(results_before - self.results.len()),
        }
    }
}

fn apply_page<T>(
    rows: impl Iterator<Item = T>,
    page: Page,
    key: impl Fn(&T) -> (i64, DateTime<Utc>),
) -> Vec<T> {
    let mut rows: Vec<T> = match page.after_id() {
        Some(after) => rows.filter(|row| key(row).0 > after).collect(),
        None => rows.collect(),
    };
    match page.order() {
        Order::IdAscending => rows.sort_by_key(|row| key(row).0),
        Order::CreatedDescending => rows.sort_by(|left, right| {
            let (left_id, left_created) = key(left);
            let (right_id, right_created) = key(right);
            right_created
                .cmp(&left_created)
                .then(right_id.cmp(&left_id))
        }),
    }
    page.window(rows)
}

impl CompletionUnit for InMemoryTaskState {
    fn lock_task(&mut self, id: TaskId) -> TaskStoreResult<Option<TaskTally>> {
        Ok(self.tasks.get(&id).map(|task| self.tally(task)))
    }

    fn lock_tasks(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
    ) -> TaskStoreResult<Vec<TaskTally>> {
        Ok(self
            .matching_ids(project_id, filter)
            .into_iter()
            .filter_map(|id| self.tasks.get(&id))
            .map(|task| self.tally(task))
            .collect())
    }

    fn reset_exported(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64> {
        Ok(self.update_tasks(ids, |task| task.set_exported(false)))
    }

    fn set_redundancy(&mut self, ids: &[TaskId], n_answers: Redundancy) -> TaskStoreResult<u64> {
        Ok(self.update_tasks(ids, |task| task.set_n_answers(n_answers)))
    }

    fn set_state(&mut self, ids: &[TaskId], state: TaskState) -> TaskStoreResult<u64> {
        Ok(self.update_tasks(ids, |task| task.set_state(state)))
    }

    fn supersede_current_results(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64> {
        let mut superseded = 0;
        for result in self.results.values_mut() {
            if result.last_version() && ids.contains(&result.task_id()) {
                result.supersede();
                superseded += 1;
            }
        }
        Ok(superseded)
    }

    fn insert_result(&mut self, result: &NewTaskResult) -> TaskStoreResult<TaskResult> {
        if !self.tasks.contains_key(&result.task_id) {
            return Err(TaskStoreError::NotFound(result.task_id));
        }
        if self.current_result_of(result.task_id).is_some() {
            return Err(TaskStoreError::DuplicateCurrentResult(result.task_id));
        }
        self.last_result_id += 1;
        let stored = result
            .clone()
            .into_result(ResultId::new(self.last_result_id));
        self.results.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    fn delete_current_results(&mut self, ids: &[TaskId]) -> TaskStoreResult<u64> {
        let before = self.results.len();
        self.results
            .retain(|_, result| !(result.last_version() && ids.contains(&result.task_id())));
        Ok(count(before - self.results.len()))
    }

    fn set_priority(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        priority: Priority,
    ) -> TaskStoreResult<u64> {
        let ids = self.matching_ids(project_id, filter);
        Ok(self.update_tasks(&ids, |task| task.set_priority(priority)))
    }

    fn delete_tasks(
        &mut self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        force: bool,
    ) -> TaskStoreResult<DeletionCounts> {
        let with_results: HashSet<TaskId> =
            self.results.values().map(TaskResult::task_id).collect();
        let doomed: HashSet<TaskId> = self
            .matching_ids(project_id, filter)
            .into_iter()
            .filter(|id| force || !with_results.contains(id))
            .collect();
        Ok(self.remove_tasks(&doomed))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, task: &NewTask) -> TaskStoreResult<Task> {
        self.write(|state| {
            state.last_task_id += 1;
            let stored = task.clone().into_task(TaskId::new(state.last_task_id));
            state.tasks.insert(stored.id(), stored.clone());
            Ok(stored)
        })
    }

    async fn update_task_info(
        &self,
        id: TaskId,
        update: &TaskInfoUpdate,
    ) -> TaskStoreResult<Task> {
        self.write(|state| {
            let stored = state
                .tasks
                .get_mut(&id)
                .ok_or(TaskStoreError::NotFound(id))?;
            stored.apply_info(update);
            Ok(stored.clone())
        })
    }

    async fn set_exported(&self, id: TaskId, exported: bool) -> TaskStoreResult<Task> {
        self.write(|state| {
            let stored = state
                .tasks
                .get_mut(&id)
                .ok_or(TaskStoreError::NotFound(id))?;
            stored.set_exported(exported);
            Ok(stored.clone())
        })
    }

    async fn find_task(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        self.read(|state| state.tasks.get(&id).cloned())
    }

    async fn find_tasks(
        &self,
        project_id: ProjectId,
        filter: &CompiledFilter,
        page: Page,
    ) -> TaskStoreResult<Vec<Task>> {
        self.read(|state| {
            let rows = state
                .tasks
                .values()
                .filter(|task| task.project_id() == project_id && state.matches(task, filter))
                .cloned();
            apply_page(rows, page, |task| (task.id().value(), task.created_at()))
        })
    }

    async fn count_tasks(
        &self,
        project_id: ProjectId,
        filter: &CompiledFilter,
    ) -> TaskStoreResult<u64> {
        self.read(|state| count(state.matching_ids(project_id, filter).len()))
    }

    async fn find_ongoing_by_fingerprint(
        &self,
        project_id: ProjectId,
        fingerprint: &Fingerprint,
    ) -> TaskStoreResult<Option<TaskId>> {
        self.read(|state| {
            state
                .tasks
                .values()
                .find(|task| {
                    task.project_id() == project_id
                        && task.state() == TaskState::Ongoing
                        && task.fingerprint() == fingerprint
                })
                .map(Task::id)
        })
    }

    async fn delete_task(
        &self,
        project_id: ProjectId,
        id: TaskId,
    ) -> TaskStoreResult<Option<DeletionCounts>> {
        self.write(|state| {
            let belongs = state
                .tasks
                .get(&id)
                .is_some_and(|task| task.project_id() == project_id);
            if !belongs {
                return Ok(None);
            }
            Ok(Some(state.remove_tasks(&HashSet::from([id]))))
        })
    }

    async fn create_task_run(&self, run: &NewTaskRun) -> TaskStoreResult<TaskRun> {
        self.write(|state| {
            let belongs = state
                .tasks
                .get(&run.task_id())
                .is_some_and(|task| task.project_id() == run.project_id());
            if !belongs {
                return Err(TaskStoreError::TaskNotInProject {
                    task_id: run.task_id(),
                    project_id: run.project_id(),
                });
            }
            state.last_run_id += 1;
            let stored = run.clone().into_task_run(TaskRunId::new(state.last_run_id));
            state.runs.insert(stored.id(), stored.clone());
            Ok(stored)
        })
    }

    async fn find_task_run(&self, id: TaskRunId) -> TaskStoreResult<Option<TaskRun>> {
        self.read(|state| state.runs.get(&id).cloned())
    }

    async fn find_task_runs(
        &self,
        project_id: ProjectId,
        query: &TaskRunQuery,
    ) -> TaskStoreResult<Vec<TaskRun>> {
        self.read(|state| {
            let rows = state
                .runs
                .values()
                .filter(|run| {
                    run.project_id() == project_id
                        && query.task_id.is_none_or(|task_id| run.task_id() == task_id)
                        && query
                            .contributor
                            .as_ref()
                            .is_none_or(|contributor| run.contributor() == contributor)
                })
                .cloned();
            apply_page(rows, query.page, |run| (run.id().value(), run.created_at()))
        })
    }

    async fn count_task_runs(
        &self,
        project_id: ProjectId,
        task_id: Option<TaskId>,
    ) -> TaskStoreResult<u64> {
        self.read(|state| {
            count(
                state
                    .runs
                    .values()
                    .filter(|run| {
                        run.project_id() == project_id
                            && task_id.is_none_or(|task_id| run.task_id() == task_id)
                    })
                    .count(),
            )
        })
    }

    async fn find_completed_task_runs(
        &self,
        project_id: ProjectId,
        exported: Option<bool>,
        page: Page,
    ) -> TaskStoreResult<Vec<TaskRun>> {
        self.read(|state| {
            let rows = state
                .runs
                .values()
                .filter(|run| {
                    run.project_id() == project_id
                        && state.tasks.get(&run.task_id()).is_some_and(|task| {
                            task.state() == TaskState::Completed
                                && exported.is_none_or(|flag| task.exported() == flag)
                        })
                })
                .cloned();
            apply_page(rows, page.ordered_by(Order::IdAscending), |run| {
                (run.id().value(), run.created_at())
            })
        })
    }

    async fn delete_project_task_runs(&self, project_id: ProjectId) -> TaskStoreResult<u64> {
        self.write(|state| {
            let before = state.runs.len();
            state.runs.retain(|_, run| run.project_id() != project_id);
            Ok(count(before - state.runs.len()))
        })
    }

    async fn find_results(&self, task_id: TaskId) -> TaskStoreResult<Vec<TaskResult>> {
        self.read(|state| {
            state
                .results
                .values()
                .filter(|result| result.task_id() == task_id)
                .cloned()
                .collect()
        })
    }

    async fn find_current_result(&self, task_id: TaskId) -> TaskStoreResult<Option<TaskResult>> {
        self.read(|state| state.current_result_of(task_id).cloned())
    }

    async fn find_project_results(
        &self,
        project_id: ProjectId,
        current_only: bool,
        page: Page,
    ) -> TaskStoreResult<Vec<TaskResult>> {
        self.read(|state| {
            let rows = state
                .results
                .values()
                .filter(|result| {
                    result.project_id() == project_id && (!current_only || result.last_version())
                })
                .cloned();
            apply_page(rows, page.ordered_by(Order::IdAscending), |result| {
                (result.id().value(), result.created_at())
            })
        })
    }

    async fn project_progress(&self, project_id: ProjectId) -> TaskStoreResult<ProjectProgress> {
        self.read(|state| {
            let tasks: Vec<&Task> = state
                .tasks
                .values()
                .filter(|task| task.project_id() == project_id)
                .collect();
            let runs: Vec<&TaskRun> = state
                .runs
                .values()
                .filter(|run| run.project_id() == project_id)
                .collect();
            let contributors: HashSet<_> = runs.iter().map(|run| run.contributor()).collect();
            ProjectProgress {
                n_tasks: count(tasks.len()),
                n_completed_tasks: count(
                    tasks
                        .iter()
                        .filter(|task| task.state() == TaskState::Completed)
                        .count(),
                ),
                n_task_runs: count(runs.len()),
                n_contributors: count(contributors.len()),
                last_activity: runs.iter().map(|run| run.finish_time()).max(),
            }
        })
    }

    async fn transaction<F, T>(&self, work: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut dyn CompletionUnit) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.write(|state| work(state))
    }
}
