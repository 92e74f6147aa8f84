//! Redundancy and completion engine.

use super::notify_project;
use crate::project::domain::ProjectId;
use crate::task::domain::completion::{plan_new_run, plan_redundancy};
use crate::task::domain::{
    CompletionDecision, CompletionOutcome, Contributor, NewTaskResult, NewTaskRun, Priority,
    Redundancy, RedundancyPlan, RedundancySummary, TaskDomainError, TaskFilter, TaskId,
    TaskResult, TaskRun, TaskState,
};
use crate::task::ports::{
    CacheInvalidator, CompletionUnit, TaskStore, TaskStoreError, TaskStoreResult,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Service-level errors for completion operations.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Input validation failed before any write.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The store rejected the operation; nothing was committed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for completion operations.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// A contributor's answer to a task.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitTaskRunRequest {
    project_id: ProjectId,
    task_id: TaskId,
    contributor: Contributor,
    info: Value,
    finish_time: Option<DateTime<Utc>>,
}

impl SubmitTaskRunRequest {
    /// Creates a request finished at submission time.
    #[must_use]
    pub const fn new(
        project_id: ProjectId,
        task_id: TaskId,
        contributor: Contributor,
        info: Value,
    ) -> Self {
        Self {
            project_id,
            task_id,
            contributor,
            info,
            finish_time: None,
        }
    }

    /// Sets the finish time reported by the client.
    #[must_use]
    pub const fn with_finish_time(mut self, finish_time: DateTime<Utc>) -> Self {
        self.finish_time = Some(finish_time);
        self
    }
}

/// A stored run and the completion outcome it triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRun {
    /// The stored run.
    pub run: TaskRun,
    /// What happened to its task.
    pub outcome: CompletionOutcome,
}

struct NewRunEvaluation {
    decision: CompletionDecision,
    runs: usize,
    target: Redundancy,
    inserted: Option<TaskResult>,
    changed: bool,
}

/// Keeps task state, results and export flags consistent with redundancy
/// targets.
///
/// Every operation runs in one store transaction: tallies are read under row
/// locks, a pure plan is computed, and the plan is applied before commit.
#[derive(Clone)]
pub struct CompletionEngine<S, K, C>
where
    S: TaskStore,
    K: CacheInvalidator,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    cache: Arc<K>,
    clock: Arc<C>,
}

impl<S, K, C> CompletionEngine<S, K, C>
where
    S: TaskStore,
    K: CacheInvalidator,
    C: Clock + Send + Sync,
{
    /// Creates a new completion engine.
    #[must_use]
    pub const fn new(store: Arc<S>, cache: Arc<K>, clock: Arc<C>) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    /// Sets the redundancy target of the project's tasks matching `filter`
    /// and brings their state, results and export flags in line with it.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Domain`] for a target outside `[1, 1000]`
    /// or a malformed filter, and [`CompletionError::Store`] when the
    /// transaction fails.
    pub async fn reevaluate_completion(
        &self,
        project_id: ProjectId,
        target: u32,
        filter: &TaskFilter,
    ) -> CompletionResult<RedundancySummary> {
        let target = Redundancy::new(target)?;
        let compiled = filter.compile()?;
        let now = self.clock.utc();

        let (summary, changed) = self
            .store
            .transaction(move |unit| {
                let tallies = unit.lock_tasks(project_id, &compiled)?;
                let plan = plan_redundancy(&tallies, target);
                apply_plan(unit, project_id, &plan, target, now)?;
                Ok((plan.summary, !plan.is_noop()))
            })
            .await?;

        info!(
            %project_id,
            target = target.value(),
            matched = summary.matched,
            completed = summary.completed,
            reopened = summary.reopened,
            exports_reset = summary.exports_reset,
            "redundancy re-evaluated"
        );
        if changed {
            notify_project(&*self.cache, project_id).await;
        }
        Ok(summary)
    }

    /// Re-evaluates one task against its own redundancy target after a run
    /// was stored.
    ///
    /// A task that is already completed with a current result is left
    /// untouched. Losing a race to insert the current result is reported as
    /// [`CompletionOutcome::AlreadyCompleted`].
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Store`] when the transaction fails.
    pub async fn reevaluate_on_new_run(
        &self,
        task_id: TaskId,
    ) -> CompletionResult<CompletionOutcome> {
        let Some(task) = self.store.find_task(task_id).await? else {
            return Ok(CompletionOutcome::NotFound);
        };
        let project_id = task.project_id();
        let now = self.clock.utc();

        let attempt = self
            .store
            .transaction(move |unit| {
                let Some(tally) = unit.lock_task(task_id)? else {
                    return Ok(None);
                };
                let (decision, plan) = plan_new_run(&tally);
                let mut inserted = apply_plan(unit, project_id, &plan, tally.n_answers, now)?;
                Ok(Some(NewRunEvaluation {
                    decision,
                    runs: tally.run_count(),
                    target: tally.n_answers,
                    inserted: inserted.pop(),
                    changed: !plan.is_noop(),
                }))
            })
            .await;

        let evaluation = match attempt {
            Ok(Some(evaluation)) => evaluation,
            Ok(None) => return Ok(CompletionOutcome::NotFound),
            Err(TaskStoreError::DuplicateCurrentResult(_)) => {
                debug!(%task_id, "concurrent completion already stored a result");
                return Ok(CompletionOutcome::AlreadyCompleted);
            }
            Err(err) => return Err(err.into()),
        };

        if evaluation.changed {
            notify_project(&*self.cache, project_id).await;
        }
        let outcome = match (evaluation.decision, evaluation.inserted) {
            (CompletionDecision::Complete { .. }, Some(result)) => {
                info!(%project_id, %task_id, runs = evaluation.runs, "task completed");
                CompletionOutcome::Completed(result)
            }
            (CompletionDecision::Complete { .. } | CompletionDecision::AlreadyComplete, _) => {
                CompletionOutcome::AlreadyCompleted
            }
            (CompletionDecision::Reopen { .. }, _) => CompletionOutcome::Reopened,
            (CompletionDecision::StillOngoing, _) => CompletionOutcome::StillOngoing {
                runs: evaluation.runs,
                target: evaluation.target,
            },
        };
        Ok(outcome)
    }

    /// Stores a contributor's run and re-evaluates its task.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Domain`] for an empty answer and
    /// [`CompletionError::Store`] when the task is not part of the project
    /// or the store fails.
    pub async fn submit_task_run(
        &self,
        request: SubmitTaskRunRequest,
    ) -> CompletionResult<SubmittedRun> {
        let SubmitTaskRunRequest {
            project_id,
            task_id,
            contributor,
            info,
            finish_time,
        } = request;
        let mut new_run = NewTaskRun::new(project_id, task_id, contributor, info, &*self.clock)?;
        if let Some(finish_time) = finish_time {
            new_run = new_run.with_finish_time(finish_time);
        }

        let run = self.store.create_task_run(&new_run).await?;
        debug!(%project_id, %task_id, run_id = %run.id(), "task run stored");
        notify_project(&*self.cache, project_id).await;

        let outcome = self.reevaluate_on_new_run(task_id).await?;
        Ok(SubmittedRun { run, outcome })
    }

    /// Sets the priority of the project's tasks matching `filter`, clamped
    /// to `[0.0, 1.0]`. State and results are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Domain`] for a NaN or infinite priority or
    /// a malformed filter, and [`CompletionError::Store`] when the
    /// transaction fails.
    pub async fn update_priority(
        &self,
        project_id: ProjectId,
        priority: f64,
        filter: &TaskFilter,
    ) -> CompletionResult<u64> {
        let priority = Priority::clamped(priority)?;
        let compiled = filter.compile()?;

        let updated = self
            .store
            .transaction(move |unit| unit.set_priority(project_id, &compiled, priority))
            .await?;

        info!(%project_id, priority = priority.value(), updated, "priority updated");
        if updated > 0 {
            notify_project(&*self.cache, project_id).await;
        }
        Ok(updated)
    }
}

/// Applies `plan` through `unit` in the fixed write order and returns the
/// inserted results.
fn apply_plan(
    unit: &mut dyn CompletionUnit,
    project_id: ProjectId,
    plan: &RedundancyPlan,
    target: Redundancy,
    now: DateTime<Utc>,
) -> TaskStoreResult<Vec<TaskResult>> {
    if !plan.stale_exports.is_empty() {
        unit.reset_exported(&plan.stale_exports)?;
    }
    if !plan.retarget.is_empty() {
        unit.set_redundancy(&plan.retarget, target)?;
    }
    if !plan.mark_completed.is_empty() {
        unit.set_state(&plan.mark_completed, TaskState::Completed)?;
    }
    if !plan.mark_ongoing.is_empty() {
        unit.set_state(&plan.mark_ongoing, TaskState::Ongoing)?;
    }
    if !plan.supersede.is_empty() {
        unit.supersede_current_results(&plan.supersede)?;
    }
    let inserted = plan
        .results
        .iter()
        .map(|planned| {
            unit.insert_result(&NewTaskResult {
                project_id,
                task_id: planned.task_id,
                task_run_ids: planned.task_run_ids.clone(),
                created_at: now,
            })
        })
        .collect::<TaskStoreResult<Vec<_>>>()?;
    if !plan.drop_current.is_empty() {
        unit.delete_current_results(&plan.drop_current)?;
    }
    Ok(inserted)
}
