//! Pure completion planning.
//!
//! The planner looks at per-task tallies read inside a store transaction and
//! decides which writes bring every task back in line with
//! `state == completed` iff `run_count >= n_answers`. It never touches the
//! store itself; the completion engine applies the plan through a
//! transaction unit in a fixed order:
//!
//! 1. reset the export flag on stale exports,
//! 2. retarget `n_answers`,
//! 3. flip states,
//! 4. supersede current results,
//! 5. insert new current results,
//! 6. delete current results of reopened tasks.
//!
//! Tasks whose current result already references exactly the present runs
//! produce no writes, which makes re-running a plan a no-op.

use super::{Redundancy, TaskId, TaskResult, TaskRunId, TaskState};
use serde::Serialize;

/// Snapshot of one task as seen inside a completion transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTally {
    /// Task identifier.
    pub task_id: TaskId,
    /// State before re-evaluation.
    pub state: TaskState,
    /// Redundancy target before re-evaluation.
    pub n_answers: Redundancy,
    /// Export flag before re-evaluation.
    pub exported: bool,
    /// Every stored run, ascending.
    pub run_ids: Vec<TaskRunId>,
    /// Runs referenced by the current result, if there is one.
    pub current_result_runs: Option<Vec<TaskRunId>>,
}

impl TaskTally {
    /// Returns the number of stored runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.run_ids.len()
    }

    fn result_matches_runs(&self) -> bool {
        self.current_result_runs
            .as_deref()
            .is_some_and(|runs| runs == self.run_ids.as_slice())
    }
}

/// What re-evaluation does to a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDecision {
    /// Threshold met and a new current result is needed.
    Complete {
        /// A current result with a different run set must be superseded.
        supersede: bool,
    },
    /// Threshold met and the current result already covers every run.
    AlreadyComplete,
    /// Threshold no longer met; the task reverts to ongoing.
    Reopen {
        /// A current result exists and must be deleted.
        drop_result: bool,
    },
    /// Threshold not met and nothing to retire.
    StillOngoing,
}

/// Decides the outcome for one task against `target`.
///
/// Unlike [`decide_on_new_run`], this bulk path absorbs late runs: when a
/// completed task gained runs since its current result was written, that
/// result is superseded by one listing every present run, even if `target`
/// is unchanged.
#[must_use]
pub fn decide(tally: &TaskTally, target: Redundancy) -> CompletionDecision {
    if target.is_met_by(tally.run_count()) {
        if tally.result_matches_runs() {
            CompletionDecision::AlreadyComplete
        } else {
            CompletionDecision::Complete {
                supersede: tally.current_result_runs.is_some(),
            }
        }
    } else if tally.state == TaskState::Completed || tally.current_result_runs.is_some() {
        CompletionDecision::Reopen {
            drop_result: tally.current_result_runs.is_some(),
        }
    } else {
        CompletionDecision::StillOngoing
    }
}

/// Decides the outcome for one task after a new run arrived.
///
/// A completed task that already has a current result is left alone, so runs
/// arriving after completion never rewrite the completion evidence.
#[must_use]
pub fn decide_on_new_run(tally: &TaskTally) -> CompletionDecision {
    if tally.state == TaskState::Completed && tally.current_result_runs.is_some() {
        return CompletionDecision::AlreadyComplete;
    }
    decide(tally, tally.n_answers)
}

/// Counts per outcome of a bulk re-evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RedundancySummary {
    /// Tasks selected by the filter.
    pub matched: usize,
    /// Tasks that received a new current result.
    pub completed: usize,
    /// Tasks whose previous current result was superseded.
    pub superseded: usize,
    /// Tasks that were already complete with an up-to-date result.
    pub already_completed: usize,
    /// Tasks that reverted to ongoing.
    pub reopened: usize,
    /// Tasks that remain ongoing.
    pub still_ongoing: usize,
    /// Tasks whose export flag was reset.
    pub exports_reset: usize,
}

/// A current result to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedResult {
    /// Completed task.
    pub task_id: TaskId,
    /// Runs the result references.
    pub task_run_ids: Vec<TaskRunId>,
}

/// Writes that bring a task set in line with a redundancy target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedundancyPlan {
    /// Completed, exported tasks whose target rises.
    pub stale_exports: Vec<TaskId>,
    /// Tasks whose `n_answers` changes.
    pub retarget: Vec<TaskId>,
    /// Tasks flipping to completed.
    pub mark_completed: Vec<TaskId>,
    /// Tasks flipping to ongoing.
    pub mark_ongoing: Vec<TaskId>,
    /// Tasks whose current result is superseded.
    pub supersede: Vec<TaskId>,
    /// New current results.
    pub results: Vec<PlannedResult>,
    /// Tasks whose current result is deleted.
    pub drop_current: Vec<TaskId>,
    /// Outcome counts.
    pub summary: RedundancySummary,
}

impl RedundancyPlan {
    /// Returns `true` when applying the plan writes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.stale_exports.is_empty()
            && self.retarget.is_empty()
            && self.mark_completed.is_empty()
            && self.mark_ongoing.is_empty()
            && self.supersede.is_empty()
            && self.results.is_empty()
            && self.drop_current.is_empty()
    }
}

/// Plans a bulk re-evaluation of `tallies` against `target`.
///
/// The stale-export check reads the pre-update `n_answers`. Lowering the
/// target never sets the export flag back.
#[must_use]
pub fn plan_redundancy(tallies: &[TaskTally], target: Redundancy) -> RedundancyPlan {
    let mut plan = RedundancyPlan::default();
    plan.summary.matched = tallies.len();

    for tally in tallies {
        if tally.state == TaskState::Completed && tally.exported && tally.n_answers < target {
            plan.stale_exports.push(tally.task_id);
        }
        if tally.n_answers != target {
            plan.retarget.push(tally.task_id);
        }
        plan_single(&mut plan, tally, decide(tally, target));
    }

    plan.summary.exports_reset = plan.stale_exports.len();
    plan
}

/// Plans the single-task path after a run was stored.
#[must_use]
pub fn plan_new_run(tally: &TaskTally) -> (CompletionDecision, RedundancyPlan) {
    let decision = decide_on_new_run(tally);
    let mut plan = RedundancyPlan::default();
    plan.summary.matched = 1;
    plan_single(&mut plan, tally, decision);
    (decision, plan)
}

fn plan_single(plan: &mut RedundancyPlan, tally: &TaskTally, decision: CompletionDecision) {
    match decision {
        CompletionDecision::Complete { supersede } => {
            if tally.state != TaskState::Completed {
                plan.mark_completed.push(tally.task_id);
            }
            if supersede {
                plan.supersede.push(tally.task_id);
                plan.summary.superseded += 1;
            }
            plan.results.push(PlannedResult {
                task_id: tally.task_id,
                task_run_ids: tally.run_ids.clone(),
            });
            plan.summary.completed += 1;
        }
        CompletionDecision::AlreadyComplete => {
            if tally.state != TaskState::Completed {
                plan.mark_completed.push(tally.task_id);
            }
            plan.summary.already_completed += 1;
        }
        CompletionDecision::Reopen { drop_result } => {
            if tally.state != TaskState::Ongoing {
                plan.mark_ongoing.push(tally.task_id);
            }
            if drop_result {
                plan.drop_current.push(tally.task_id);
            }
            plan.summary.reopened += 1;
        }
        CompletionDecision::StillOngoing => plan.summary.still_ongoing += 1,
    }
}

/// Outcome of the single-task re-evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The task does not exist.
    NotFound,
    /// The task needs more runs.
    StillOngoing {
        /// Stored runs.
        runs: usize,
        /// Redundancy target.
        target: Redundancy,
    },
    /// The task just completed with this current result.
    Completed(TaskResult),
    /// The task was already complete, or a concurrent attempt completed it.
    AlreadyCompleted,
    /// The task reverted to ongoing.
    Reopened,
}
