//! Domain model for tasks, task runs and results.

pub mod completion;
mod error;
mod filter;
mod fingerprint;
mod ids;
mod page;
mod progress;
mod result;
mod task;
mod task_run;
mod values;

pub use completion::{
    CompletionDecision, CompletionOutcome, PlannedResult, RedundancyPlan, RedundancySummary,
    TaskTally,
};
pub use error::{ParseTaskStateError, TaskDomainError};
pub use filter::{
    CompiledFilter, Comparison, Condition, FilterField, FilterOperator, FilterParams,
    FilterValue, Predicate, TaskFacts, TaskFilter, TextQuery,
};
pub use fingerprint::Fingerprint;
pub use ids::{ResultId, TaskId, TaskRunId};
pub use page::{Order, Page};
pub use progress::ProjectProgress;
pub use result::{NewTaskResult, PersistedResultData, TaskResult};
pub use task::{NewTask, PersistedTaskData, Task, TaskInfoUpdate, TaskState};
pub use task_run::{Contributor, NewTaskRun, PersistedTaskRunData, TaskRun};
pub use values::{Priority, Redundancy};
