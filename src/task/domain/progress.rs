//! Project progress statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate progress of a project's tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProjectProgress {
    /// Stored tasks.
    pub n_tasks: u64,
    /// Tasks in the completed state.
    pub n_completed_tasks: u64,
    /// Stored task runs.
    pub n_task_runs: u64,
    /// Distinct registered users and anonymous identifiers.
    pub n_contributors: u64,
    /// Most recent run finish time.
    pub last_activity: Option<DateTime<Utc>>,
}

impl ProjectProgress {
    /// Returns the completed share in percent, `0.0` for an empty project.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "task counts stay far below 2^52"
    )]
    pub fn percent_complete(&self) -> f64 {
        if self.n_tasks == 0 {
            return 0.0;
        }
        (self.n_completed_tasks as f64 / self.n_tasks as f64) * 100.0
    }
}
