//! Detection of re-imported task payloads.

use crate::project::domain::ProjectId;
use crate::task::domain::{Fingerprint, TaskId};
use crate::task::ports::{TaskStore, TaskStoreResult};
use serde_json::Value;
use std::sync::Arc;

/// Finds ongoing tasks whose payload equals a candidate payload.
///
/// Payloads are compared through their stored fingerprint, so key order and
/// whitespace never matter. Completed tasks never match.
#[derive(Clone)]
pub struct DuplicateDetector<S>
where
    S: TaskStore,
{
    store: Arc<S>,
}

impl<S> DuplicateDetector<S>
where
    S: TaskStore,
{
    /// Creates a detector over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the lowest-id ongoing task of `project_id` carrying `info`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::task::ports::TaskStoreError`] when the lookup fails.
    pub async fn find_duplicate(
        &self,
        project_id: ProjectId,
        info: &Value,
    ) -> TaskStoreResult<Option<TaskId>> {
        let fingerprint = Fingerprint::of(info);
        self.store
            .find_ongoing_by_fingerprint(project_id, &fingerprint)
            .await
    }
}
