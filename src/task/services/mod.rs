//! Application services orchestrating task stores, cache signals and
//! artifact storage.

mod catalog;
mod cleanup;
mod completion;
mod duplicates;
mod export;

pub use catalog::{
    CatalogError, CatalogResult, CreateTaskRequest, ImportOutcome, TaskCatalogService,
    TaskDefaults,
};
pub use cleanup::{CleanupError, CleanupResult, TaskCleanupService};
pub use completion::{
    CompletionEngine, CompletionError, CompletionResult, SubmitTaskRunRequest, SubmittedRun,
};
pub use duplicates::DuplicateDetector;
pub use export::{ExportArtifacts, ExportFormat, ExportRowSource, ExportTable};

use crate::project::domain::ProjectId;
use crate::task::ports::CacheInvalidator;
use tracing::warn;

/// Tells the cache layer that `project_id` changed. Delivery failures are
/// logged; the committed write stands.
async fn notify_project<K>(cache: &K, project_id: ProjectId)
where
    K: CacheInvalidator + ?Sized,
{
    if let Err(err) = cache.invalidate_project(project_id).await {
        warn!(%project_id, error = %err, "cache invalidation failed");
    }
}

/// Requests a global cache reset after deletions.
async fn notify_reset<K>(cache: &K)
where
    K: CacheInvalidator + ?Sized,
{
    if let Err(err) = cache.reset().await {
        warn!(error = %err, "cache reset failed");
    }
}
