//! Cache invalidation signal consumed by downstream read caches.

use crate::project::domain::ProjectId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for cache signal delivery.
pub type CacheResult<T> = Result<T, CacheError>;

/// Side channel notified after every committed mutation.
///
/// Signals carry no payload beyond the project id. The cache layer's own
/// expiry and recompute policy lives outside this crate.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Invalidates cached data derived from `project_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the signal could not be delivered.
    async fn invalidate_project(&self, project_id: ProjectId) -> CacheResult<()>;

    /// Requests a global cache reset after deletions.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the signal could not be delivered.
    async fn reset(&self) -> CacheResult<()>;
}

/// Errors returned while delivering cache signals.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache backend could not be reached.
    #[error("cache signal failed: {0}")]
    Delivery(Arc<dyn std::error::Error + Send + Sync>),
}

impl CacheError {
    /// Wraps a delivery error.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Arc::new(err))
    }
}
