//! Cache invalidators that do not talk to a real cache.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::project::domain::ProjectId;
use crate::task::ports::{CacheError, CacheInvalidator, CacheResult};

/// A delivered cache signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSignal {
    /// Project-scoped invalidation.
    Project(ProjectId),
    /// Global reset.
    Reset,
}

/// Invalidator that records every signal in delivery order.
#[derive(Debug, Clone, Default)]
pub struct RecordingCacheInvalidator {
    signals: Arc<Mutex<Vec<CacheSignal>>>,
}

impl RecordingCacheInvalidator {
    /// Creates an invalidator with no recorded signals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded signals.
    #[must_use]
    pub fn signals(&self) -> Vec<CacheSignal> {
        self.signals
            .lock()
            .map(|signals| signals.clone())
            .unwrap_or_default()
    }

    fn record(&self, signal: CacheSignal) -> CacheResult<()> {
        let mut signals = self
            .signals
            .lock()
            .map_err(|err| CacheError::delivery(std::io::Error::other(err.to_string())))?;
        signals.push(signal);
        Ok(())
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCacheInvalidator {
    async fn invalidate_project(&self, project_id: ProjectId) -> CacheResult<()> {
        self.record(CacheSignal::Project(project_id))
    }

    async fn reset(&self) -> CacheResult<()> {
        self.record(CacheSignal::Reset)
    }
}

/// Invalidator for deployments without a read cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    async fn invalidate_project(&self, _project_id: ProjectId) -> CacheResult<()> {
        Ok(())
    }

    async fn reset(&self) -> CacheResult<()> {
        Ok(())
    }
}
