//! File storage port for export artifacts.

use crate::project::domain::UserId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for file storage operations.
pub type FileStorageResult<T> = Result<T, FileStorageError>;

/// Storage namespace holding one owner's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageContainer(String);

impl StorageContainer {
    /// Returns the container of `owner`, named `user_<owner_id>`.
    #[must_use]
    pub fn for_owner(owner: UserId) -> Self {
        Self(format!("user_{owner}"))
    }

    /// Returns the container name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blob storage used for export artifacts.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores `bytes` under `name`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`FileStorageError`] when the file cannot be written.
    async fn upload_file(
        &self,
        container: &StorageContainer,
        name: &str,
        bytes: Vec<u8>,
    ) -> FileStorageResult<()>;

    /// Removes `name`; returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`FileStorageError`] when the file exists but cannot be
    /// removed.
    async fn delete_file(&self, container: &StorageContainer, name: &str)
    -> FileStorageResult<bool>;
}

/// Errors returned by file storage implementations.
#[derive(Debug, Clone, Error)]
pub enum FileStorageError {
    /// The file name would escape its container.
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    /// Underlying I/O failure.
    #[error("file storage error: {0}")]
    Io(Arc<dyn std::error::Error + Send + Sync>),
}

impl FileStorageError {
    /// Wraps an I/O error.
    pub fn io(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Io(Arc::new(err))
    }
}
