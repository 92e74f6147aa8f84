//! In-memory file storage for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::validate_name;
use crate::task::ports::{FileStorage, FileStorageError, FileStorageResult, StorageContainer};

/// Thread-safe in-memory file storage keyed by container and name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStorage {
    files: Arc<RwLock<BTreeMap<(String, String), Vec<u8>>>>,
}

impl InMemoryFileStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored names of `container`, sorted.
    #[must_use]
    pub fn file_names(&self, container: &StorageContainer) -> Vec<String> {
        self.files
            .read()
            .map(|files| {
                files
                    .keys()
                    .filter(|(owner, _)| owner == container.as_str())
                    .map(|(_, name)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the contents of a stored file.
    #[must_use]
    pub fn contents(&self, container: &StorageContainer, name: &str) -> Option<Vec<u8>> {
        self.files.read().ok().and_then(|files| {
            files
                .get(&(container.as_str().to_owned(), name.to_owned()))
                .cloned()
        })
    }
}

fn lock_error(err: impl std::fmt::Display) -> FileStorageError {
    FileStorageError::io(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn upload_file(
        &self,
        container: &StorageContainer,
        name: &str,
        bytes: Vec<u8>,
    ) -> FileStorageResult<()> {
        validate_name(name)?;
        let mut files = self.files.write().map_err(lock_error)?;
        files.insert((container.as_str().to_owned(), name.to_owned()), bytes);
        Ok(())
    }

    async fn delete_file(
        &self,
        container: &StorageContainer,
        name: &str,
    ) -> FileStorageResult<bool> {
        validate_name(name)?;
        let mut files = self.files.write().map_err(lock_error)?;
        Ok(files
            .remove(&(container.as_str().to_owned(), name.to_owned()))
            .is_some())
    }
}
