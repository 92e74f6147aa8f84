//! Local filesystem storage rooted in a capability directory.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io::ErrorKind;
use std::sync::Arc;

use super::validate_name;
use crate::task::ports::{FileStorage, FileStorageError, FileStorageResult, StorageContainer};

/// Stores artifacts as `<root>/<container>/<name>`.
///
/// All access goes through a `cap-std` directory handle, so names cannot
/// reach outside the root.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: Arc<Dir>,
}

impl LocalFileStorage {
    /// Opens `root`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`FileStorageError::Io`] when the directory cannot be created
    /// or opened.
    pub fn open(root: &Utf8Path) -> FileStorageResult<Self> {
        Dir::create_ambient_dir_all(root, ambient_authority()).map_err(FileStorageError::io)?;
        let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(FileStorageError::io)?;
        Ok(Self {
            root: Arc::new(dir),
        })
    }

    async fn run_blocking<F, T>(&self, f: F) -> FileStorageResult<T>
    where
        F: FnOnce(&Dir) -> FileStorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let root = Arc::clone(&self.root);
        tokio::task::spawn_blocking(move || f(&root))
            .await
            .map_err(FileStorageError::io)?
    }
}

fn artifact_path(container: &StorageContainer, name: &str) -> FileStorageResult<Utf8PathBuf> {
    validate_name(container.as_str())?;
    validate_name(name)?;
    Ok(Utf8Path::new(container.as_str()).join(name))
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn upload_file(
        &self,
        container: &StorageContainer,
        name: &str,
        bytes: Vec<u8>,
    ) -> FileStorageResult<()> {
        let path = artifact_path(container, name)?;
        let container = container.as_str().to_owned();
        self.run_blocking(move |root| {
            root.create_dir_all(&container)
                .map_err(FileStorageError::io)?;
            root.write(&path, bytes).map_err(FileStorageError::io)
        })
        .await
    }

    async fn delete_file(
        &self,
        container: &StorageContainer,
        name: &str,
    ) -> FileStorageResult<bool> {
        let path = artifact_path(container, name)?;
        self.run_blocking(move |root| match root.remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(FileStorageError::io(err)),
        })
        .await
    }
}
