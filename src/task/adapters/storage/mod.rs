//! File storage adapters for export artifacts.

mod local;
mod memory;

pub use local::LocalFileStorage;
pub use memory::InMemoryFileStorage;

use crate::task::ports::{FileStorageError, FileStorageResult};

fn validate_name(name: &str) -> FileStorageResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with('.');
    if invalid {
        return Err(FileStorageError::InvalidName(name.to_owned()));
    }
    Ok(())
}
