//! Port contracts for task persistence, cache signals and artifact storage.

pub mod cache;
pub mod storage;
pub mod store;

pub use cache::{CacheError, CacheInvalidator, CacheResult};
pub use storage::{FileStorage, FileStorageError, FileStorageResult, StorageContainer};
pub use store::{
    CompletionUnit, DeletionCounts, TaskRunQuery, TaskStore, TaskStoreError, TaskStoreResult,
};
