//! In-memory adapters for tests and embedded use.

mod cache;
mod store;

pub use cache::{CacheSignal, NoopCacheInvalidator, RecordingCacheInvalidator};
pub use store::InMemoryTaskStore;
