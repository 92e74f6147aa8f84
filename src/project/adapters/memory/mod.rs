//! In-memory project adapter for tests and embedded use.

mod project;

pub use project::InMemoryProjectRepository;
