//! Adapters for task persistence, cache signalling and artifact storage.

pub mod memory;
pub mod postgres;
pub mod storage;
