//! Project ownership records consumed by the task lifecycle core.
//!
//! Projects own tasks. The core needs only their identity, short name and
//! ownership (owner plus co-owners) to key export artifacts and cache
//! signals; project metadata management lives outside this crate. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
