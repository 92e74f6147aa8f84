//! Task distribution core: tasks, contributor runs and completion results.
//!
//! A task completes once it has collected as many runs as its redundancy
//! target asks for. Completion writes an immutable result row referencing
//! every run present at that moment; raising or lowering the target later
//! re-evaluates affected tasks in one store transaction. The module follows
//! hexagonal architecture:
//!
//! - Domain types and the pure completion planner in [`domain`]
//! - Port contracts in [`ports`]
//! - In-memory, `PostgreSQL` and file storage adapters in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
