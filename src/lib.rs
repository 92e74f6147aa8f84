//! Crowdtally: task distribution core for crowdsourcing projects.
//!
//! Projects publish tasks; contributors answer them with task runs. A task
//! completes once it collected as many runs as its redundancy target, at
//! which point an immutable result row records the runs that completed it.
//!
//! # Modules
//!
//! - [`project`]: Project identity and ownership
//! - [`task`]: Tasks, runs, results and the completion engine
//! - [`config`]: TOML configuration for binaries
//! - [`migrations`]: Embedded SQL schema
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod migrations;
pub mod project;
pub mod task;
pub mod telemetry;
