//! `PostgreSQL` adapter for task, task-run and result persistence.

mod errors;
mod filter_sql;
mod models;
mod rows;
mod schema;
mod store;
mod unit;

pub use store::{PostgresTaskStore, TaskPgPool};
