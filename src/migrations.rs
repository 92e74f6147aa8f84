//! Embedded SQL migrations.

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;

/// Creates the project, task, task-run and result tables.
pub const CREATE_CROWD_TABLES_SQL: &str =
    include_str!("../migrations/2026-03-02-000000_create_crowd_tables/up.sql");

/// Applies every migration in order.
///
/// # Errors
///
/// Returns the database error of the first statement that fails.
pub fn run(connection: &mut PgConnection) -> Result<(), diesel::result::Error> {
    connection.batch_execute(CREATE_CROWD_TABLES_SQL)
}
