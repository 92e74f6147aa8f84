//! Diesel row models for project persistence.

use super::schema::project;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for project records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = project)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProjectRow {
    /// Project identifier.
    pub id: i64,
    /// Short name.
    pub short_name: String,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: i64,
    /// Owner and co-owner ids.
    pub owners_ids: Vec<i64>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

/// Insert model for project records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = project)]
pub struct NewProjectRow {
    /// Short name.
    pub short_name: String,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: i64,
    /// Owner and co-owner ids.
    pub owners_ids: Vec<i64>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}
