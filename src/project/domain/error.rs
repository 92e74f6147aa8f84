//! Error types for project domain validation.

use thiserror::Error;

/// Errors returned while constructing project values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectDomainError {
    /// The project name is empty after trimming.
    #[error("project name must not be empty")]
    EmptyName,

    /// The short name is empty after trimming.
    #[error("project short name must not be empty")]
    EmptyShortName,

    /// The short name contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid project short name '{0}', expected letters, digits, '-' or '_'")]
    InvalidShortName(String),
}
