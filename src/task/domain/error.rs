//! Error types for task domain validation and parsing.

use super::FilterField;
use thiserror::Error;

/// Errors returned while constructing domain task values.
///
/// All of these are raised before any store write happens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The target redundancy is outside the accepted range.
    #[error("invalid redundancy value {0}, expected an integer in [1, 1000]")]
    InvalidRedundancy(u32),

    /// The priority is NaN or infinite.
    #[error("priority must be a finite number")]
    NonFinitePriority,

    /// The priority lies outside `[0.0, 1.0]` where clamping is not applied.
    #[error("priority {0} is outside [0.0, 1.0]")]
    PriorityOutOfRange(String),

    /// A task or task-run payload is `null` or an empty object.
    #[error("payload must not be empty")]
    EmptyPayload,

    /// An anonymous contributor identifier is blank.
    #[error("anonymous contributor identifier must not be empty")]
    EmptyAnonymousId,

    /// A filter predicate uses an operator the field does not support.
    #[error("operator '{operator}' is not supported for filter field '{field}'")]
    UnsupportedOperator {
        /// Field the predicate targets.
        field: FilterField,
        /// Rejected operator symbol.
        operator: &'static str,
    },

    /// A filter predicate value does not match the field type.
    #[error("filter field '{field}' expects {expected}")]
    FilterValueMismatch {
        /// Field the predicate targets.
        field: FilterField,
        /// Human-readable description of the accepted value type.
        expected: &'static str,
    },

    /// A numeric filter bound is NaN or infinite.
    #[error("filter field '{0}' has a non-finite bound")]
    NonFiniteFilterBound(FilterField),

    /// A full-text predicate has no search terms.
    #[error("full-text search must contain at least one term")]
    EmptyTextSearch,

    /// A page was requested with a zero limit.
    #[error("page limit must be greater than zero")]
    ZeroPageLimit,
}

/// Error returned while parsing task states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task state: {0}")]
pub struct ParseTaskStateError(pub String);
