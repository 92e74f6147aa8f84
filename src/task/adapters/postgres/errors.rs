//! Diesel error mapping for the task store.

use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::task::ports::TaskStoreError;

/// Maps constraint violations to [`TaskStoreError::Integrity`] and
/// everything else to [`TaskStoreError::Persistence`].
pub(super) fn map_diesel_error(err: DieselError) -> TaskStoreError {
    let constraint = match &err {
        DieselError::DatabaseError(kind, info) => integrity_label(kind).map(|label| {
            info.constraint_name()
                .map_or_else(|| label.to_owned(), str::to_owned)
        }),
        _ => None,
    };
    match constraint {
        Some(constraint) => TaskStoreError::integrity(constraint, err),
        None => TaskStoreError::persistence(err),
    }
}

const fn integrity_label(kind: &DatabaseErrorKind) -> Option<&'static str> {
    match kind {
        DatabaseErrorKind::UniqueViolation => Some("unique"),
        DatabaseErrorKind::ForeignKeyViolation => Some("foreign_key"),
        DatabaseErrorKind::NotNullViolation => Some("not_null"),
        DatabaseErrorKind::CheckViolation => Some("check"),
        _ => None,
    }
}

impl From<DieselError> for TaskStoreError {
    fn from(err: DieselError) -> Self {
        map_diesel_error(err)
    }
}
