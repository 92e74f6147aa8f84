//! Identifier types for tasks, task runs and results.
//!
//! All identifiers come from store sequences. A higher id was stored later,
//! which is what keyset pagination and run ordering inside results rely on.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! sequence_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a store-assigned identifier.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying numeric value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

sequence_id!(
    /// Unique identifier for a task.
    TaskId
);

sequence_id!(
    /// Unique identifier for a task run.
    TaskRunId
);

sequence_id!(
    /// Unique identifier for a result row.
    ResultId
);
