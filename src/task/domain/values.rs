//! Validated scalar values carried by tasks.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Priority(f64);

impl Priority {
    /// Lowest priority.
    pub const MIN: Self = Self(0.0);
    /// Highest priority.
    pub const MAX: Self = Self(1.0);

    /// Creates a priority that must already lie in `[0.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NonFinitePriority`] for NaN or infinite
    /// input and [`TaskDomainError::PriorityOutOfRange`] otherwise when the
    /// value is out of range.
    pub fn new(value: f64) -> Result<Self, TaskDomainError> {
        if !value.is_finite() {
            return Err(TaskDomainError::NonFinitePriority);
        }
        if !(Self::MIN.0..=Self::MAX.0).contains(&value) {
            return Err(TaskDomainError::PriorityOutOfRange(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Clamps a finite value into `[0.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NonFinitePriority`] for NaN or infinite
    /// input.
    pub fn clamped(value: f64) -> Result<Self, TaskDomainError> {
        if !value.is_finite() {
            return Err(TaskDomainError::NonFinitePriority);
        }
        Ok(Self(value.clamp(Self::MIN.0, Self::MAX.0)))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Priority {
    type Error = TaskDomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for f64 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target number of task runs before a task completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Redundancy(u32);

impl Redundancy {
    /// Smallest accepted redundancy.
    pub const MIN: u32 = 1;
    /// Largest accepted redundancy.
    pub const MAX: u32 = 1000;
    /// Redundancy applied when a task is created without one.
    pub const DEFAULT: Self = Self(30);

    /// Creates a validated redundancy target.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidRedundancy`] when `value` is outside
    /// `[1, 1000]`.
    pub const fn new(value: u32) -> Result<Self, TaskDomainError> {
        if value < Self::MIN || value > Self::MAX {
            return Err(TaskDomainError::InvalidRedundancy(value));
        }
        Ok(Self(value))
    }

    /// Returns the target as an integer.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns `true` once `run_count` reaches the target.
    #[must_use]
    pub fn is_met_by(self, run_count: usize) -> bool {
        u32::try_from(run_count).unwrap_or(u32::MAX) >= self.0
    }
}

impl Default for Redundancy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Redundancy {
    type Error = TaskDomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Redundancy> for u32 {
    fn from(redundancy: Redundancy) -> Self {
        redundancy.0
    }
}

impl fmt::Display for Redundancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn validate_payload(info: &serde_json::Value) -> Result<(), TaskDomainError> {
    match info {
        serde_json::Value::Null => Err(TaskDomainError::EmptyPayload),
        serde_json::Value::Object(map) if map.is_empty() => Err(TaskDomainError::EmptyPayload),
        _ => Ok(()),
    }
}
