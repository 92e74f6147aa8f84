//! Pagination for task and task-run listings.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Ascending identifier, i.e. storage order.
    #[default]
    IdAscending,
    /// Newest first by creation timestamp, ties broken by descending id.
    CreatedDescending,
}

/// A window over a listing.
///
/// Keyset pagination (`after`) always walks ascending ids and ignores
/// `offset` and `order`; it is what exports use to stream large tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    limit: Option<u32>,
    offset: u64,
    after: Option<i64>,
    order: Order,
}

impl Page {
    /// Returns an unbounded page in id order.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            limit: None,
            offset: 0,
            after: None,
            order: Order::IdAscending,
        }
    }

    /// Returns the first `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ZeroPageLimit`] when `limit` is zero.
    pub const fn first(limit: u32) -> Result<Self, TaskDomainError> {
        if limit == 0 {
            return Err(TaskDomainError::ZeroPageLimit);
        }
        Ok(Self {
            limit: Some(limit),
            offset: 0,
            after: None,
            order: Order::IdAscending,
        })
    }

    /// Skips `offset` rows.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Switches to keyset pagination after the row with id `after`.
    #[must_use]
    pub const fn after(mut self, after: i64) -> Self {
        self.after = Some(after);
        self
    }

    /// Sets the listing order.
    #[must_use]
    pub const fn ordered_by(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Returns the row limit.
    #[must_use]
    pub const fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Returns the number of skipped rows; zero in keyset mode.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        if self.after.is_some() { 0 } else { self.offset }
    }

    /// Returns the keyset cursor.
    #[must_use]
    pub const fn after_id(&self) -> Option<i64> {
        self.after
    }

    /// Returns the effective order.
    #[must_use]
    pub const fn order(&self) -> Order {
        if self.after.is_some() {
            Order::IdAscending
        } else {
            self.order
        }
    }

    /// Applies the window to rows already filtered by `after_id` and sorted
    /// by [`Page::order`].
    pub(crate) fn window<T>(&self, rows: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let take = self
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        rows.into_iter().skip(skip).take(take).collect()
    }
}
