//! Pagination state, actions, and the pure reducers that transform it.

use crate::environment::FetchError;
use std::sync::Arc;

/// Default page size for a fresh store
pub const DEFAULT_LIMIT: i64 = 10;

/// Default cursor for a fresh store
pub const DEFAULT_OFFSET: i64 = 0;

/// Application state: the pagination window and the items of the last load
///
/// `limit` and `offset` are not clamped; decrementing past zero yields a
/// negative value that is forwarded to the fetcher unchanged.
///
/// `items` is a shared slice, so copying the state for a reducer never copies
/// the items themselves.
#[derive(Debug, PartialEq)]
pub struct PageState<T> {
    /// Page size
    pub limit: i64,
    /// Pagination cursor
    pub offset: i64,
    /// Items returned by the most recent successful load
    pub items: Arc<[T]>,
}

impl<T> PageState<T> {
    /// Create an empty state with the given window
    #[must_use]
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset,
            items: Arc::from(Vec::new()),
        }
    }
}

impl<T> Default for PageState<T> {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_OFFSET)
    }
}

impl<T> Clone for PageState<T> {
    fn clone(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset,
            items: Arc::clone(&self.items),
        }
    }
}

/// Every action the store understands
///
/// Each variant corresponds to one channel on the action bus.
#[derive(Debug)]
pub enum PageAction<T> {
    /// Grow the page size
    IncreaseLimit(i64),
    /// Shrink the page size
    DecreaseLimit(i64),
    /// Move the cursor forward
    IncreaseOffset(i64),
    /// Move the cursor back
    DecreaseOffset(i64),
    /// Fetch the page described by the current window
    RequestLoad,
    /// A fetch completed; replaces the items
    LoadSucceeded(Arc<[T]>),
    /// A fetch failed; state is left untouched
    LoadFailed(FetchError),
}

impl<T> PageAction<T> {
    /// Stable name for logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::IncreaseLimit(_) => "increase_limit",
            Self::DecreaseLimit(_) => "decrease_limit",
            Self::IncreaseOffset(_) => "increase_offset",
            Self::DecreaseOffset(_) => "decrease_offset",
            Self::RequestLoad => "request_load",
            Self::LoadSucceeded(_) => "load_succeeded",
            Self::LoadFailed(_) => "load_failed",
        }
    }

    /// Whether this action ends a load cycle
    #[must_use]
    pub const fn is_load_outcome(&self) -> bool {
        matches!(self, Self::LoadSucceeded(_) | Self::LoadFailed(_))
    }
}

impl<T> Clone for PageAction<T> {
    fn clone(&self) -> Self {
        match self {
            Self::IncreaseLimit(n) => Self::IncreaseLimit(*n),
            Self::DecreaseLimit(n) => Self::DecreaseLimit(*n),
            Self::IncreaseOffset(n) => Self::IncreaseOffset(*n),
            Self::DecreaseOffset(n) => Self::DecreaseOffset(*n),
            Self::RequestLoad => Self::RequestLoad,
            Self::LoadSucceeded(items) => Self::LoadSucceeded(Arc::clone(items)),
            Self::LoadFailed(error) => Self::LoadFailed(error.clone()),
        }
    }
}

/// Pure reducers for [`PageState`]
///
/// Arithmetic wraps at the `i64` bounds so every reducer is total.
pub mod reducers {
    use super::PageState;
    use std::sync::Arc;

    /// `limit += delta`
    pub fn increase_limit<T>(state: &mut PageState<T>, delta: &i64) {
        state.limit = state.limit.wrapping_add(*delta);
    }

    /// `limit -= delta`
    pub fn decrease_limit<T>(state: &mut PageState<T>, delta: &i64) {
        state.limit = state.limit.wrapping_sub(*delta);
    }

    /// `offset += delta`
    pub fn increase_offset<T>(state: &mut PageState<T>, delta: &i64) {
        state.offset = state.offset.wrapping_add(*delta);
    }

    /// `offset -= delta`
    pub fn decrease_offset<T>(state: &mut PageState<T>, delta: &i64) {
        state.offset = state.offset.wrapping_sub(*delta);
    }

    /// Replace the items wholesale
    pub fn replace_items<T>(state: &mut PageState<T>, items: &Arc<[T]>) {
        state.items = Arc::clone(items);
    }
}
