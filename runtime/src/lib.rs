//! # Pagestore Runtime
//!
//! Runtime for the pagestore architecture.
//!
//! This crate provides the [`Store`] that wires the core primitives together
//! and runs the load effect on a tokio runtime.
//!
//! ## Core Components
//!
//! - **Store**: owns state, selectors and effects; the entry point for callers
//! - **Action Bus**: one channel per action kind, plus an async broadcast
//! - **Load Effect**: fetches the current window, last request wins
//!
//! ## Example
//!
//! ```ignore
//! use pagestore_runtime::Store;
//!
//! let store = Store::new(fetcher)?;
//!
//! // Observe items
//! let _sub = store.items().subscribe(|items| println!("{} items", items.len()));
//!
//! // Move to the next page and load it
//! store.increase_offset(10);
//! store.request_load();
//! ```

/// Action channels and the action broadcast
pub mod bus;

/// Load and failure-log effects
pub mod effects;

/// Prometheus metrics for observability
pub mod metrics;

/// The Store
pub mod store;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Fetch failures are not store errors: they travel as `load_failed`
    /// actions and never fail a call.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// The store was created outside a tokio runtime
        ///
        /// Use [`Store::with_handle`](crate::Store::with_handle) to supply one
        /// explicitly.
        #[error("Store requires a tokio runtime")]
        NoRuntime,

        /// Timeout waiting for terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast closed
        ///
        /// Returned by `send_and_wait_for` if the broadcast channel is closed
        /// while waiting.
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use bus::ActionBus;
pub use effects::{LoadStatus, SwitchLatest};
pub use error::StoreError;
pub use store::Store;

/// Store configuration
///
/// # Example
///
/// ```
/// use pagestore_runtime::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_initial_limit(20)
///     .with_action_broadcast_capacity(64);
/// assert_eq!(config.initial_limit, 20);
/// assert_eq!(config.initial_offset, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Page size of a fresh store
    pub initial_limit: i64,

    /// Cursor of a fresh store
    pub initial_offset: i64,

    /// Number of actions buffered for slow `subscribe_actions` receivers
    pub action_broadcast_capacity: usize,
}

impl StoreConfig {
    /// Default configuration: `limit = 10`, `offset = 0`, 16 buffered actions
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_limit: pagestore_core::DEFAULT_LIMIT,
            initial_offset: pagestore_core::DEFAULT_OFFSET,
            action_broadcast_capacity: 16,
        }
    }

    /// Set the initial page size
    #[must_use]
    pub const fn with_initial_limit(mut self, limit: i64) -> Self {
        self.initial_limit = limit;
        self
    }

    /// Set the initial cursor
    #[must_use]
    pub const fn with_initial_offset(mut self, offset: i64) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_action_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.action_broadcast_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
