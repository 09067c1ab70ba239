//! # Pagestore Core
//!
//! Core primitives for a client-side state container that sits between UI
//! code and a paginated list endpoint.
//!
//! ## Core Concepts
//!
//! - **Subject**: a named, typed action channel (multicast, no replay)
//! - **State Container**: the single versioned snapshot of application state
//! - **Selector**: a cached, de-duplicated, replay-latest projection of state
//! - **Reducer**: a pure `(state, payload) → state` transition bound to a channel
//! - **Environment**: the injected [`PageFetcher`](environment::PageFetcher)
//!
//! ## Data Flow
//!
//! ```text
//! caller ──► Subject ──► bind(reducer) ──► StateContainer ──► Selector ──► UI
//!               ▲                                                 │
//!               └──────────── effects (runtime crate) ◄───────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use pagestore_core::{PageState, Selector, StateContainer, Subject, bind, reducers};
//!
//! let container = StateContainer::new(PageState::<String>::default());
//! let increase_limit = Subject::new("increase_limit");
//! let _binding = bind(&increase_limit, &container, reducers::increase_limit::<String>);
//!
//! let limit = Selector::new(&container, |state: &PageState<String>| state.limit);
//! increase_limit.emit(5);
//! assert_eq!(limit.latest(), 15);
//! ```

/// Observer plumbing and action channels
pub mod observer;

/// Versioned state container
pub mod state;

/// Ordered delivery of container notifications
mod dispatch;

/// Derived selectors
pub mod selector;

/// Reducer trait and channel bindings
pub mod reducer;

/// Pagination state, actions and reducers
pub mod page;

/// Injected dependencies
pub mod environment;

// Re-export commonly used types
pub use environment::{FetchError, FetchFuture, PageFetcher};
pub use observer::{Observer, Subject, Subscription, SubscriptionGuard};
pub use page::{DEFAULT_LIMIT, DEFAULT_OFFSET, PageAction, PageState, reducers};
pub use reducer::{Reducer, bind};
pub use selector::{Selector, SelectorStream};
pub use state::{Snapshot, StateContainer};
