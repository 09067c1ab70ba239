//! Store module - the page store runtime
//!
//! The [`Store`] owns the state container, the action bus, the selectors and
//! the effects, and wires them together at construction:
//!
//! 1. Reducer bindings (one per state-changing channel)
//! 2. The load and failure-log effects
//! 3. The action broadcast forwarders (last, so async observers see
//!    committed state)

use crate::bus::ActionBus;
use crate::effects::{LoadEffect, LoadStatus, SwitchLatest, install_failure_log};
use crate::{StoreConfig, StoreError};
use pagestore_core::{
    PageAction, PageFetcher, PageState, Selector, Snapshot, StateContainer, Subscription, bind,
    reducers,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// The Store - runtime coordinator for a paginated list
///
/// The Store manages:
/// 1. State (a versioned [`StateContainer`] of [`PageState`])
/// 2. Actions (an [`ActionBus`] with one channel per action kind)
/// 3. Selectors for `limit`, `offset` and `items`
/// 4. The load effect (last-request-wins) and the failure log
///
/// Cloning a store yields another handle to the same state.
///
/// # Type Parameters
///
/// - `T`: Item type returned by the fetcher
///
/// # Example
///
/// ```ignore
/// let store = Store::new(PokeApiClient::new(config)?)?;
///
/// let _sub = store.items().subscribe(|items| render(items));
/// store.increase_offset(10);
/// store.request_load();
/// ```
pub struct Store<T> {
    container: StateContainer<PageState<T>>,
    bus: ActionBus<T>,
    limit: Selector<i64>,
    offset: Selector<i64>,
    items: Selector<Arc<[T]>>,
    switch: Arc<SwitchLatest>,
}

impl<T> Store<T>
where
    T: Send + Sync + 'static,
{
    /// Create a store with default configuration on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] if called outside a tokio runtime.
    pub fn new<F>(fetcher: F) -> Result<Self, StoreError>
    where
        F: PageFetcher<T> + 'static,
    {
        Self::with_config(fetcher, StoreConfig::default())
    }

    /// Create a store with custom configuration on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] if called outside a tokio runtime.
    pub fn with_config<F>(fetcher: F, config: StoreConfig) -> Result<Self, StoreError>
    where
        F: PageFetcher<T> + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        Ok(Self::with_handle(fetcher, config, runtime))
    }

    /// Create a store whose effects run on `runtime`
    #[must_use]
    pub fn with_handle<F>(fetcher: F, config: StoreConfig, runtime: Handle) -> Self
    where
        F: PageFetcher<T> + 'static,
    {
        let container = StateContainer::new(PageState::new(config.initial_limit, config.initial_offset));
        let bus = ActionBus::new(config.action_broadcast_capacity);

        let limit = Selector::new(&container, |state: &PageState<T>| state.limit);
        let offset = Selector::new(&container, |state: &PageState<T>| state.offset);
        let items = Selector::with_equality(
            &container,
            |state: &PageState<T>| Arc::clone(&state.items),
            |a: &Arc<[T]>, b: &Arc<[T]>| Arc::ptr_eq(a, b),
        );

        // Bindings live as long as their channels
        let _bindings: [Subscription; 5] = [
            bind(bus.load_succeeded(), &container, reducers::replace_items::<T>),
            bind(bus.increase_limit(), &container, reducers::increase_limit::<T>),
            bind(bus.decrease_limit(), &container, reducers::decrease_limit::<T>),
            bind(bus.increase_offset(), &container, reducers::increase_offset::<T>),
            bind(bus.decrease_offset(), &container, reducers::decrease_offset::<T>),
        ];

        let switch = Arc::new(SwitchLatest::new());
        let _load = LoadEffect {
            limit: limit.clone(),
            offset: offset.clone(),
            fetcher: Arc::new(fetcher),
            switch: Arc::clone(&switch),
            runtime,
        }
        .install(&bus);
        let _failure_log = install_failure_log(&bus);

        let _forwarders = bus.attach_broadcast();

        tracing::debug!(
            limit = config.initial_limit,
            offset = config.initial_offset,
            "Store created"
        );

        Self {
            container,
            bus,
            limit,
            offset,
            items,
            switch,
        }
    }

    /// Current state snapshot
    #[must_use]
    pub fn state(&self) -> Snapshot<PageState<T>> {
        self.container.get()
    }

    /// Observe the full state: current snapshot now, every commit after
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Snapshot<PageState<T>>) + Send + Sync + 'static,
    {
        self.container.subscribe(observer)
    }

    /// Page size selector (value equality)
    #[must_use]
    pub fn limit(&self) -> Selector<i64> {
        self.limit.clone()
    }

    /// Cursor selector (value equality)
    #[must_use]
    pub fn offset(&self) -> Selector<i64> {
        self.offset.clone()
    }

    /// Items selector
    ///
    /// De-duplicated by pointer identity: a new emission happens only when a
    /// load replaces the items, even if the new items compare equal.
    #[must_use]
    pub fn items(&self) -> Selector<Arc<[T]>> {
        self.items.clone()
    }

    /// Custom selector over the state, de-duplicated by value
    #[must_use]
    pub fn select<U, P>(&self, project: P) -> Selector<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        P: Fn(&PageState<T>) -> U + Send + Sync + 'static,
    {
        Selector::new(&self.container, project)
    }

    /// The action channels
    #[must_use]
    pub const fn actions(&self) -> &ActionBus<T> {
        &self.bus
    }

    /// Route an action to its channel
    #[tracing::instrument(skip(self, action), fields(action = action.name()), name = "store_send")]
    pub fn send(&self, action: PageAction<T>) {
        self.bus.send(action);
    }

    /// Add `delta` to the page size
    pub fn increase_limit(&self, delta: i64) {
        self.send(PageAction::IncreaseLimit(delta));
    }

    /// Subtract `delta` from the page size
    pub fn decrease_limit(&self, delta: i64) {
        self.send(PageAction::DecreaseLimit(delta));
    }

    /// Move the cursor forward by `delta`
    pub fn increase_offset(&self, delta: i64) {
        self.send(PageAction::IncreaseOffset(delta));
    }

    /// Move the cursor back by `delta`
    pub fn decrease_offset(&self, delta: i64) {
        self.send(PageAction::DecreaseOffset(delta));
    }

    /// Fetch the page for the current window
    ///
    /// Returns immediately; the outcome arrives later as `load_succeeded` or
    /// `load_failed`. Supersedes any load still in flight.
    pub fn request_load(&self) {
        self.send(PageAction::RequestLoad);
    }

    /// Status of the load effect
    #[must_use]
    pub fn load_status(&self) -> LoadStatus {
        self.switch.status()
    }

    /// Subscribe to all actions from this store
    ///
    /// Returns a broadcast receiver that gets a clone of every action after
    /// its state change (if any) has been committed.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<PageAction<T>> {
        self.bus.subscribe_actions()
    }

    /// Send an action and wait for a matching action
    ///
    /// Subscribes to the action broadcast before sending, so a fast effect
    /// cannot slip past. The sent action itself is also observed, so the
    /// predicate should select the terminal action only.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: no matching action before `timeout`
    /// - [`StoreError::ChannelClosed`]: the action broadcast closed
    ///
    /// # Example
    ///
    /// ```ignore
    /// let outcome = store
    ///     .send_and_wait_for(PageAction::RequestLoad, PageAction::is_load_outcome, Duration::from_secs(10))
    ///     .await?;
    /// ```
    pub async fn send_and_wait_for<P>(
        &self,
        action: PageAction<T>,
        predicate: P,
        timeout: Duration,
    ) -> Result<PageAction<T>, StoreError>
    where
        P: Fn(&PageAction<T>) -> bool,
    {
        // Subscribe BEFORE sending to avoid race condition
        let mut rx = self.bus.subscribe_actions();
        self.send(action);

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            bus: self.bus.clone(),
            limit: self.limit.clone(),
            offset: self.offset.clone(),
            items: self.items.clone(),
            switch: Arc::clone(&self.switch),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.container)
            .field("load", &self.switch)
            .finish_non_exhaustive()
    }
}
