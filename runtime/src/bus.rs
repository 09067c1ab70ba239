//! Action bus - one typed channel per action kind.
//!
//! Callers either emit on a channel directly or go through
//! [`ActionBus::send`], which routes a [`PageAction`] to its channel. Every
//! emission is also forwarded to an async broadcast so that request/response
//! callers and streaming observers can watch actions without registering
//! synchronous observers.

use crate::metrics::ActionMetrics;
use pagestore_core::{FetchError, PageAction, Subject, Subscription};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Named, typed action channels for a page store
pub struct ActionBus<T> {
    increase_limit: Subject<i64>,
    decrease_limit: Subject<i64>,
    increase_offset: Subject<i64>,
    decrease_offset: Subject<i64>,
    request_load: Subject<()>,
    load_succeeded: Subject<Arc<[T]>>,
    load_failed: Subject<FetchError>,
    broadcast: broadcast::Sender<PageAction<T>>,
}

impl<T: Send + Sync + 'static> ActionBus<T> {
    /// Create a bus whose action broadcast buffers `capacity` actions
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(capacity.max(1));

        Self {
            increase_limit: Subject::new("increase_limit"),
            decrease_limit: Subject::new("decrease_limit"),
            increase_offset: Subject::new("increase_offset"),
            decrease_offset: Subject::new("decrease_offset"),
            request_load: Subject::new("request_load"),
            load_succeeded: Subject::new("load_succeeded"),
            load_failed: Subject::new("load_failed"),
            broadcast,
        }
    }

    /// `increase_limit(n)` channel
    #[must_use]
    pub const fn increase_limit(&self) -> &Subject<i64> {
        &self.increase_limit
    }

    /// `decrease_limit(n)` channel
    #[must_use]
    pub const fn decrease_limit(&self) -> &Subject<i64> {
        &self.decrease_limit
    }

    /// `increase_offset(n)` channel
    #[must_use]
    pub const fn increase_offset(&self) -> &Subject<i64> {
        &self.increase_offset
    }

    /// `decrease_offset(n)` channel
    #[must_use]
    pub const fn decrease_offset(&self) -> &Subject<i64> {
        &self.decrease_offset
    }

    /// `request_load()` channel
    #[must_use]
    pub const fn request_load(&self) -> &Subject<()> {
        &self.request_load
    }

    /// `load_succeeded(items)` channel
    #[must_use]
    pub const fn load_succeeded(&self) -> &Subject<Arc<[T]>> {
        &self.load_succeeded
    }

    /// `load_failed(error)` channel
    #[must_use]
    pub const fn load_failed(&self) -> &Subject<FetchError> {
        &self.load_failed
    }

    /// Route an action to its channel
    ///
    /// Reducers bound to the channel have committed by the time this returns.
    pub fn send(&self, action: PageAction<T>) {
        tracing::debug!(action = action.name(), "Routing action");

        match action {
            PageAction::IncreaseLimit(delta) => self.increase_limit.emit(delta),
            PageAction::DecreaseLimit(delta) => self.decrease_limit.emit(delta),
            PageAction::IncreaseOffset(delta) => self.increase_offset.emit(delta),
            PageAction::DecreaseOffset(delta) => self.decrease_offset.emit(delta),
            PageAction::RequestLoad => self.request_load.emit(()),
            PageAction::LoadSucceeded(items) => self.load_succeeded.emit(items),
            PageAction::LoadFailed(error) => self.load_failed.emit(error),
        }
    }

    /// Receive every action emitted on the bus after this call
    ///
    /// Lagging receivers skip actions (`RecvError::Lagged`) rather than
    /// blocking emitters.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<PageAction<T>> {
        self.broadcast.subscribe()
    }

    /// Forward every channel to the action broadcast
    ///
    /// Registered after the reducer bindings so async observers only see an
    /// action once its state change has been committed.
    pub(crate) fn attach_broadcast(&self) -> Vec<Subscription> {
        vec![
            self.forward(&self.increase_limit, |delta| PageAction::IncreaseLimit(*delta)),
            self.forward(&self.decrease_limit, |delta| PageAction::DecreaseLimit(*delta)),
            self.forward(&self.increase_offset, |delta| PageAction::IncreaseOffset(*delta)),
            self.forward(&self.decrease_offset, |delta| PageAction::DecreaseOffset(*delta)),
            self.forward(&self.request_load, |()| PageAction::RequestLoad),
            self.forward(&self.load_succeeded, |items| {
                PageAction::LoadSucceeded(Arc::clone(items))
            }),
            self.forward(&self.load_failed, |error| PageAction::LoadFailed(error.clone())),
        ]
    }

    fn forward<P: 'static>(
        &self,
        channel: &Subject<P>,
        wrap: fn(&P) -> PageAction<T>,
    ) -> Subscription {
        let sender = self.broadcast.clone();
        let name = channel.name();

        channel.subscribe(move |payload| {
            ActionMetrics::record(name);
            // No receivers is the common case
            let _ = sender.send(wrap(payload));
        })
    }
}

impl<T> Clone for ActionBus<T> {
    fn clone(&self) -> Self {
        Self {
            increase_limit: self.increase_limit.clone(),
            decrease_limit: self.decrease_limit.clone(),
            increase_offset: self.increase_offset.clone(),
            decrease_offset: self.decrease_offset.clone(),
            request_load: self.request_load.clone(),
            load_succeeded: self.load_succeeded.clone(),
            load_failed: self.load_failed.clone(),
            broadcast: self.broadcast.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ActionBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionBus")
            .field("broadcast_receivers", &self.broadcast.receiver_count())
            .finish_non_exhaustive()
    }
}
