//! Observer plumbing shared by every observable in the crate.
//!
//! A [`Subject`] is the simplest observable: a multicast channel with no
//! buffering and no replay. [`StateContainer`](crate::state::StateContainer)
//! and [`Selector`](crate::selector::Selector) reuse the same observer list
//! and [`Subscription`] handle.
//!
//! # Fault isolation
//!
//! Observers are invoked one by one. A panicking observer is caught, logged,
//! and skipped so the remaining observers of the same notification still run.
//!
//! # Example
//!
//! ```
//! use pagestore_core::observer::Subject;
//! use std::sync::{Arc, Mutex};
//!
//! let subject = Subject::new("increase_limit");
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let subscription = subject.subscribe(move |delta: &i64| {
//!     sink.lock().unwrap().push(*delta);
//! });
//!
//! subject.emit(5);
//! subscription.unsubscribe();
//! subject.emit(7);
//!
//! assert_eq!(*seen.lock().unwrap(), vec![5]);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Callback registered on an observable
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Removal side of an observer list, erased over the value type so
/// [`Subscription`] does not need a type parameter.
trait Detach: Send + Sync {
    fn detach(&self, id: u64);
    fn contains(&self, id: u64) -> bool;
}

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Observer<T>)>,
}

/// Ordered list of observers with panic-isolated delivery
pub(crate) struct ObserverList<T> {
    source: &'static str,
    registry: Mutex<Registry<T>>,
}

impl<T: 'static> ObserverList<T> {
    pub(crate) fn new(source: &'static str) -> Arc<Self> {
        Arc::new(Self {
            source,
            registry: Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            }),
        })
    }

    /// Register an observer at the end of the list
    pub(crate) fn add(self: &Arc<Self>, observer: Observer<T>) -> Subscription {
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, observer));
            id
        };

        let source: Weak<dyn Detach> = Arc::<Self>::downgrade(self);
        Subscription { id, source }
    }

    /// Notify every observer registered at the time of the call, in
    /// registration order. The lock is released before any observer runs.
    pub(crate) fn notify(&self, value: &T) {
        let observers: Vec<Observer<T>> = self
            .lock()
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in &observers {
            deliver(self.source, observer, value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: 'static> Detach for ObserverList<T> {
    fn detach(&self, id: u64) {
        self.lock().entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn contains(&self, id: u64) -> bool {
        self.lock().entries.iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// Invoke a single observer, isolating panics
pub(crate) fn deliver<T>(source: &'static str, observer: &Observer<T>, value: &T) {
    if panic::catch_unwind(AssertUnwindSafe(|| observer(value))).is_err() {
        tracing::error!(source, "Observer panicked, continuing with remaining observers");
    }
}

/// Handle returned by every `subscribe` call
///
/// The observer stays registered until [`Subscription::unsubscribe`] is
/// called. Dropping the handle does not unsubscribe, which lets bindings that
/// live as long as their source discard it. Short-lived observers should use
/// [`Subscription::detach_on_drop`] instead.
#[derive(Debug)]
#[must_use = "dropping a Subscription keeps the observer registered; use `unsubscribe` or `detach_on_drop`"]
pub struct Subscription {
    id: u64,
    source: Weak<dyn Detach>,
}

impl Subscription {
    /// Remove the observer from its source
    ///
    /// A no-op if the source has already been dropped.
    pub fn unsubscribe(self) {
        if let Some(source) = self.source.upgrade() {
            source.detach(self.id);
        }
    }

    /// Whether the observer is still registered
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.source
            .upgrade()
            .is_some_and(|source| source.contains(self.id))
    }

    /// Tie the observer's lifetime to the returned guard
    pub fn detach_on_drop(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: Some(self),
        }
    }
}

/// Subscription that unsubscribes when dropped
///
/// Created by [`Subscription::detach_on_drop`].
#[derive(Debug)]
#[must_use = "the observer is detached as soon as the guard is dropped"]
pub struct SubscriptionGuard {
    subscription: Option<Subscription>,
}

impl SubscriptionGuard {
    /// Whether the observer is still registered
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

/// Multicast event channel with no buffering and no replay
///
/// `emit` synchronously notifies the observers registered at that moment.
/// Observers that subscribe later never see past values, and emitting with no
/// observers drops the value.
pub struct Subject<T> {
    name: &'static str,
    observers: Arc<ObserverList<T>>,
}

impl<T: 'static> Subject<T> {
    /// Create a named channel
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            observers: ObserverList::new(name),
        }
    }

    /// Channel name, used in logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Register an observer for future emissions
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observers.add(Arc::new(observer))
    }

    /// Push a value to the current observers
    pub fn emit(&self, value: T) {
        tracing::trace!(channel = self.name, "Emitting on channel");
        self.observers.notify(&value);
    }

    /// Number of registered observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
