//! State container holding the single live snapshot of application state.
//!
//! Snapshots are immutable and versioned: every commit replaces the previous
//! snapshot with a new one whose version is one higher. Observers receive the
//! current snapshot when they subscribe and every committed snapshot after.
//!
//! # Delivery order
//!
//! Commits from different threads are delivered one at a time, in version
//! order. An observer never receives a snapshot older than one it has already
//! seen, so its last delivered snapshot is always the current one.

use crate::dispatch::{Dispatcher, monotonic};
use crate::observer::{ObserverList, Subscription, deliver};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An immutable, versioned state value
#[derive(Debug)]
pub struct Snapshot<S> {
    version: u64,
    state: Arc<S>,
}

impl<S> Snapshot<S> {
    /// Sequential version, 0 for the initial state
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Shared handle to the state value
    #[must_use]
    pub const fn state(&self) -> &Arc<S> {
        &self.state
    }
}

impl<S> Clone for Snapshot<S> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            state: Arc::clone(&self.state),
        }
    }
}

impl<S> Deref for Snapshot<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.state
    }
}

/// Holder of the current [`Snapshot`]
///
/// Cloning a container yields another handle to the same state.
///
/// # Example
///
/// ```
/// use pagestore_core::state::StateContainer;
///
/// let container = StateContainer::new(1_i64);
/// assert_eq!(*container.get(), 1);
///
/// let version = container.update(|current| current + 41);
/// assert_eq!(version, 1);
/// assert_eq!(*container.get(), 42);
/// ```
pub struct StateContainer<S> {
    current: Arc<Mutex<Snapshot<S>>>,
    observers: Arc<ObserverList<Snapshot<S>>>,
    dispatcher: Arc<Dispatcher>,
}

impl<S: Send + Sync + 'static> StateContainer<S> {
    /// Create a container whose initial snapshot (version 0) is `initial`
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self {
            current: Arc::new(Mutex::new(Snapshot {
                version: 0,
                state: Arc::new(initial),
            })),
            observers: ObserverList::new("state"),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Current snapshot
    #[must_use]
    pub fn get(&self) -> Snapshot<S> {
        self.lock().clone()
    }

    /// Replace the snapshot and notify observers
    ///
    /// Returns the version of the committed snapshot.
    pub fn set(&self, state: S) -> u64 {
        self.update(|_| state)
    }

    /// Compute the next state from the current one and commit it
    ///
    /// Read, compute and replace happen under one lock, so concurrent updates
    /// never interleave. Observers run after the lock is released, and the
    /// commit has been delivered to every observer when this returns.
    pub fn update<F>(&self, next: F) -> u64
    where
        F: FnOnce(&S) -> S,
    {
        let version = {
            let mut current = self.lock();
            let state = next(&current.state);
            *current = Snapshot {
                version: current.version + 1,
                state: Arc::new(state),
            };

            // Queued under the state lock: delivery order is commit order
            let committed = current.clone();
            let observers = Arc::clone(&self.observers);
            self.dispatcher
                .enqueue(Box::new(move || observers.notify(&committed)));
            current.version
        };

        tracing::trace!(version, "State committed");
        self.dispatcher.drain();
        version
    }

    /// Observe the current snapshot and every later one
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Snapshot<S>) + Send + Sync + 'static,
    {
        let subscription = {
            let current = self.lock();
            let observer = monotonic(current.version, Snapshot::<S>::version, observer);
            let subscription = self.observers.add(Arc::clone(&observer));

            let replay = current.clone();
            self.dispatcher
                .enqueue(Box::new(move || deliver("state", &observer, &replay)));
            subscription
        };

        self.dispatcher.drain();
        subscription
    }

    pub(crate) fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Number of registered observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot<S>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Clone for StateContainer<S> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            observers: Arc::clone(&self.observers),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for StateContainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("StateContainer")
            .field("version", &current.version)
            .field("state", &*current.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_replays_current_then_follows_commits() {
        let container = StateContainer::new(0_i64);
        container.set(5);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription =
            container.subscribe(move |snapshot| sink.lock().unwrap().push((snapshot.version(), **snapshot)));

        container.set(6);
        container.update(|current| current * 2);

        assert_eq!(*seen.lock().unwrap(), vec![(1, 5), (2, 6), (3, 12)]);
    }

    #[test]
    fn versions_increase_by_one_per_commit() {
        let container = StateContainer::new(String::from("a"));
        assert_eq!(container.get().version(), 0);
        assert_eq!(container.set(String::from("b")), 1);
        assert_eq!(container.update(|s| format!("{s}c")), 2);
        assert_eq!(&*container.get(), "bc");
    }

    #[test]
    fn old_snapshots_stay_immutable() {
        let container = StateContainer::new(vec![1, 2, 3]);
        let before = container.get();

        container.update(|items| {
            let mut next = items.clone();
            next.push(4);
            next
        });

        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*container.get(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn observers_may_commit_from_inside_a_notification() {
        let container = StateContainer::new(0_i64);
        let inner = container.clone();
        let _subscription = container.subscribe(move |snapshot| {
            if **snapshot == 1 {
                inner.set(2);
            }
        });

        container.set(1);

        assert_eq!(*container.get(), 2);
        assert_eq!(container.get().version(), 2);
    }

    #[test]
    fn concurrent_commits_reach_observers_in_version_order() {
        let container = StateContainer::new(0_u64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = container.subscribe(move |snapshot| sink.lock().unwrap().push(snapshot.version()));

        let writers: Vec<_> = (0..2)
            .map(|_| {
                let container = container.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        container.update(|count| count + 1);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(*container.get(), 1000);
        assert_eq!(*seen.lock().unwrap(), (0..=1000).collect::<Vec<u64>>());
    }

    #[test]
    fn late_subscribers_end_on_the_current_snapshot_under_contention() {
        let container = StateContainer::new(0_u64);
        let writer = {
            let container = container.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    container.update(|count| count + 1);
                }
            })
        };

        let mut recorded = Vec::new();
        for _ in 0..20 {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            let _subscription = container.subscribe(move |snapshot| sink.lock().unwrap().push(**snapshot));
            recorded.push(seen);
        }
        writer.join().unwrap();

        for seen in recorded {
            let seen = seen.lock().unwrap();
            assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "went backwards: {seen:?}");
            assert_eq!(seen.last(), Some(&1000));
        }
    }

    #[test]
    fn clones_share_state() {
        let a = StateContainer::new(1_u8);
        let b = a.clone();
        b.set(9);
        assert_eq!(*a.get(), 9);
    }
}
