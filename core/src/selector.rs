//! Derived, de-duplicated, replay-latest views over a [`StateContainer`].
//!
//! A [`Selector`] subscribes to its container once, applies its projection
//! once per snapshot, and fans the result out to any number of subscribers.
//! Subscribers receive the latest projected value immediately and afterwards
//! only values that differ from the previous emission.
//!
//! Emissions share the delivery order of the container: a subscriber never
//! receives a value older than one it has already seen.
//!
//! # Equality
//!
//! [`Selector::new`] compares projected values with `PartialEq`.
//! [`Selector::with_equality`] takes an explicit comparison, e.g.
//! [`Arc::ptr_eq`] for shared collections that are replaced wholesale.
//!
//! # Example
//!
//! ```
//! use pagestore_core::{selector::Selector, state::StateContainer};
//! use std::sync::{Arc, Mutex};
//!
//! let container = StateContainer::new((1_i64, 'a'));
//! let first = Selector::new(&container, |state: &(i64, char)| state.0);
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let _sub = first.subscribe(move |value| sink.lock().unwrap().push(*value));
//!
//! container.set((1, 'b'));
//! container.set((2, 'b'));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! ```

use crate::dispatch::{Dispatcher, monotonic};
use crate::observer::{Observer, ObserverList, Subscription, deliver};
use crate::state::StateContainer;
use futures::Stream;
use futures::channel::mpsc;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

struct Cached<T> {
    version: u64,
    value: T,
}

/// A value tagged with the snapshot version it was projected from
type Emission<T> = (u64, T);

struct SelectorInner<T> {
    cache: Mutex<Cached<T>>,
    observers: Arc<ObserverList<Emission<T>>>,
    dispatcher: Arc<Dispatcher>,
    upstream: Mutex<Option<Subscription>>,
}

impl<T: Clone + Send + Sync + 'static> SelectorInner<T> {
    fn lock(&self) -> MutexGuard<'_, Cached<T>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a projected value for `version`, emitting it if it changed.
    /// Versions at or below the cached one are stale and ignored.
    fn accept<E>(&self, version: u64, value: T, equal: &E)
    where
        E: Fn(&T, &T) -> bool,
    {
        let changed = {
            let mut cache = self.lock();
            if version <= cache.version {
                return;
            }
            cache.version = version;
            if equal(&cache.value, &value) {
                false
            } else {
                cache.value = value.clone();
                true
            }
        };

        if changed {
            tracing::trace!(version, "Selector emitting");
            self.observers.notify(&(version, value));
        }
    }
}

impl<T> Drop for SelectorInner<T> {
    fn drop(&mut self) {
        let upstream = self
            .upstream
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = upstream {
            subscription.unsubscribe();
        }
    }
}

/// Shared, cached projection of a state container
///
/// Clones share the same underlying computation. The container subscription
/// is released when the last clone is dropped.
pub struct Selector<T> {
    inner: Arc<SelectorInner<T>>,
}

impl<T> Selector<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Select with value equality
    #[must_use]
    pub fn new<S, P>(container: &StateContainer<S>, project: P) -> Self
    where
        S: Send + Sync + 'static,
        P: Fn(&S) -> T + Send + Sync + 'static,
    {
        Self::with_equality(container, project, |a: &T, b: &T| a == b)
    }
}

impl<T> Selector<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Select with a custom equality used for de-duplication
    #[must_use]
    pub fn with_equality<S, P, E>(container: &StateContainer<S>, project: P, equal: E) -> Self
    where
        S: Send + Sync + 'static,
        P: Fn(&S) -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let initial = container.get();
        let inner = Arc::new(SelectorInner {
            cache: Mutex::new(Cached {
                version: initial.version(),
                value: project(&*initial),
            }),
            observers: ObserverList::new("selector"),
            dispatcher: Arc::clone(container.dispatcher()),
            upstream: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = container.subscribe(move |snapshot| {
            if let Some(inner) = weak.upgrade() {
                inner.accept(snapshot.version(), project(&**snapshot), &equal);
            }
        });

        *inner.upstream.lock().unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        Self { inner }
    }

    /// Most recently emitted value
    #[must_use]
    pub fn latest(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Receive the latest value now and every distinct value after
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let (observer, latest, subscription) = {
            let cache = self.inner.lock();
            let observer: Observer<Emission<T>> = monotonic(
                cache.version,
                |emission: &Emission<T>| emission.0,
                move |emission: &Emission<T>| observer(&emission.1),
            );
            let subscription = self.inner.observers.add(Arc::clone(&observer));
            (observer, (cache.version, cache.value.clone()), subscription)
        };

        self.inner
            .dispatcher
            .run(Box::new(move || deliver("selector", &observer, &latest)));
        subscription
    }

    /// Consume the selector as an async stream
    ///
    /// The first item is the latest value. Dropping the stream unsubscribes.
    #[must_use]
    pub fn stream(&self) -> SelectorStream<T> {
        let (sender, receiver) = mpsc::unbounded();
        let subscription = self.subscribe(move |value: &T| {
            let _ = sender.unbounded_send(value.clone());
        });

        SelectorStream {
            receiver,
            subscription: Some(subscription),
        }
    }

    /// Number of downstream subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.observers.len()
    }
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.inner.cache.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Selector")
            .field("version", &cache.version)
            .field("latest", &cache.value)
            .finish_non_exhaustive()
    }
}

/// Stream of selector values returned by [`Selector::stream`]
#[derive(Debug)]
pub struct SelectorStream<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    subscription: Option<Subscription>,
}

impl<T> Stream for SelectorStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.get_mut().receiver).poll_next(cx)
    }
}

impl<T> Drop for SelectorStream<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Pair {
        left: i64,
        right: Arc<[u8]>,
    }

    fn record<T: Clone + Send + Sync + 'static>(
        selector: &Selector<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = selector.subscribe(move |value: &T| sink.lock().unwrap().push(value.clone()));
        (seen, subscription)
    }

    #[test]
    fn unchanged_projection_is_not_re_emitted() {
        let container = StateContainer::new(Pair { left: 1, right: Arc::from(vec![]) });
        let left = Selector::new(&container, |pair: &Pair| pair.left);
        let (seen, _sub) = record(&left);

        container.update(|pair| Pair { left: pair.left, right: Arc::from(vec![9]) });
        container.update(|pair| Pair { left: pair.left + 1, ..pair.clone() });

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn late_subscriber_gets_latest_value() {
        let container = StateContainer::new(Pair { left: 1, right: Arc::from(vec![]) });
        let left = Selector::new(&container, |pair: &Pair| pair.left);

        container.update(|pair| Pair { left: 7, ..pair.clone() });

        let (seen, _sub) = record(&left);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
        assert_eq!(left.latest(), 7);
    }

    #[test]
    fn pointer_equality_ignores_unrelated_changes() {
        let container = StateContainer::new(Pair { left: 0, right: Arc::from(vec![1, 2]) });
        let right = Selector::with_equality(
            &container,
            |pair: &Pair| Arc::clone(&pair.right),
            |a: &Arc<[u8]>, b: &Arc<[u8]>| Arc::ptr_eq(a, b),
        );
        let (seen, _sub) = record(&right);

        container.update(|pair| Pair { left: pair.left + 1, ..pair.clone() });
        assert_eq!(seen.lock().unwrap().len(), 1);

        // Same contents, new allocation: emitted by reference equality.
        container.update(|pair| Pair { right: Arc::from(vec![1, 2]), ..pair.clone() });
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn projection_runs_once_per_snapshot_regardless_of_subscribers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let container = StateContainer::new(0_i64);
        let doubled = Selector::new(&container, move |value: &i64| {
            counter.fetch_add(1, Ordering::SeqCst);
            value * 2
        });

        let (_a, _sa) = record(&doubled);
        let (_b, _sb) = record(&doubled.clone());
        let (_c, _sc) = record(&doubled);
        let before = calls.load(Ordering::SeqCst);

        container.set(1);
        container.set(2);

        assert_eq!(calls.load(Ordering::SeqCst) - before, 2);
        assert_eq!(doubled.subscriber_count(), 3);
    }

    #[test]
    fn dropping_last_clone_releases_container_subscription() {
        let container = StateContainer::new(0_i64);
        let baseline = container.observer_count();

        let selector = Selector::new(&container, |value: &i64| *value);
        let clone = selector.clone();
        assert_eq!(container.observer_count(), baseline + 1);

        drop(selector);
        assert_eq!(container.observer_count(), baseline + 1);
        drop(clone);
        assert_eq!(container.observer_count(), baseline);
    }

    #[test]
    fn subscribers_end_on_latest_when_commits_race() {
        let container = StateContainer::new(0_i64);
        let counter = Selector::new(&container, |value: &i64| *value);
        let (seen, _sub) = record(&counter);

        let writers: Vec<_> = (0..2)
            .map(|_| {
                let container = container.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        container.update(|value| value + 1);
                    }
                })
            })
            .collect();
        let mut late = Vec::new();
        for _ in 0..10 {
            late.push(record(&counter));
        }
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(counter.latest(), 1000);
        assert_eq!(*seen.lock().unwrap(), (0..=1000).collect::<Vec<i64>>());
        for (values, _sub) in late {
            let values = values.lock().unwrap();
            assert!(values.windows(2).all(|pair| pair[0] < pair[1]), "went backwards: {values:?}");
            assert_eq!(values.last(), Some(&1000));
        }
    }

    #[tokio::test]
    async fn stream_starts_with_latest_and_follows_changes() {
        let container = StateContainer::new(3_i64);
        let selector = Selector::new(&container, |value: &i64| *value);
        let mut stream = selector.stream();

        container.set(3);
        container.set(4);

        assert_eq!(stream.next().await, Some(3));
        assert_eq!(stream.next().await, Some(4));

        drop(stream);
        assert_eq!(selector.subscriber_count(), 0);
    }

    #[test]
    fn stream_is_woken_only_by_distinct_values() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let container = StateContainer::new((1_i64, 'a'));
        let selector = Selector::new(&container, |state: &(i64, char)| state.0);
        let mut stream = task::spawn(selector.stream());

        assert_ready_eq!(stream.poll_next(), Some(1));
        assert_pending!(stream.poll_next());

        container.set((1, 'b'));
        assert!(!stream.is_woken());

        container.set((2, 'b'));
        assert!(stream.is_woken());
        assert_ready_eq!(stream.poll_next(), Some(2));
    }
}
