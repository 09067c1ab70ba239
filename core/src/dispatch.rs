//! Serialized delivery of notifications for one state container.
//!
//! Commits may happen on any thread, but their notifications must reach
//! observers one at a time and in commit order. Every delivery is queued as a
//! job; one thread at a time drains the queue while the others wait for it to
//! finish. A thread that is already draining runs nested jobs in place, so
//! observers may commit from inside a notification.

use crate::observer::Observer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// One queued delivery
pub(crate) type Job = Box<dyn FnOnce() + Send>;

struct Queue {
    jobs: VecDeque<Job>,
    drainer: Option<ThreadId>,
}

/// Job queue with a single active drainer
pub(crate) struct Dispatcher {
    queue: Mutex<Queue>,
    idle: Condvar,
}

impl Dispatcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                drainer: None,
            }),
            idle: Condvar::new(),
        })
    }

    /// Queue a job without running it
    ///
    /// Callers that enqueue under their own lock fix the delivery order to
    /// that lock's order.
    pub(crate) fn enqueue(&self, job: Job) {
        self.lock().jobs.push_back(job);
    }

    /// Queue a job and drain
    pub(crate) fn run(&self, job: Job) {
        self.enqueue(job);
        self.drain();
    }

    /// Run queued jobs until the queue is empty
    ///
    /// Returns once every job queued before the call has run, either on this
    /// thread or on the thread that was draining when it was called.
    pub(crate) fn drain(&self) {
        let current = thread::current().id();
        let mut queue = self.lock();

        let nested = queue.drainer == Some(current);
        if !nested {
            while queue.drainer.is_some() {
                queue = self.idle.wait(queue).unwrap_or_else(PoisonError::into_inner);
            }
            queue.drainer = Some(current);
        }

        while let Some(job) = queue.jobs.pop_front() {
            drop(queue);
            job();
            queue = self.lock();
        }

        if !nested {
            queue.drainer = None;
            drop(queue);
            self.idle.notify_all();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wrap `observer` so it only sees versions from `first` on, each at most once
///
/// Only sound for observers whose deliveries go through one [`Dispatcher`].
pub(crate) fn monotonic<T, F>(first: u64, version_of: fn(&T) -> u64, observer: F) -> Observer<T>
where
    T: 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    // Deliveries are serialized, so relaxed ordering is enough
    let next = AtomicU64::new(first);
    Arc::new(move |value: &T| {
        let version = version_of(value);
        if version < next.load(Ordering::Relaxed) {
            return;
        }
        next.store(version + 1, Ordering::Relaxed);
        observer(value);
    })
}
