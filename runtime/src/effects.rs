//! Effects - asynchronous reactions to actions.
//!
//! Two effects are installed on every store:
//!
//! - **load**: reacts to `request_load`, reads the latest `limit` and
//!   `offset`, runs the fetch on the tokio runtime, and emits
//!   `load_succeeded` or `load_failed`. Only the most recent request may
//!   affect state (see [`SwitchLatest`]).
//! - **failure log**: reacts to `load_failed` by logging the error.
//!
//! # Load cycle
//!
//! ```text
//! Idle ──request──► Requesting(g) ──ok──► Succeeded ──► Idle
//!                        │    └─────err──► Failed ────► Idle
//!                        └──request──► Requesting(g + 1)   (g is discarded)
//! ```
//!
//! Outcomes settle one at a time: the generation check and the emission of
//! the outcome (with the commits it triggers) form one critical section, so
//! a newer result can never be overwritten by an older one.

use crate::bus::ActionBus;
use crate::metrics::LoadMetrics;
use futures::FutureExt;
use pagestore_core::{FetchError, PageFetcher, Selector, Subject, Subscription};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Observable status of the load effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No fetch in flight
    Idle,

    /// A fetch is in flight for the given request generation
    Requesting {
        /// Generation of the in-flight request (starts at 1)
        generation: u64,
    },
}

impl LoadStatus {
    /// Check if a fetch is in flight
    #[must_use]
    pub const fn is_requesting(self) -> bool {
        matches!(self, Self::Requesting { .. })
    }
}

struct InFlight {
    generation: u64,
    task: AbortHandle,
}

struct Cycle {
    generation: u64,
    in_flight: Option<InFlight>,
}

/// Last-request-wins coordination for one asynchronous pipeline
///
/// Each started request gets a new generation. A completion is applied only
/// if its generation is still the in-flight one; anything older was
/// superseded and is dropped. Superseded tasks are also aborted, which is
/// best-effort: a task that already passed its last await point runs on but
/// still fails the generation check.
///
/// Results are applied through [`SwitchLatest::settle`], which admits one
/// result at a time.
pub struct SwitchLatest {
    cycle: Mutex<Cycle>,
    turn: Mutex<()>,
}

impl SwitchLatest {
    /// Create an idle coordinator
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cycle: Mutex::new(Cycle {
                generation: 0,
                in_flight: None,
            }),
            turn: Mutex::new(()),
        }
    }

    /// Start a new generation, superseding whatever is in flight
    ///
    /// `spawn` receives the new generation and returns the abort handle of
    /// the task it started. It runs under the coordinator lock so that a fast
    /// task cannot complete before it is registered.
    pub fn start<F>(&self, spawn: F) -> u64
    where
        F: FnOnce(u64) -> AbortHandle,
    {
        let mut cycle = self.lock();
        cycle.generation += 1;
        let generation = cycle.generation;

        if let Some(previous) = cycle.in_flight.take() {
            previous.task.abort();
            LoadMetrics::record_superseded();
            tracing::debug!(
                superseded = previous.generation,
                generation,
                "Superseding in-flight load"
            );
        }

        let task = spawn(generation);
        cycle.in_flight = Some(InFlight { generation, task });
        generation
    }

    /// Settle `generation`; returns `true` if it was still current
    pub fn complete(&self, generation: u64) -> bool {
        let mut cycle = self.lock();
        match &cycle.in_flight {
            Some(in_flight) if in_flight.generation == generation => {
                cycle.in_flight = None;
                true
            },
            _ => false,
        }
    }

    /// Settle `generation` and, if it was still current, run `apply`
    ///
    /// Settles are serialized: `apply` finishes before any other generation
    /// is checked. A request started while `apply` runs gets a later turn, so
    /// its result lands after this one. `apply` must not call `settle`.
    pub fn settle<R, F>(&self, generation: u64, apply: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let _turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        if self.complete(generation) {
            Some(apply())
        } else {
            None
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.lock()
            .in_flight
            .as_ref()
            .map_or(LoadStatus::Idle, |in_flight| LoadStatus::Requesting {
                generation: in_flight.generation,
            })
    }

    fn lock(&self) -> MutexGuard<'_, Cycle> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SwitchLatest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SwitchLatest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchLatest")
            .field("status", &self.status())
            .finish()
    }
}

/// RAII guard that settles a generation when the load task ends
///
/// Covers tasks that are aborted or whose fetcher panics, so the status
/// never stays `Requesting` for a task that no longer exists.
struct SettleGuard {
    switch: Arc<SwitchLatest>,
    generation: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.switch.complete(self.generation);
    }
}

/// Channels a load task reports to
struct Outcomes<T> {
    succeeded: Subject<Arc<[T]>>,
    failed: Subject<FetchError>,
}

/// Everything the load effect needs besides the bus
pub(crate) struct LoadEffect<T> {
    pub(crate) limit: Selector<i64>,
    pub(crate) offset: Selector<i64>,
    pub(crate) fetcher: Arc<dyn PageFetcher<T>>,
    pub(crate) switch: Arc<SwitchLatest>,
    pub(crate) runtime: Handle,
}

impl<T: Send + Sync + 'static> LoadEffect<T> {
    /// Subscribe the load effect to `request_load`
    ///
    /// The subscription captures only the outcome channels, never the
    /// `request_load` channel itself.
    pub(crate) fn install(self, bus: &ActionBus<T>) -> Subscription {
        let Self {
            limit,
            offset,
            fetcher,
            switch,
            runtime,
        } = self;
        let succeeded = bus.load_succeeded().clone();
        let failed = bus.load_failed().clone();

        bus.request_load().subscribe(move |()| {
            // Read at fire time, not at install time
            let limit = limit.latest();
            let offset = offset.latest();
            LoadMetrics::record_request();

            let generation = switch.start(|generation| {
                let task = run_load(
                    Arc::clone(&fetcher),
                    Outcomes {
                        succeeded: succeeded.clone(),
                        failed: failed.clone(),
                    },
                    Arc::clone(&switch),
                    generation,
                    limit,
                    offset,
                );
                runtime.spawn(task).abort_handle()
            });

            tracing::debug!(generation, limit, offset, "Load requested");
        })
    }
}

#[tracing::instrument(skip(fetcher, outcomes, switch), name = "load_page")]
async fn run_load<T>(
    fetcher: Arc<dyn PageFetcher<T>>,
    outcomes: Outcomes<T>,
    switch: Arc<SwitchLatest>,
    generation: u64,
    limit: i64,
    offset: i64,
) where
    T: Send + Sync + 'static,
{
    let _guard = SettleGuard {
        switch: Arc::clone(&switch),
        generation,
    };

    let start = Instant::now();
    let result = AssertUnwindSafe(async { fetcher.fetch_page(limit, offset).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            tracing::error!("Fetcher panicked");
            Err(FetchError::Transport("fetcher panicked".to_string()))
        });
    LoadMetrics::record_fetch(start.elapsed());

    let settled = switch.settle(generation, move || match result {
        Ok(items) => {
            tracing::debug!(count = items.len(), "Load succeeded");
            LoadMetrics::record_success();
            outcomes.succeeded.emit(Arc::from(items));
        },
        Err(error) => {
            LoadMetrics::record_failure();
            outcomes.failed.emit(error);
        },
    });

    if settled.is_none() {
        tracing::trace!("Discarding superseded load result");
        LoadMetrics::record_stale();
    }
}

/// Log every failed load; never touches state
pub(crate) fn install_failure_log<T: Send + Sync + 'static>(bus: &ActionBus<T>) -> Subscription {
    bus.load_failed().subscribe(|error| {
        tracing::error!(error = %error, "Page load failed");
    })
}
