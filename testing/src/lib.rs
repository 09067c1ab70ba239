//! # Pagestore Testing
//!
//! Testing utilities and helpers for pagestore.
//!
//! This crate provides:
//! - Mock implementations of [`PageFetcher`](pagestore_core::PageFetcher)
//! - A [`Recorder`] for collecting observer emissions
//! - [`ReducerTest`], a Given-When-Then helper for reducers
//! - proptest strategies for pagination actions
//!
//! ## Example
//!
//! ```ignore
//! use pagestore_testing::{Recorder, mocks::StubFetcher};
//! use pagestore_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_first_page() {
//!     let fetcher = StubFetcher::new().respond_ok(vec!["bulbasaur", "ivysaur"]);
//!     let store = Store::new(fetcher.clone()).unwrap();
//!     let items = Recorder::new();
//!     let _sub = store.items().subscribe(items.observer());
//!
//!     store.request_load();
//!     // ...
//!     assert_eq!(fetcher.calls(), vec![(10, 0)]);
//! }
//! ```


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of [`PageFetcher`](pagestore_core::PageFetcher)
///
/// - [`StubFetcher`](mocks::StubFetcher): scripted responses, answered immediately
/// - [`SliceFetcher`](mocks::SliceFetcher): pages over a fixed catalogue
/// - [`ManualFetcher`](mocks::ManualFetcher): calls stay pending until the test resolves them
pub mod mocks {
    use pagestore_core::{FetchError, FetchFuture, PageFetcher};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use tokio::sync::{oneshot, watch};

    type Response<T> = Result<Vec<T>, FetchError>;

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    struct Script<T> {
        responses: VecDeque<Response<T>>,
        fallback: Option<Response<T>>,
        calls: Vec<(i64, i64)>,
    }

    /// Fetcher that answers from a script
    ///
    /// Scripted responses are used once each, in order. After the script runs
    /// out the fallback (if any) answers every call; otherwise calls fail with
    /// [`FetchError::Transport`]. Every call's `(limit, offset)` is recorded.
    ///
    /// Clones share the script and the call log.
    ///
    /// # Example
    ///
    /// ```
    /// use pagestore_testing::mocks::StubFetcher;
    ///
    /// let fetcher = StubFetcher::new()
    ///     .respond_ok(vec!["bulbasaur"])
    ///     .always_ok(vec![]);
    /// assert!(fetcher.calls().is_empty());
    /// ```
    pub struct StubFetcher<T> {
        script: Arc<Mutex<Script<T>>>,
    }

    impl<T> StubFetcher<T> {
        /// Create a fetcher with an empty script
        #[must_use]
        pub fn new() -> Self {
            Self {
                script: Arc::new(Mutex::new(Script {
                    responses: VecDeque::new(),
                    fallback: None,
                    calls: Vec::new(),
                })),
            }
        }

        /// Queue a response
        #[must_use]
        pub fn respond(self, response: Result<Vec<T>, FetchError>) -> Self {
            lock(&self.script).responses.push_back(response);
            self
        }

        /// Queue a successful response
        #[must_use]
        pub fn respond_ok(self, items: Vec<T>) -> Self {
            self.respond(Ok(items))
        }

        /// Queue a failed response
        #[must_use]
        pub fn respond_err(self, error: FetchError) -> Self {
            self.respond(Err(error))
        }

        /// Answer every call past the script with `items`
        #[must_use]
        pub fn always_ok(self, items: Vec<T>) -> Self {
            lock(&self.script).fallback = Some(Ok(items));
            self
        }

        /// Every `(limit, offset)` this fetcher was called with, in order
        #[must_use]
        pub fn calls(&self) -> Vec<(i64, i64)> {
            lock(&self.script).calls.clone()
        }

        /// Number of calls so far
        #[must_use]
        pub fn call_count(&self) -> usize {
            lock(&self.script).calls.len()
        }
    }

    impl<T> Default for StubFetcher<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T> Clone for StubFetcher<T> {
        fn clone(&self) -> Self {
            Self {
                script: Arc::clone(&self.script),
            }
        }
    }

    impl<T> std::fmt::Debug for StubFetcher<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let script = lock(&self.script);
            f.debug_struct("StubFetcher")
                .field("scripted", &script.responses.len())
                .field("calls", &script.calls)
                .finish()
        }
    }

    impl<T: Clone + Send + Sync> PageFetcher<T> for StubFetcher<T> {
        fn fetch_page(&self, limit: i64, offset: i64) -> FetchFuture<'_, T> {
            let response = {
                let mut script = lock(&self.script);
                script.calls.push((limit, offset));
                script
                    .responses
                    .pop_front()
                    .or_else(|| script.fallback.clone())
                    .unwrap_or_else(|| {
                        Err(FetchError::Transport("no scripted response".to_string()))
                    })
            };
            Box::pin(async move { response })
        }
    }

    /// Fetcher that pages over a fixed catalogue
    ///
    /// Returns `catalogue[offset..offset + limit]`, clipped to the catalogue.
    /// Negative windows yield an empty page.
    ///
    /// # Example
    ///
    /// ```
    /// use pagestore_testing::mocks::SliceFetcher;
    ///
    /// let fetcher = SliceFetcher::new((1..=100).collect::<Vec<u32>>());
    /// assert_eq!(fetcher.page(3, 10), vec![11, 12, 13]);
    /// assert!(fetcher.page(-1, 0).is_empty());
    /// ```
    #[derive(Debug, Clone)]
    pub struct SliceFetcher<T> {
        catalogue: Arc<[T]>,
    }

    impl<T: Clone> SliceFetcher<T> {
        /// Create a fetcher over `catalogue`
        #[must_use]
        pub fn new(catalogue: Vec<T>) -> Self {
            Self {
                catalogue: Arc::from(catalogue),
            }
        }

        /// The page the fetcher answers for `(limit, offset)`
        #[must_use]
        pub fn page(&self, limit: i64, offset: i64) -> Vec<T> {
            let (Ok(limit), Ok(offset)) = (usize::try_from(limit), usize::try_from(offset)) else {
                return Vec::new();
            };
            self.catalogue
                .iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect()
        }
    }

    impl<T: Clone + Send + Sync> PageFetcher<T> for SliceFetcher<T> {
        fn fetch_page(&self, limit: i64, offset: i64) -> FetchFuture<'_, T> {
            let page = self.page(limit, offset);
            Box::pin(async move { Ok(page) })
        }
    }

    /// A call to a [`ManualFetcher`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PendingCall {
        /// Requested page size
        pub limit: i64,
        /// Requested cursor
        pub offset: i64,
    }

    struct Call<T> {
        request: PendingCall,
        reply: Option<oneshot::Sender<Response<T>>>,
    }

    /// Fetcher whose calls stay pending until the test resolves them
    ///
    /// Lets tests control completion order, e.g. to answer an older request
    /// after a newer one. A call whose reply is dropped (or never sent)
    /// completes only if the fetcher is dropped, with a transport error.
    pub struct ManualFetcher<T> {
        calls: Arc<Mutex<Vec<Call<T>>>>,
        count: watch::Sender<usize>,
    }

    impl<T> ManualFetcher<T> {
        /// Create a fetcher with no calls
        #[must_use]
        pub fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                count: watch::channel(0).0,
            }
        }

        /// Every call so far, in arrival order
        #[must_use]
        pub fn calls(&self) -> Vec<PendingCall> {
            lock(&self.calls).iter().map(|call| call.request).collect()
        }

        /// Wait until at least `n` calls have arrived
        pub async fn wait_for_calls(&self, n: usize) {
            let mut count = self.count.subscribe();
            // The sender lives in self, so the channel cannot close here
            let _ = count.wait_for(|count| *count >= n).await;
        }

        /// Complete call `index` with `response`
        ///
        /// Returns `false` if there is no such call, it was already resolved,
        /// or its task was cancelled.
        pub fn resolve(&self, index: usize, response: Result<Vec<T>, FetchError>) -> bool {
            let reply = lock(&self.calls)
                .get_mut(index)
                .and_then(|call| call.reply.take());
            reply.is_some_and(|reply| reply.send(response).is_ok())
        }

        /// Complete call `index` successfully
        pub fn resolve_ok(&self, index: usize, items: Vec<T>) -> bool {
            self.resolve(index, Ok(items))
        }

        /// Complete call `index` with an error
        pub fn resolve_err(&self, index: usize, error: FetchError) -> bool {
            self.resolve(index, Err(error))
        }
    }

    impl<T> Default for ManualFetcher<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T> Clone for ManualFetcher<T> {
        fn clone(&self) -> Self {
            Self {
                calls: Arc::clone(&self.calls),
                count: self.count.clone(),
            }
        }
    }

    impl<T> std::fmt::Debug for ManualFetcher<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ManualFetcher")
                .field("calls", &self.calls())
                .finish()
        }
    }

    impl<T: Send + Sync> PageFetcher<T> for ManualFetcher<T> {
        fn fetch_page(&self, limit: i64, offset: i64) -> FetchFuture<'_, T> {
            let (reply, response) = oneshot::channel();
            let total = {
                let mut calls = lock(&self.calls);
                calls.push(Call {
                    request: PendingCall { limit, offset },
                    reply: Some(reply),
                });
                calls.len()
            };
            self.count.send_replace(total);

            Box::pin(async move {
                response
                    .await
                    .unwrap_or_else(|_| Err(FetchError::Transport("call dropped".to_string())))
            })
        }
    }
}

/// Records every value an observer receives
///
/// # Example
///
/// ```
/// use pagestore_core::Subject;
/// use pagestore_testing::Recorder;
///
/// let channel = Subject::new("numbers");
/// let recorder = Recorder::new();
/// let _sub = channel.subscribe(recorder.observer());
///
/// channel.emit(1);
/// channel.emit(2);
/// assert_eq!(recorder.values(), vec![1, 2]);
/// ```
pub struct Recorder<T> {
    values: std::sync::Arc<std::sync::Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: std::sync::Arc::default(),
        }
    }

    /// An observer that appends to this recorder
    pub fn observer(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let values = std::sync::Arc::clone(&self.values);
        move |value: &T| {
            values
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(value.clone());
        }
    }

    /// Everything recorded so far
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.lock().clone()
    }

    /// Number of recorded values
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The most recent value
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<T: Clone + Send + 'static> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            values: std::sync::Arc::clone(&self.values),
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    /// Install a test tracing subscriber honouring `RUST_LOG`
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pagestore_runtime=debug")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest
pub mod properties {
    use pagestore_core::PageAction;
    use proptest::prelude::*;

    /// Deltas small enough that sums never wrap
    pub fn delta() -> impl Strategy<Value = i64> {
        -1_000i64..1_000
    }

    /// Any action that changes the pagination window
    pub fn window_action<T: std::fmt::Debug + 'static>() -> impl Strategy<Value = PageAction<T>> {
        prop_oneof![
            delta().prop_map(PageAction::IncreaseLimit),
            delta().prop_map(PageAction::DecreaseLimit),
            delta().prop_map(PageAction::IncreaseOffset),
            delta().prop_map(PageAction::DecreaseOffset),
        ]
    }

    /// Expected `(limit, offset)` after applying `actions` to a window
    #[must_use]
    pub fn expected_window<T>(start: (i64, i64), actions: &[PageAction<T>]) -> (i64, i64) {
        actions.iter().fold(start, |(limit, offset), action| match action {
            PageAction::IncreaseLimit(n) => (limit.wrapping_add(*n), offset),
            PageAction::DecreaseLimit(n) => (limit.wrapping_sub(*n), offset),
            PageAction::IncreaseOffset(n) => (limit, offset.wrapping_add(*n)),
            PageAction::DecreaseOffset(n) => (limit, offset.wrapping_sub(*n)),
            PageAction::RequestLoad | PageAction::LoadSucceeded(_) | PageAction::LoadFailed(_) => {
                (limit, offset)
            },
        })
    }
}
