//! Environment module - the network dependency injected into the store
//!
//! The store never performs I/O itself. It calls a [`PageFetcher`] supplied at
//! construction, which production code backs with an HTTP client and tests
//! back with scripted mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a [`PageFetcher`]
///
/// Carried as the payload of the `load_failed` action, so it is `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the connection failed
    #[error("Request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The response body could not be decoded into items
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Future returned by [`PageFetcher::fetch_page`]
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Vec<T>, FetchError>> + Send + 'a>>;

/// Fetches one page of items from a paginated endpoint
///
/// # Example
///
/// ```ignore
/// impl PageFetcher<Pokemon> for PokeApiClient {
///     fn fetch_page(&self, limit: i64, offset: i64) -> FetchFuture<'_, Pokemon> {
///         Box::pin(async move { self.get_page(limit, offset).await })
///     }
/// }
/// ```
pub trait PageFetcher<T>: Send + Sync {
    /// Fetch `limit` items starting at `offset`
    fn fetch_page(&self, limit: i64, offset: i64) -> FetchFuture<'_, T>;
}

impl<T, F> PageFetcher<T> for Arc<F>
where
    F: PageFetcher<T> + ?Sized,
{
    fn fetch_page(&self, limit: i64, offset: i64) -> FetchFuture<'_, T> {
        (**self).fetch_page(limit, offset)
    }
}
