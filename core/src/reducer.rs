//! Reducers and their bindings to action channels.
//!
//! A [`Reducer`] is a pure transition `(state, payload) → state`. It never
//! sees the live snapshot: [`bind`] hands it a private copy, lets it mutate
//! that copy, and commits the result through
//! [`StateContainer::update`](crate::state::StateContainer::update).
//!
//! Plain functions and closures of shape `Fn(&mut S, &P)` are reducers.
//!
//! # Example
//!
//! ```
//! use pagestore_core::{observer::Subject, reducer::bind, state::StateContainer};
//!
//! let container = StateContainer::new(0_i64);
//! let add = Subject::new("add");
//! let _binding = bind(&add, &container, |state: &mut i64, delta: &i64| *state += delta);
//!
//! add.emit(2);
//! add.emit(3);
//! assert_eq!(*container.get(), 5);
//! ```

use crate::observer::{Subject, Subscription};
use crate::state::StateContainer;

/// The Reducer trait - a pure state transition for one payload type
///
/// # Type Parameters
///
/// - `S`: The state this reducer transforms
/// - `P`: The payload carried by the bound channel
///
/// Reducers must be total: every state and payload produces a valid state.
pub trait Reducer<S, P>: Send + Sync {
    /// Apply `payload` to `state` in place
    fn reduce(&self, state: &mut S, payload: &P);
}

impl<S, P, F> Reducer<S, P> for F
where
    F: Fn(&mut S, &P) + Send + Sync,
{
    fn reduce(&self, state: &mut S, payload: &P) {
        self(state, payload);
    }
}

/// Bind `reducer` to `channel` for as long as the channel lives
///
/// Every emitted payload copies the current snapshot, reduces the copy, and
/// commits it. Commits (and the resulting notifications) complete before
/// `emit` returns, so bindings apply in emission order.
pub fn bind<S, P, R>(channel: &Subject<P>, container: &StateContainer<S>, reducer: R) -> Subscription
where
    S: Clone + Send + Sync + 'static,
    P: 'static,
    R: Reducer<S, P> + 'static,
{
    let container = container.clone();
    let channel_name = channel.name();

    channel.subscribe(move |payload| {
        let version = container.update(|current| {
            let mut next = current.clone();
            reducer.reduce(&mut next, payload);
            next
        });
        tracing::trace!(channel = channel_name, version, "Reducer committed");
    })
}
