//! The Source / Subscriber / Subscription contract.
//!
//! A [`Source`] calls [`Subscriber::on_subscribe`] exactly once, then
//! [`Subscriber::on_next`] any number of times, then at most one of
//! [`Subscriber::on_error`] or [`Subscriber::on_complete`]. Those calls are
//! never concurrent for one subscription. The subscriber drives the flow with
//! [`Subscription::request`], which adds to the outstanding demand, and stops
//! it with [`Subscription::cancel`].

use crate::error::FlowError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

mod arbiter;
pub mod demand;
mod deferred;
mod empty;
mod iter_source;

pub use arbiter::SubscriptionArbiter;
pub use deferred::DeferredScalar;
pub use empty::EmptySubscription;
pub use iter_source::{empty, error, from_results, just, IterSource};

/// Demand meaning "no limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// Handle a subscriber uses to pull from, or stop, its source.
pub trait Subscription: Send + Sync {
    /// Adds `n` to the outstanding demand. `n` must be positive;
    /// [`UNBOUNDED`] lifts the limit for good.
    fn request(&self, n: u64);

    /// Stops delivery. Idempotent.
    fn cancel(&self);
}

/// Receiver of a signal sequence.
pub trait Subscriber<T>: Send + Sync {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);
    fn on_next(&self, value: T);
    fn on_error(&self, error: FlowError);
    fn on_complete(&self);
}

/// Producer of a signal sequence.
pub trait Source<T>: Send + Sync {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

impl<T, S: Source<T> + ?Sized> Source<T> for Arc<S> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        (**self).subscribe(subscriber)
    }
}

/// Calls a user function, turning a panic into [`FlowError::Computation`].
pub(crate) fn guarded<R>(
    operator: &'static str,
    f: impl FnOnce() -> Result<R, FlowError>,
) -> Result<R, FlowError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(FlowError::from_panic(operator, payload)),
    }
}
