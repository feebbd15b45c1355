use super::{Subscriber, Subscription};
use crate::error::FlowError;
use std::sync::Arc;

/// A subscription with nothing behind it.
///
/// Used to terminate a subscriber before any upstream exists: it still gets
/// its one `on_subscribe`, immediately followed by the terminal signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {}
}

impl EmptySubscription {
    pub fn error<T>(subscriber: &dyn Subscriber<T>, error: FlowError) {
        subscriber.on_subscribe(Arc::new(EmptySubscription));
        subscriber.on_error(error);
    }

    pub fn complete<T>(subscriber: &dyn Subscriber<T>) {
        subscriber.on_subscribe(Arc::new(EmptySubscription));
        subscriber.on_complete();
    }
}
