use super::demand::{self, get_and_add_cap};
use super::{EmptySubscription, Source, Subscriber, Subscription, UNBOUNDED};
use crate::error::FlowError;
use parking_lot::Mutex;
use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A source replaying a cloneable iterator of results on every subscription.
///
/// `Ok` items are emitted as `on_next` within the subscriber's demand. The
/// first `Err` terminates the sequence with `on_error`, the end of the
/// iterator with `on_complete`; terminal signals need no demand.
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    items: I,
}

impl<I> IterSource<I> {
    pub fn new(items: I) -> Self {
        Self { items }
    }
}

/// A source of the given results, in order.
pub fn from_results<T>(items: Vec<Result<T, FlowError>>) -> IterSource<Vec<Result<T, FlowError>>> {
    IterSource::new(items)
}

/// A source of the given values followed by completion.
pub fn just<T>(values: Vec<T>) -> IterSource<Vec<Result<T, FlowError>>> {
    from_results(values.into_iter().map(Ok).collect())
}

/// A source that completes immediately.
pub fn empty<T>() -> IterSource<Vec<Result<T, FlowError>>> {
    from_results(Vec::new())
}

/// A source that fails immediately with `error`.
pub fn error<T>(error: FlowError) -> IterSource<Vec<Result<T, FlowError>>> {
    from_results(vec![Err(error)])
}

impl<T, I> Source<T> for IterSource<I>
where
    T: Send + 'static,
    I: IntoIterator<Item = Result<T, FlowError>> + Clone + Send + Sync,
    I::IntoIter: Send + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let mut iter = self.items.clone().into_iter().peekable();

        match iter.peek() {
            None => return EmptySubscription::complete(subscriber.as_ref()),
            Some(Err(_)) => {
                if let Some(Err(e)) = iter.next() {
                    EmptySubscription::error(subscriber.as_ref(), e);
                }
                return;
            }
            Some(Ok(_)) => {}
        }

        let subscription = Arc::new(IterSubscription {
            iter: Mutex::new(iter),
            subscriber: Arc::clone(&subscriber),
            requested: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(subscription);
    }
}

struct IterSubscription<T, It: Iterator<Item = Result<T, FlowError>>> {
    iter: Mutex<Peekable<It>>,
    subscriber: Arc<dyn Subscriber<T>>,
    requested: AtomicU64,
    cancelled: AtomicBool,
}

enum Step<T> {
    Emit(T, bool),
    Fail(FlowError),
    Done,
}

impl<T, It: Iterator<Item = Result<T, FlowError>>> IterSubscription<T, It> {
    /// Pulls one item and reports whether the iterator ended right after it.
    fn step(&self) -> Step<T> {
        let mut iter = self.iter.lock();
        match iter.next() {
            Some(Ok(value)) => {
                let last = iter.peek().is_none();
                Step::Emit(value, last)
            }
            Some(Err(e)) => Step::Fail(e),
            None => Step::Done,
        }
    }

    /// Emits an error that directly follows the last emitted item.
    fn pending_error(&self) -> Option<FlowError> {
        let mut iter = self.iter.lock();
        if matches!(iter.peek(), Some(Err(_))) {
            if let Some(Err(e)) = iter.next() {
                return Some(e);
            }
        }
        None
    }

    fn terminate(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    fn drain(&self, mut r: u64) {
        let mut emitted = 0u64;
        loop {
            while emitted != r {
                if self.cancelled.load(Ordering::Acquire) {
                    return;
                }
                match self.step() {
                    Step::Emit(value, last) => {
                        self.subscriber.on_next(value);
                        emitted += 1;
                        if last {
                            if self.terminate() {
                                self.subscriber.on_complete();
                            }
                            return;
                        }
                        if let Some(e) = self.pending_error() {
                            if self.terminate() {
                                self.subscriber.on_error(e);
                            }
                            return;
                        }
                    }
                    Step::Fail(e) => {
                        if self.terminate() {
                            self.subscriber.on_error(e);
                        }
                        return;
                    }
                    Step::Done => {
                        if self.terminate() {
                            self.subscriber.on_complete();
                        }
                        return;
                    }
                }
            }

            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            r = self.requested.load(Ordering::Acquire);
            if r == emitted {
                r = self.requested.fetch_sub(emitted, Ordering::AcqRel) - emitted;
                if r == 0 {
                    return;
                }
                emitted = 0;
            }
        }
    }
}

impl<T, It> Subscription for IterSubscription<T, It>
where
    T: Send,
    It: Iterator<Item = Result<T, FlowError>> + Send,
{
    fn request(&self, n: u64) {
        if !demand::validate(n) {
            return;
        }
        if get_and_add_cap(&self.requested, n) == 0 {
            let r = self.requested.load(Ordering::Acquire);
            self.drain(if r == UNBOUNDED { UNBOUNDED } else { r });
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
