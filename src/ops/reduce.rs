use crate::error::FlowError;
use crate::flow::{guarded, DeferredScalar, EmptySubscription, Source, Subscriber, Subscription, UNBOUNDED};
use crate::hooks;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

const OPERATOR: &str = "reduce";

type Supplier<R> = Arc<dyn Fn() -> Result<Option<R>, FlowError> + Send + Sync>;
type Accumulator<T, R> = Arc<dyn Fn(R, T) -> Result<Option<R>, FlowError> + Send + Sync>;

/// Folds a sequence into a single value emitted when the source completes.
///
/// The initial value is produced anew for every subscription. An empty
/// initial value or accumulation result (`Ok(None)`) fails the sequence with
/// [`FlowError::NullValue`]; a panicking function fails it with
/// [`FlowError::Computation`].
///
/// ```
/// use eddy::flow;
/// use eddy::Reduce;
///
/// let sum = Reduce::new(
///     flow::just(vec![1, 2, 3]),
///     || Ok(Some(0)),
///     |acc, x| Ok(Some(acc + x)),
/// );
/// # let _ = sum;
/// ```
pub struct Reduce<T, R> {
    source: Arc<dyn Source<T>>,
    supplier: Supplier<R>,
    accumulator: Accumulator<T, R>,
}

impl<T, R> Reduce<T, R> {
    pub fn new<S, F, A>(source: S, supplier: F, accumulator: A) -> Self
    where
        S: Source<T> + 'static,
        F: Fn() -> Result<Option<R>, FlowError> + Send + Sync + 'static,
        A: Fn(R, T) -> Result<Option<R>, FlowError> + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(source),
            supplier: Arc::new(supplier),
            accumulator: Arc::new(accumulator),
        }
    }
}

impl<T, R> Source<R> for Reduce<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn subscribe(&self, downstream: Arc<dyn Subscriber<R>>) {
        let initial = match guarded(OPERATOR, || (self.supplier)()) {
            Ok(Some(initial)) => initial,
            Ok(None) => {
                return EmptySubscription::error(
                    downstream.as_ref(),
                    FlowError::NullValue("the initial value supplied is empty"),
                )
            }
            Err(e) => return EmptySubscription::error(downstream.as_ref(), e),
        };

        let subscriber = Arc::new_cyclic(|this| ReduceSubscriber {
            downstream,
            accumulator: Arc::clone(&self.accumulator),
            value: Mutex::new(Some(initial)),
            upstream: Mutex::new(None),
            scalar: DeferredScalar::new(),
            done: AtomicBool::new(false),
            this: this.clone(),
        });
        self.source.subscribe(subscriber);
    }
}

struct ReduceSubscriber<T, R> {
    downstream: Arc<dyn Subscriber<R>>,
    accumulator: Accumulator<T, R>,
    value: Mutex<Option<R>>,
    upstream: Mutex<Option<Arc<dyn Subscription>>>,
    scalar: DeferredScalar<R>,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T, R> ReduceSubscriber<T, R> {
    /// Latches the terminal state; false if it was already reached.
    fn finish(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }

    fn cancel_upstream(&self) {
        let upstream = self.upstream.lock().clone();
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }

    fn fail(&self, error: FlowError) {
        if !self.finish() {
            return hooks::on_error_dropped(error);
        }
        self.cancel_upstream();
        self.value.lock().take();
        self.downstream.on_error(error);
    }
}

impl<T, R> Subscriber<T> for ReduceSubscriber<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        {
            let mut upstream = self.upstream.lock();
            if upstream.is_some() {
                drop(upstream);
                subscription.cancel();
                return hooks::on_error_dropped(FlowError::Protocol(
                    "reduce subscribed more than once".to_string(),
                ));
            }
            *upstream = Some(Arc::clone(&subscription));
        }

        if let Some(this) = self.this.upgrade() {
            self.downstream.on_subscribe(this);
        }
        subscription.request(UNBOUNDED);
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let Some(acc) = self.value.lock().take() else {
            return;
        };

        match guarded(OPERATOR, || (self.accumulator)(acc, item)) {
            Ok(Some(next)) => *self.value.lock() = Some(next),
            Ok(None) => self.fail(FlowError::NullValue("the accumulator returned an empty value")),
            Err(e) => self.fail(e),
        }
    }

    fn on_error(&self, error: FlowError) {
        if !self.finish() {
            return hooks::on_error_dropped(error);
        }
        self.value.lock().take();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if !self.finish() {
            return;
        }
        let value = self.value.lock().take();
        match value {
            Some(value) => self.scalar.complete(value, self.downstream.as_ref()),
            None => self.downstream.on_complete(),
        }
    }
}

impl<T, R> Subscription for ReduceSubscriber<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn request(&self, n: u64) {
        self.scalar.request(n, self.downstream.as_ref());
    }

    fn cancel(&self) {
        self.scalar.cancel();
        self.cancel_upstream();
    }
}
