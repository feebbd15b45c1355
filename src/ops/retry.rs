use crate::error::FlowError;
use crate::flow::{guarded, Source, Subscriber, Subscription, SubscriptionArbiter};
use crate::hooks;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

const OPERATOR: &str = "retry";

type Predicate = Arc<dyn Fn(&FlowError) -> Result<bool, FlowError> + Send + Sync>;

#[derive(Clone)]
enum Policy {
    When(Predicate),
    Times(u64),
}

/// Resubscribes to the source when it fails with an error the policy accepts.
///
/// Elements from every attempt reach the downstream in order, and demand that
/// was not satisfied by a failed attempt carries over to the next one.
/// Resubscription runs in a loop, so a source that fails synchronously on
/// subscribe does not grow the stack.
pub struct Retry<T> {
    source: Arc<dyn Source<T>>,
    policy: Policy,
}

impl<T> Retry<T> {
    /// Retries while `predicate` returns `Ok(true)`.
    ///
    /// If the predicate fails or panics, its error is delivered downstream with
    /// the source's error attached as [`FlowError::suppressed`].
    pub fn new<S, P>(source: S, predicate: P) -> Self
    where
        S: Source<T> + 'static,
        P: Fn(&FlowError) -> Result<bool, FlowError> + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(source),
            policy: Policy::When(Arc::new(predicate)),
        }
    }

    /// Retries at most `n` times per subscription, whatever the error.
    pub fn times<S>(source: S, n: u64) -> Self
    where
        S: Source<T> + 'static,
    {
        Self {
            source: Arc::new(source),
            policy: Policy::Times(n),
        }
    }
}

impl<T: Send + 'static> Source<T> for Retry<T> {
    fn subscribe(&self, downstream: Arc<dyn Subscriber<T>>) {
        let parent = Arc::new_cyclic(|this| RetrySubscriber {
            downstream,
            source: Arc::clone(&self.source),
            policy: self.policy.clone(),
            arbiter: SubscriptionArbiter::new(),
            produced: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            done: AtomicBool::new(false),
            this: this.clone(),
        });

        parent.downstream.on_subscribe(parent.clone());
        if !parent.arbiter.is_cancelled() {
            parent.resubscribe();
        }
    }
}

struct RetrySubscriber<T> {
    downstream: Arc<dyn Subscriber<T>>,
    source: Arc<dyn Source<T>>,
    policy: Policy,
    arbiter: SubscriptionArbiter,
    produced: AtomicU64,
    retried: AtomicU64,
    wip: AtomicUsize,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T: Send + 'static> RetrySubscriber<T> {
    fn should_retry(&self, error: &FlowError) -> Result<bool, FlowError> {
        match &self.policy {
            Policy::When(predicate) => guarded(OPERATOR, || predicate(error)),
            Policy::Times(n) => Ok(self.retried.fetch_add(1, Ordering::AcqRel) < *n),
        }
    }

    /// Subscribes to the source again; only the first concurrent caller loops.
    fn resubscribe(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        loop {
            if self.arbiter.is_cancelled() {
                return;
            }

            let produced = self.produced.swap(0, Ordering::AcqRel);
            if produced != 0 {
                self.arbiter.produced(produced);
            }

            tracing::trace!(produced, "subscribing to retried source");
            self.source.subscribe(this.clone());

            if self.wip.fetch_sub(1, Ordering::AcqRel) == 1 {
                return;
            }
        }
    }

    fn finish(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }
}

impl<T: Send + 'static> Subscriber<T> for RetrySubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.arbiter.set(subscription);
    }

    fn on_next(&self, value: T) {
        self.produced.fetch_add(1, Ordering::AcqRel);
        self.downstream.on_next(value);
    }

    fn on_error(&self, error: FlowError) {
        // Once cancelled, the downstream must not see a terminal signal.
        if self.done.load(Ordering::Acquire) || self.arbiter.is_cancelled() {
            return hooks::on_error_dropped(error);
        }

        match self.should_retry(&error) {
            Ok(true) => self.resubscribe(),
            Ok(false) => {
                if self.finish() {
                    self.downstream.on_error(error);
                } else {
                    hooks::on_error_dropped(error);
                }
            }
            Err(failure) => {
                let failure = failure.with_suppressed(error);
                if self.finish() {
                    self.downstream.on_error(failure);
                } else {
                    hooks::on_error_dropped(failure);
                }
            }
        }
    }

    fn on_complete(&self) {
        if self.finish() && !self.arbiter.is_cancelled() {
            self.downstream.on_complete();
        }
    }
}

impl<T: Send + 'static> Subscription for RetrySubscriber<T> {
    fn request(&self, n: u64) {
        self.arbiter.request(n);
    }

    fn cancel(&self) {
        self.arbiter.cancel();
    }
}
