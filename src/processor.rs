//! Defines `RingBufferProcessor`, a ring that is both a subscriber and a source.
//!
//! Upstream signals are published into the ring from whatever thread delivers
//! them. Every downstream subscriber gets its own consumer and a dedicated
//! dispatcher thread that reads the ring in order and hands signals over as
//! demand allows. A subscriber that does not request holds back the ring, and
//! a full ring blocks the upstream thread: that is the backpressure.

use crate::bus::Bus;
use crate::consumer::Consumer;
use crate::error::FlowError;
use crate::flow::demand::{self, get_and_add_cap};
use crate::flow::{EmptySubscription, Source, Subscriber, Subscription, UNBOUNDED};
use crate::hooks;
use crate::publisher::Publisher;
use crate::sequence_barrier::SequenceBarrier;
use crate::signal::{Signal, SignalType};
use crate::wait::WaitStrategy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};

/// A multicast processor backed by a ring of signal slots.
///
/// ```no_run
/// use eddy::flow::{self, Source};
/// use eddy::wait::BlockingWaitStrategy;
/// use eddy::RingBufferProcessor;
/// use std::sync::Arc;
///
/// let processor = Arc::new(RingBufferProcessor::<u32>::new(
///     "numbers",
///     1024,
///     Arc::new(BlockingWaitStrategy::default()),
/// ));
/// flow::just(vec![1, 2, 3]).subscribe(processor.clone());
/// ```
pub struct RingBufferProcessor<T> {
    name: String,
    publisher: Publisher<T>,
    upstream: Mutex<Option<Arc<dyn Subscription>>>,
    /// Set once by the first terminal signal; `Next` never appears here.
    terminal: Mutex<Option<Signal<()>>>,
    dispatchers: AtomicU64,
}

impl<T> std::fmt::Debug for RingBufferProcessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBufferProcessor")
            .field("name", &self.name)
            .field("cursor", &self.publisher.cursor())
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

impl<T> RingBufferProcessor<T> {
    /// Creates a processor over a ring of `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is less than 2 or not a power of two.
    pub fn new(name: impl Into<String>, capacity: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            name: name.into(),
            publisher: Publisher::new(Arc::new(Bus::new(capacity, wait_strategy))),
            upstream: Mutex::new(None),
            terminal: Mutex::new(None),
            dispatchers: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once a terminal signal was published.
    pub fn is_terminated(&self) -> bool {
        self.terminal.lock().is_some()
    }

    /// Completes the processor unless it already terminated, and cancels
    /// the upstream subscription.
    pub fn shutdown(&self) {
        if self.terminate(Signal::Complete) {
            self.cancel_upstream();
            self.publisher.complete();
        }
    }

    /// Records `signal` as the terminal one; false if there already was one.
    fn terminate(&self, signal: Signal<()>) -> bool {
        let mut terminal = self.terminal.lock();
        if terminal.is_some() {
            return false;
        }
        tracing::debug!(processor = %self.name, kind = ?signal.signal_type(), "processor terminated");
        *terminal = Some(signal);
        true
    }

    fn cancel_upstream(&self) {
        let upstream = self.upstream.lock().take();
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }
}

impl<T: Send + Sync> Subscriber<T> for RingBufferProcessor<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if self.is_terminated() {
            return subscription.cancel();
        }
        {
            let mut upstream = self.upstream.lock();
            if upstream.is_some() {
                drop(upstream);
                subscription.cancel();
                return hooks::on_error_dropped(FlowError::Protocol(format!(
                    "processor {} is already subscribed",
                    self.name
                )));
            }
            *upstream = Some(Arc::clone(&subscription));
        }
        subscription.request(UNBOUNDED);
    }

    fn on_next(&self, value: T) {
        if self.is_terminated() {
            return;
        }
        self.publisher.next(value);
    }

    fn on_error(&self, error: FlowError) {
        if !self.terminate(Signal::Error(error.clone())) {
            return hooks::on_error_dropped(error);
        }
        self.upstream.lock().take();
        self.publisher.error(error);
    }

    fn on_complete(&self) {
        if self.terminate(Signal::Complete) {
            self.upstream.lock().take();
            self.publisher.complete();
        }
    }
}

impl<T> Source<T> for RingBufferProcessor<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let consumer = {
            let terminal = self.terminal.lock();
            match terminal.as_ref() {
                Some(Signal::Error(e)) => return EmptySubscription::error(subscriber.as_ref(), e.clone()),
                Some(_) => return EmptySubscription::complete(subscriber.as_ref()),
                None => self.publisher.subscribe(),
            }
        };

        let id = self.dispatchers.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.name, id);
        let spawned = thread::Builder::new().name(name.clone()).spawn({
            let subscriber = Arc::clone(&subscriber);
            move || dispatch(name, consumer, subscriber)
        });

        if let Err(e) = spawned {
            tracing::warn!(processor = %self.name, error = %e, "failed to spawn dispatcher");
            EmptySubscription::error(subscriber.as_ref(), FlowError::upstream(e));
        }
    }
}

/// Demand and cancellation of one dispatcher's subscriber.
struct DispatchSubscription {
    requested: AtomicU64,
    cancelled: AtomicBool,
    barrier: Arc<SequenceBarrier>,
    dispatcher: Thread,
}

impl DispatchSubscription {
    /// Parks until one element may be delivered; false once cancelled.
    fn await_demand(&self) -> bool {
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return false;
            }
            match self.requested.load(Ordering::Acquire) {
                UNBOUNDED => return true,
                0 => thread::park(),
                r => {
                    if self
                        .requested
                        .compare_exchange(r, r - 1, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return true;
                    }
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Subscription for DispatchSubscription {
    fn request(&self, n: u64) {
        if demand::validate(n) {
            get_and_add_cap(&self.requested, n);
            self.dispatcher.unpark();
        }
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.barrier.alert();
            self.dispatcher.unpark();
        }
    }
}

fn dispatch<T: Clone>(name: String, consumer: Consumer<T>, subscriber: Arc<dyn Subscriber<T>>) {
    let subscription = Arc::new(DispatchSubscription {
        requested: AtomicU64::new(0),
        cancelled: AtomicBool::new(false),
        barrier: Arc::clone(consumer.barrier()),
        dispatcher: thread::current(),
    });

    tracing::debug!(dispatcher = %name, from = consumer.position() + 1, "dispatcher started");
    subscriber.on_subscribe(subscription.clone());

    let delivered = 'run: loop {
        if subscription.is_cancelled() {
            break 'run false;
        }
        let next = consumer.position() + 1;
        let Ok(available) = consumer.wait_for(next) else {
            break 'run false;
        };

        for sequence in next..=available {
            let slot = consumer.slot(sequence);
            match slot.kind {
                SignalType::Next => {
                    if let Some(value) = slot.value.clone() {
                        if !subscription.await_demand() {
                            break 'run false;
                        }
                        subscriber.on_next(value);
                    }
                }
                SignalType::Error => {
                    let error = slot
                        .error
                        .clone()
                        .unwrap_or_else(|| FlowError::Protocol("error slot without an error".to_string()));
                    consumer.release(sequence);
                    subscriber.on_error(error);
                    break 'run true;
                }
                SignalType::Complete => {
                    consumer.release(sequence);
                    subscriber.on_complete();
                    break 'run true;
                }
            }
            consumer.release(sequence);
        }
    };

    tracing::debug!(dispatcher = %name, terminal = delivered, "dispatcher stopped");
}
