use super::{
    BlockingWaitStrategy, LiteBlockingWaitStrategy, SleepingWaitStrategy, WaitStrategy,
};
use crate::error::WaitError;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Cursor checks between two clock samples.
///
/// Reading the clock on every iteration costs more than the check itself, so
/// the spin and yield deadlines are only evaluated once per batch. A deadline
/// can therefore be overshot by up to one batch.
pub const SPIN_TRIES: u32 = 10_000;

/// Spins, then yields, then hands the wait over to a fallback strategy.
///
/// Suited to consumers where CPU matters more than tail latency. Elapsed
/// time is measured from the first clock sample of a call. Past
/// `spin_timeout` each batch ends with a yield; past `spin_timeout +
/// yield_timeout` the rest of the call is delegated to `fallback` and never
/// comes back to spinning.
#[derive(Debug, Clone)]
pub struct PhasedBackoffWaitStrategy {
    spin_timeout_nanos: u128,
    yield_timeout_nanos: u128,
    fallback: Arc<dyn WaitStrategy>,
}

impl PhasedBackoffWaitStrategy {
    pub fn new(spin_timeout: Duration, yield_timeout: Duration, fallback: Arc<dyn WaitStrategy>) -> Self {
        let spin_timeout_nanos = spin_timeout.as_nanos();
        Self {
            spin_timeout_nanos,
            yield_timeout_nanos: spin_timeout_nanos + yield_timeout.as_nanos(),
            fallback,
        }
    }

    /// Falls back to a [`BlockingWaitStrategy`].
    pub fn with_lock(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(spin_timeout, yield_timeout, Arc::new(BlockingWaitStrategy::new()))
    }

    /// Falls back to a [`LiteBlockingWaitStrategy`].
    pub fn with_lite_lock(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(spin_timeout, yield_timeout, Arc::new(LiteBlockingWaitStrategy::new()))
    }

    /// Falls back to a [`SleepingWaitStrategy`] that sleeps from its first miss.
    pub fn with_sleep(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(spin_timeout, yield_timeout, Arc::new(SleepingWaitStrategy::new(0)))
    }
}

impl WaitStrategy for PhasedBackoffWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &dyn Fn() -> i64,
        barrier: &dyn Fn() -> Result<(), WaitError>,
    ) -> Result<i64, WaitError> {
        let mut start: Option<Instant> = None;
        let mut counter = SPIN_TRIES;

        loop {
            let available = cursor();
            if available >= sequence {
                return Ok(available);
            }

            counter -= 1;
            if counter == 0 {
                match start {
                    None => start = Some(Instant::now()),
                    Some(started) => {
                        let elapsed = started.elapsed().as_nanos();
                        if elapsed > self.yield_timeout_nanos {
                            tracing::trace!(sequence, "phased backoff engaging fallback");
                            return self.fallback.wait_for(sequence, cursor, barrier);
                        } else if elapsed > self.spin_timeout_nanos {
                            thread::yield_now();
                        }
                    }
                }
                counter = SPIN_TRIES;
            }
            barrier()?;
        }
    }

    fn signal_all_when_blocking(&self) {
        self.fallback.signal_all_when_blocking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Cursor;
    use crate::wait::{testing, BusySpinWaitStrategy};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Busy spins, counting how often it is consulted.
    #[derive(Debug, Default)]
    struct RecordingFallback {
        waits: AtomicUsize,
        signals: AtomicUsize,
    }

    impl WaitStrategy for RecordingFallback {
        fn wait_for(
            &self,
            sequence: i64,
            cursor: &dyn Fn() -> i64,
            barrier: &dyn Fn() -> Result<(), WaitError>,
        ) -> Result<i64, WaitError> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            BusySpinWaitStrategy.wait_for(sequence, cursor, barrier)
        }

        fn signal_all_when_blocking(&self) {
            self.signals.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_phased_backoff_scenarios() {
        let millis = Duration::from_millis(1);
        testing::returns_immediately_when_available(&PhasedBackoffWaitStrategy::with_lock(millis, millis));
        testing::waits_for_publisher(Arc::new(PhasedBackoffWaitStrategy::with_lock(millis, millis)));
        testing::waits_for_publisher(Arc::new(PhasedBackoffWaitStrategy::with_lite_lock(millis, millis)));
        testing::waits_for_publisher(Arc::new(PhasedBackoffWaitStrategy::with_sleep(millis, millis)));
        testing::aborts_on_alert(Arc::new(PhasedBackoffWaitStrategy::with_lock(millis, millis)));
        testing::aborts_on_alert(Arc::new(PhasedBackoffWaitStrategy::with_sleep(millis, millis)));
    }

    #[test]
    fn test_timeouts_normalize_to_nanos() {
        let strategy = PhasedBackoffWaitStrategy::with_sleep(Duration::from_micros(3), Duration::from_millis(2));
        assert_eq!(strategy.spin_timeout_nanos, 3_000);
        assert_eq!(strategy.yield_timeout_nanos, 2_003_000);
    }

    #[test]
    fn test_satisfied_in_spin_phase_never_consults_fallback() {
        let fallback = Arc::new(RecordingFallback::default());
        let strategy = PhasedBackoffWaitStrategy::new(Duration::from_secs(60), Duration::from_secs(60), fallback.clone());
        let cursor = Cursor::new(5);

        assert_eq!(strategy.wait_for(5, &|| cursor.get(), &testing::never_alerted), Ok(5));
        assert_eq!(fallback.waits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fallback_takes_over_the_rest_of_the_call() {
        let fallback = Arc::new(RecordingFallback::default());
        let strategy = Arc::new(PhasedBackoffWaitStrategy::new(Duration::ZERO, Duration::ZERO, fallback.clone()));
        let cursor = Arc::new(Cursor::new(-1));

        let publisher = {
            let cursor = Arc::clone(&cursor);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                cursor.store(3);
            })
        };

        let available = strategy
            .wait_for(2, &|| cursor.get(), &testing::never_alerted)
            .unwrap();
        assert_eq!(available, 3);
        // Engaged once and kept until the sequence showed up.
        assert_eq!(fallback.waits.load(Ordering::SeqCst), 1);
        publisher.join().unwrap();
    }

    #[test]
    fn test_alert_during_spin_phase_aborts() {
        let strategy = PhasedBackoffWaitStrategy::with_lock(Duration::from_secs(60), Duration::from_secs(60));
        let cursor = Cursor::new(-1);
        let result = strategy.wait_for(0, &|| cursor.get(), &|| Err(WaitError::Interrupted));
        assert_eq!(result, Err(WaitError::Interrupted));
    }

    #[test]
    fn test_signal_forwards_to_fallback() {
        let fallback = Arc::new(RecordingFallback::default());
        let strategy = PhasedBackoffWaitStrategy::new(Duration::ZERO, Duration::ZERO, fallback.clone());
        strategy.signal_all_when_blocking();
        strategy.signal_all_when_blocking();
        assert_eq!(fallback.signals.load(Ordering::SeqCst), 2);
    }
}
