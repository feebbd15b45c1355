//! Strategies a consumer uses to wait for the publish cursor to advance.
//!
//! Every strategy answers the same question: "has the cursor reached
//! `sequence` yet?". They differ in what the waiting thread does while the
//! answer is no, trading latency against CPU:
//!
//! | Strategy | While waiting |
//! |---|---|
//! | [`BusySpinWaitStrategy`] | re-reads the cursor in a tight loop |
//! | [`YieldingWaitStrategy`] | spins briefly, then yields every iteration |
//! | [`SleepingWaitStrategy`] | spins, yields, then sleeps |
//! | [`BlockingWaitStrategy`] | parks on a condition variable |
//! | [`LiteBlockingWaitStrategy`] | parks, and lets producers skip the lock when nobody is parked |
//! | [`PhasedBackoffWaitStrategy`] | spins, yields, then hands the wait to a fallback |
//!
//! A strategy returns the highest visible sequence, which may be past the one
//! requested so the caller can drain a batch per wake-up. The only other exit
//! is the barrier check failing with a [`WaitError`].

use crate::error::WaitError;
use std::fmt;

mod blocking;
mod busy_spin;
mod lite_blocking;
mod phased_backoff;
mod sleeping;
mod yielding;

pub use blocking::BlockingWaitStrategy;
pub use busy_spin::BusySpinWaitStrategy;
pub use lite_blocking::LiteBlockingWaitStrategy;
pub use phased_backoff::{PhasedBackoffWaitStrategy, SPIN_TRIES};
pub use sleeping::{SleepingWaitStrategy, DEFAULT_RETRIES, DEFAULT_SLEEP};
pub use yielding::YieldingWaitStrategy;

/// Policy consulted when a consumer is ahead of the published cursor.
pub trait WaitStrategy: Send + Sync + fmt::Debug {
    /// Waits until `cursor() >= sequence` and returns the observed cursor.
    ///
    /// `barrier` is polled while waiting; the first error it returns aborts
    /// the wait and is returned as-is.
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &dyn Fn() -> i64,
        barrier: &dyn Fn() -> Result<(), WaitError>,
    ) -> Result<i64, WaitError>;

    /// Wakes every consumer parked in this strategy.
    ///
    /// Called by producers after each publish and by barriers when alerted.
    fn signal_all_when_blocking(&self) {}
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared scenarios run against every strategy.

    use super::*;
    use crate::cursor::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    pub(crate) fn never_alerted() -> Result<(), WaitError> {
        Ok(())
    }

    /// The cursor is already past the sequence: the strategy returns it untouched.
    pub(crate) fn returns_immediately_when_available(strategy: &dyn WaitStrategy) {
        let cursor = Cursor::new(7);
        let available = strategy
            .wait_for(3, &|| cursor.get(), &never_alerted)
            .unwrap();
        assert_eq!(available, 7);
    }

    /// Another thread publishes after a delay; the waiter observes it.
    pub(crate) fn waits_for_publisher(strategy: Arc<dyn WaitStrategy>) {
        let cursor = Arc::new(Cursor::new(-1));

        let publisher = {
            let cursor = Arc::clone(&cursor);
            let strategy = Arc::clone(&strategy);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                cursor.store(0);
                strategy.signal_all_when_blocking();
            })
        };

        let available = strategy
            .wait_for(0, &|| cursor.get(), &never_alerted)
            .unwrap();
        assert_eq!(available, 0);
        publisher.join().unwrap();
    }

    /// An alert raised from another thread aborts the wait.
    pub(crate) fn aborts_on_alert(strategy: Arc<dyn WaitStrategy>) {
        let cursor = Cursor::new(-1);
        let alerted = Arc::new(AtomicBool::new(false));

        let alerter = {
            let alerted = Arc::clone(&alerted);
            let strategy = Arc::clone(&strategy);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                alerted.store(true, Ordering::SeqCst);
                strategy.signal_all_when_blocking();
            })
        };

        let result = strategy.wait_for(0, &|| cursor.get(), &|| {
            if alerted.load(Ordering::SeqCst) {
                Err(WaitError::Alerted)
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(WaitError::Alerted));
        alerter.join().unwrap();
    }
}
