use super::WaitStrategy;
use crate::error::WaitError;
use std::time::Duration;
use std::{hint, thread};

/// Retry budget of [`SleepingWaitStrategy::default`].
pub const DEFAULT_RETRIES: u32 = 200;
/// Sleep per idle iteration once the retry budget is spent.
pub const DEFAULT_SLEEP: Duration = Duration::from_nanos(100);
const SPIN_THRESHOLD: u32 = 100;

/// Spins, then yields, then sleeps a fixed interval per iteration.
///
/// The retry budget is spent top down: while above 100 the thread spins,
/// down to zero it yields, and from then on it sleeps. A budget of zero
/// sleeps from the first miss.
#[derive(Debug, Clone, Copy)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep: Duration,
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES)
    }
}

impl SleepingWaitStrategy {
    pub fn new(retries: u32) -> Self {
        Self::with_sleep(retries, DEFAULT_SLEEP)
    }

    pub fn with_sleep(retries: u32, sleep: Duration) -> Self {
        Self { retries, sleep }
    }

    fn apply_wait_method(&self, counter: u32) -> u32 {
        if counter > SPIN_THRESHOLD {
            hint::spin_loop();
            counter - 1
        } else if counter > 0 {
            thread::yield_now();
            counter - 1
        } else {
            thread::sleep(self.sleep);
            counter
        }
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &dyn Fn() -> i64,
        barrier: &dyn Fn() -> Result<(), WaitError>,
    ) -> Result<i64, WaitError> {
        let mut counter = self.retries;

        loop {
            let available = cursor();
            if available >= sequence {
                return Ok(available);
            }
            barrier()?;
            counter = self.apply_wait_method(counter);
        }
    }
}
