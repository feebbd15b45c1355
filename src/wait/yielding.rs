use super::WaitStrategy;
use crate::error::WaitError;
use std::{hint, thread};

const SPIN_TRIES: u32 = 100;

/// Spins for a short warm-up, then yields the thread on every iteration.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldingWaitStrategy;

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &dyn Fn() -> i64,
        barrier: &dyn Fn() -> Result<(), WaitError>,
    ) -> Result<i64, WaitError> {
        let mut counter = SPIN_TRIES;

        loop {
            let available = cursor();
            if available >= sequence {
                return Ok(available);
            }
            barrier()?;

            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::testing;
    use std::sync::Arc;

    #[test]
    fn test_yielding_scenarios() {
        testing::returns_immediately_when_available(&YieldingWaitStrategy);
        testing::waits_for_publisher(Arc::new(YieldingWaitStrategy));
        testing::aborts_on_alert(Arc::new(YieldingWaitStrategy));
    }
}
