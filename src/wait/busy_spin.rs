use super::WaitStrategy;
use crate::error::WaitError;
use std::hint;

/// Re-checks the cursor in a tight loop.
///
/// Lowest latency; burns a full core per waiting consumer.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &dyn Fn() -> i64,
        barrier: &dyn Fn() -> Result<(), WaitError>,
    ) -> Result<i64, WaitError> {
        loop {
            let available = cursor();
            if available >= sequence {
                return Ok(available);
            }
            barrier()?;
            hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::testing;
    use std::sync::Arc;

    #[test]
    fn test_busy_spin_scenarios() {
        testing::returns_immediately_when_available(&BusySpinWaitStrategy);
        testing::waits_for_publisher(Arc::new(BusySpinWaitStrategy));
        testing::aborts_on_alert(Arc::new(BusySpinWaitStrategy));
    }
}
