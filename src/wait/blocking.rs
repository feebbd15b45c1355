use super::WaitStrategy;
use crate::error::WaitError;
use parking_lot::{Condvar, Mutex};

/// Parks waiting consumers on a condition variable.
///
/// Waiters re-check the cursor and the barrier under the lock before
/// parking, and producers notify under the same lock, so a publish or an
/// alert issued between the check and the park is never lost.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    processor_notify: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &dyn Fn() -> i64,
        barrier: &dyn Fn() -> Result<(), WaitError>,
    ) -> Result<i64, WaitError> {
        let mut available = cursor();
        if available < sequence {
            let mut guard = self.mutex.lock();
            loop {
                available = cursor();
                if available >= sequence {
                    break;
                }
                barrier()?;
                self.processor_notify.wait(&mut guard);
            }
        }
        Ok(available)
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.processor_notify.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Cursor;
    use crate::wait::testing;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_blocking_scenarios() {
        testing::returns_immediately_when_available(&BlockingWaitStrategy::new());
        testing::waits_for_publisher(Arc::new(BlockingWaitStrategy::new()));
        testing::aborts_on_alert(Arc::new(BlockingWaitStrategy::new()));
    }

    #[test]
    fn test_signal_with_no_waiters_does_not_block() {
        let strategy = BlockingWaitStrategy::new();
        strategy.signal_all_when_blocking();
        strategy.signal_all_when_blocking();
    }

    #[test]
    fn test_signal_wakes_every_parked_waiter() {
        let strategy = Arc::new(BlockingWaitStrategy::new());
        let cursor = Arc::new(Cursor::new(-1));
        let (tx, rx) = mpsc::channel();

        for _ in 0..4 {
            let strategy = Arc::clone(&strategy);
            let cursor = Arc::clone(&cursor);
            let tx = tx.clone();
            thread::spawn(move || {
                let seq = strategy
                    .wait_for(0, &|| cursor.get(), &testing::never_alerted)
                    .unwrap();
                tx.send(seq).unwrap();
            });
        }

        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err(), "nobody may return before publish");

        cursor.store(0);
        strategy.signal_all_when_blocking();

        for _ in 0..4 {
            let seq = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("every waiter must be woken");
            assert_eq!(seq, 0);
        }
    }
}
