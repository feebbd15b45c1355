use super::WaitStrategy;
use crate::error::WaitError;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{fence, AtomicBool, Ordering};

/// Like [`BlockingWaitStrategy`](super::BlockingWaitStrategy), but producers
/// only take the lock when a consumer has announced it is about to park.
///
/// A waiter raises `signal_needed` before its final cursor check; a producer
/// advances the cursor before clearing it. The paired `SeqCst` fences make
/// sure at least one side sees the other's write.
#[derive(Debug, Default)]
pub struct LiteBlockingWaitStrategy {
    mutex: Mutex<()>,
    processor_notify: Condvar,
    signal_needed: AtomicBool,
}

impl LiteBlockingWaitStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for LiteBlockingWaitStrategy {
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
                self.signal_needed.store(true, Ordering::SeqCst);
                fence(Ordering::SeqCst);

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
        fence(Ordering::SeqCst);
        if self.signal_needed.swap(false, Ordering::SeqCst) {
            let _guard = self.mutex.lock();
            self.processor_notify.notify_all();
        }
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
    fn test_lite_blocking_scenarios() {
        testing::returns_immediately_when_available(&LiteBlockingWaitStrategy::new());
        testing::waits_for_publisher(Arc::new(LiteBlockingWaitStrategy::new()));
        testing::aborts_on_alert(Arc::new(LiteBlockingWaitStrategy::new()));
    }

    #[test]
    fn test_signal_skips_lock_when_nobody_parked() {
        let strategy = LiteBlockingWaitStrategy::new();

        // Holding the lock would deadlock a signal that tried to take it.
        let _held = strategy.mutex.lock();
        strategy.signal_all_when_blocking();
        assert!(!strategy.signal_needed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_signal_wakes_every_parked_waiter() {
        let strategy = Arc::new(LiteBlockingWaitStrategy::new());
        let cursor = Arc::new(Cursor::new(-1));
        let (tx, rx) = mpsc::channel();

        for _ in 0..4 {
            let strategy = Arc::clone(&strategy);
            let cursor = Arc::clone(&cursor);
            let tx = tx.clone();
            thread::spawn(move || {
                let seq = strategy
                    .wait_for(1, &|| cursor.get(), &testing::never_alerted)
                    .unwrap();
                tx.send(seq).unwrap();
            });
        }

        thread::sleep(Duration::from_millis(50));
        assert!(strategy.signal_needed.load(Ordering::SeqCst));

        cursor.store(1);
        strategy.signal_all_when_blocking();

        for _ in 0..4 {
            let seq = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("every waiter must be woken");
            assert_eq!(seq, 1);
        }
    }
}
