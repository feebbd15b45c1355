use crate::cursor::Cursor;
use crate::error::WaitError;
use crate::wait::WaitStrategy;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const RUNNING: u8 = 0;
const ALERTED: u8 = 1;
const INTERRUPTED: u8 = 2;

/// A consumer's view of the publish cursor.
///
/// Shares the cursor and the wait strategy with every other consumer of the
/// same bus but owns its abort state, so alerting one consumer leaves the
/// others waiting.
#[derive(Debug)]
pub struct SequenceBarrier {
    cursor: Arc<Cursor>,
    wait_strategy: Arc<dyn WaitStrategy>,
    state: AtomicU8,
}

impl SequenceBarrier {
    pub(crate) fn new(cursor: Arc<Cursor>, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            cursor,
            wait_strategy,
            state: AtomicU8::new(RUNNING),
        }
    }

    /// Waits until `sequence` is published and returns the highest published
    /// sequence, which may be further ahead.
    pub fn wait_for(&self, sequence: i64) -> Result<i64, WaitError> {
        self.check_alert()?;
        self.wait_strategy
            .wait_for(sequence, &|| self.cursor.get(), &|| self.check_alert())
    }

    /// Highest published sequence.
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    /// Aborts the current and every future wait with [`WaitError::Alerted`].
    pub fn alert(&self) {
        self.raise(ALERTED);
    }

    /// Aborts the current and every future wait with [`WaitError::Interrupted`].
    pub fn interrupt(&self) {
        self.raise(INTERRUPTED);
    }

    pub fn clear_alert(&self) {
        self.state.store(RUNNING, Ordering::SeqCst);
    }

    pub fn is_alerted(&self) -> bool {
        self.state.load(Ordering::SeqCst) != RUNNING
    }

    pub fn check_alert(&self) -> Result<(), WaitError> {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => Ok(()),
            INTERRUPTED => Err(WaitError::Interrupted),
            _ => Err(WaitError::Alerted),
        }
    }

    fn raise(&self, state: u8) {
        // The first abort reason wins.
        let _ = self
            .state
            .compare_exchange(RUNNING, state, Ordering::SeqCst, Ordering::SeqCst);
        self.wait_strategy.signal_all_when_blocking();
    }
}
