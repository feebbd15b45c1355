use super::demand;
use super::Subscriber;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

const NO_REQUEST_NO_VALUE: u8 = 0;
const NO_REQUEST_HAS_VALUE: u8 = 1;
const HAS_REQUEST_NO_VALUE: u8 = 2;
const HAS_REQUEST_HAS_VALUE: u8 = 3;
const CANCELLED: u8 = 4;

/// Emits a single value once it is both produced and requested.
///
/// The value and the first positive request can arrive in either order and
/// from different threads; whichever comes second emits `on_next` followed by
/// `on_complete`. Cancellation before that point discards the value.
#[derive(Debug)]
pub struct DeferredScalar<R> {
    state: AtomicU8,
    value: Mutex<Option<R>>,
}

impl<R> Default for DeferredScalar<R> {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(NO_REQUEST_NO_VALUE),
            value: Mutex::new(None),
        }
    }
}

impl<R> DeferredScalar<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records downstream demand, emitting if the value is already there.
    pub fn request(&self, n: u64, downstream: &dyn Subscriber<R>) {
        if !demand::validate(n) {
            return;
        }
        loop {
            match self.state.load(Ordering::Acquire) {
                NO_REQUEST_NO_VALUE => {
                    if self.transition(NO_REQUEST_NO_VALUE, HAS_REQUEST_NO_VALUE) {
                        return;
                    }
                }
                NO_REQUEST_HAS_VALUE => {
                    if self.transition(NO_REQUEST_HAS_VALUE, HAS_REQUEST_HAS_VALUE) {
                        self.emit(downstream);
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// Supplies the value, emitting if demand is already there.
    pub fn complete(&self, value: R, downstream: &dyn Subscriber<R>) {
        *self.value.lock() = Some(value);
        loop {
            match self.state.load(Ordering::Acquire) {
                NO_REQUEST_NO_VALUE => {
                    if self.transition(NO_REQUEST_NO_VALUE, NO_REQUEST_HAS_VALUE) {
                        return;
                    }
                }
                HAS_REQUEST_NO_VALUE => {
                    if self.transition(HAS_REQUEST_NO_VALUE, HAS_REQUEST_HAS_VALUE) {
                        self.emit(downstream);
                        return;
                    }
                }
                _ => {
                    self.value.lock().take();
                    return;
                }
            }
        }
    }

    pub fn cancel(&self) {
        self.state.store(CANCELLED, Ordering::Release);
        self.value.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn emit(&self, downstream: &dyn Subscriber<R>) {
        let value = self.value.lock().take();
        if let Some(value) = value {
            downstream.on_next(value);
            if !self.is_cancelled() {
                downstream.on_complete();
            }
        }
    }
}
