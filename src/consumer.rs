//! Defines the `Consumer` side of an `eddy` ring.
//!
//! Each consumer owns a gating cursor registered with the bus: the last
//! sequence it has finished with. Publishers never reuse a slot past the
//! slowest gating cursor, so everything between a consumer's position and
//! the publish cursor stays readable until the consumer releases it.
//! Dropping a consumer deregisters it.

use crate::bus::Bus;
use crate::cursor::Cursor;
use crate::error::WaitError;
use crate::sequence_barrier::SequenceBarrier;
use crate::signal::{Signal, SignalSlot};
use std::sync::Arc;

/// The receiving end of a ring.
///
/// Consumers progress independently; a slow one holds back publishers but
/// not other consumers. Reading requires `&mut self` so that a single
/// consumer's sequence is processed strictly in order.
#[derive(Debug)]
pub struct Consumer<T> {
    bus: Arc<Bus<T>>,
    barrier: Arc<SequenceBarrier>,
    id: u64,
}

impl<T> Consumer<T> {
    pub(crate) fn new(bus: Arc<Bus<T>>, init_cursor: i64) -> Self {
        let id = bus.ids.next_id();
        bus.consumers.pin().insert(id, Cursor::new(init_cursor));
        let barrier = Arc::new(SequenceBarrier::new(
            Arc::clone(&bus.cursor),
            Arc::clone(&bus.wait_strategy),
        ));

        Self { bus, barrier, id }
    }

    /// The barrier this consumer waits on.
    ///
    /// Clone it before handing the consumer to another thread to be able to
    /// alert a wait in progress.
    pub fn barrier(&self) -> &Arc<SequenceBarrier> {
        &self.barrier
    }

    /// Last sequence this consumer released.
    pub fn position(&self) -> i64 {
        self.bus
            .consumers
            .pin()
            .get(&self.id)
            .map(Cursor::get)
            .unwrap_or(crate::cursor::INITIAL_SEQUENCE)
    }

    /// Waits until `sequence` is published; see [`SequenceBarrier::wait_for`].
    pub(crate) fn wait_for(&self, sequence: i64) -> Result<i64, WaitError> {
        self.barrier.wait_for(sequence)
    }

    /// Reads the slot of a published, unreleased sequence.
    pub(crate) fn slot(&self, sequence: i64) -> &SignalSlot<T> {
        debug_assert!(sequence > self.position() && sequence <= self.bus.cursor.get());
        // SAFETY: `sequence` is published (the caller waited for it) and not
        // yet released, so no publisher can be writing this slot.
        unsafe { &*self.bus.buffer.get(sequence) }
    }

    /// Hands every sequence up to and including `sequence` back to publishers.
    pub(crate) fn release(&self, sequence: i64) {
        if let Some(cursor) = self.bus.consumers.pin().get(&self.id) {
            cursor.store(sequence);
        }
    }

    /// Waits once and passes every visible slot to `f`, in order.
    ///
    /// Returns the last sequence handled. The whole batch is released after
    /// `f` has seen it. Empty slots left by dropped claims are passed too;
    /// their `value` and `error` are both `None`.
    pub fn drain<F>(&mut self, mut f: F) -> Result<i64, WaitError>
    where
        F: FnMut(&SignalSlot<T>),
    {
        let next = self.position() + 1;
        let available = self.wait_for(next)?;
        for sequence in next..=available {
            f(self.slot(sequence));
        }
        self.release(available);
        Ok(available)
    }
}

impl<T: Clone> Consumer<T> {
    /// Waits for the next signal and returns a copy of it.
    ///
    /// Empty slots are skipped.
    pub fn next(&mut self) -> Result<Signal<T>, WaitError> {
        loop {
            let sequence = self.position() + 1;
            self.wait_for(sequence)?;
            let signal = self.slot(sequence).snapshot();
            self.release(sequence);
            if let Some(signal) = signal {
                return Ok(signal);
            }
        }
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.bus.consumers.pin().remove(&self.id);
    }
}
