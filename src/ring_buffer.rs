//! Defines `RingBuffer`, the preallocated slot array behind every `eddy` bus.
//!
//! Every cell holds a [`SignalSlot`] created up front and overwritten in place
//! for the lifetime of the buffer; publishing an element never allocates a
//! slot. Synchronization lives entirely outside this type: a publisher claims
//! a sequence before touching its slot, and consumers only read a slot after
//! the publish cursor has moved past it.

use crate::signal::SignalSlot;
use std::cell::UnsafeCell;

/// A fixed-size circular array of signal slots.
///
/// # Safety
///
/// `Send` and `Sync` are implemented `unsafe`ly. The contract the rest of the
/// crate upholds is:
///
/// 1.  **Single writer per sequence**: a slot is written only by the publisher
///     that claimed its sequence, and only while the slowest consumer has
///     released the previous lap of that index.
/// 2.  **Publish before read**: consumers dereference a slot only after an
///     `Acquire` load of the cursor has observed the `Release` store that
///     published it.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<SignalSlot<T>>]>,

    /// `capacity - 1`, maps a sequence number to its index.
    index_mask: usize,
}

// SAFETY: see the type level documentation; all access is coordinated by the
// claim counter, the publish cursor and the gating cursors.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Creates a buffer of `capacity` empty slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is less than 2 or not a power of two.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "capacity must be at least 2");
        assert!(capacity.is_power_of_two(), "capacity must be a power of 2");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(SignalSlot::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            index_mask: capacity - 1,
        }
    }

    #[inline]
    fn index_of(&self, sequence: i64) -> usize {
        (sequence as usize) & self.index_mask
    }

    /// Returns a raw pointer to the slot for `sequence`.
    ///
    /// Dereferencing it is only sound under the rules listed on the type:
    /// exclusive claim for writes, observed publication for reads.
    #[inline]
    pub(crate) fn get(&self, sequence: i64) -> *mut SignalSlot<T> {
        let index = self.index_of(sequence);
        // SAFETY: `index_mask` keeps `index` inside `slots`.
        unsafe { self.slots.get_unchecked(index).get() }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Signal, SignalType};

    #[test]
    fn test_ring_buffer_capacity() {
        assert_eq!(RingBuffer::<u32>::new(2).capacity(), 2);
        assert_eq!(RingBuffer::<u32>::new(1024).capacity(), 1024);
    }

    #[test]
    #[should_panic(expected = "capacity must be a power of 2")]
    fn test_ring_buffer_invalid_capacity_not_power_of_two() {
        RingBuffer::<u32>::new(6);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 2")]
    fn test_ring_buffer_invalid_capacity_too_small() {
        RingBuffer::<u32>::new(1);
    }

    #[test]
    fn test_sequences_wrap_onto_the_same_slot() {
        let rb = RingBuffer::<u32>::new(4);
        assert_eq!(rb.index_of(0), 0);
        assert_eq!(rb.index_of(3), 3);
        assert_eq!(rb.index_of(4), 0);
        assert_eq!(rb.index_of(-1), 3);
        assert_eq!(rb.get(1), rb.get(5));
    }

    #[test]
    fn test_slots_are_reused_in_place() {
        let rb = RingBuffer::<u32>::new(2);
        let first = rb.get(0);

        unsafe {
            (*rb.get(0)).write(0, Signal::Next(10));
            (*rb.get(2)).write(2, Signal::Complete);
        }

        assert_eq!(first, rb.get(2));
        unsafe {
            assert_eq!((*first).sequence, 2);
            assert_eq!((*first).kind, SignalType::Complete);
            assert!((*first).value.is_none());
        }
    }

    #[test]
    fn test_ring_buffer_starts_with_unwritten_slots() {
        let rb = RingBuffer::<String>::new(4);
        for seq in 0..rb.capacity() as i64 {
            unsafe {
                assert_eq!((*rb.get(seq)).sequence, -1);
                assert!((*rb.get(seq)).value.is_none());
            }
        }
    }
}
