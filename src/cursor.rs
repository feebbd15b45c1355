use crossbeam_utils::CachePadded;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicI64, Ordering};

/// Value of a cursor before anything has been published.
pub const INITIAL_SEQUENCE: i64 = -1;

/// A cache-padded 64-bit sequence number.
///
/// Used both for the shared publish cursor and for each consumer's gating
/// position. Producers store with `Release` after the slot write; consumers
/// load with `Acquire` before reading the slot.
#[derive(Debug, Default)]
pub struct Cursor {
    value: CachePadded<AtomicI64>,
}

impl Cursor {
    pub fn new(val: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(val)),
        }
    }

    #[inline]
    pub(crate) fn fetch_add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn compare_exchange(&self, current: i64, next: i64) -> Result<i64, i64> {
        self.value
            .compare_exchange(current, next, Ordering::AcqRel, Ordering::Relaxed)
    }

    /// Loads the value with `Acquire`, pairing with [`Cursor::store`].
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn store(&self, val: i64) {
        self.value.store(val, Ordering::Release)
    }

    #[inline]
    pub(crate) fn relaxed(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl PartialEq<i64> for Cursor {
    fn eq(&self, other: &i64) -> bool {
        self.relaxed() == *other
    }
}

impl PartialOrd<i64> for Cursor {
    fn partial_cmp(&self, other: &i64) -> Option<CmpOrdering> {
        Some(self.relaxed().cmp(other))
    }
}
