//! Defines the `Publisher` end of an `eddy` ring.
//!
//! Publishing happens in three steps: claim a sequence, write its slot, then
//! publish by advancing the shared cursor. Claims are handed out with an
//! atomic increment so any number of cloned publishers can write different
//! slots at once; publication is strictly in sequence order, each publisher
//! waiting for its predecessor before moving the cursor.

use crate::bus::Bus;
use crate::consumer::Consumer;
use crate::error::FlowError;
use crate::signal::{Signal, SignalSlot};
use crossbeam_utils::Backoff;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

/// Exclusive write access to one claimed slot.
///
/// The slot is reset when claimed and published when the claim is dropped,
/// so a claimed sequence can never be left behind and stall the publishers
/// after it. A claim dropped without a write publishes an empty slot, which
/// consumers skip.
pub struct Claim<'a, T> {
    sequence: i64,
    publisher: &'a Publisher<T>,
}

impl<T> Claim<'_, T> {
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Writes `signal` into the claimed slot.
    pub fn write(&mut self, signal: Signal<T>) {
        let sequence = self.sequence;
        self.deref_mut().write(sequence, signal);
    }

    /// Publishes the slot now instead of at drop.
    pub fn publish(self) -> i64 {
        self.sequence
    }
}

impl<T> Deref for Claim<'_, T> {
    type Target = SignalSlot<T>;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the sequence was claimed by this guard alone and the
        // slowest consumer has released the slot's previous lap.
        unsafe { &*self.publisher.bus.buffer.get(self.sequence) }
    }
}

impl<T> DerefMut for Claim<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: same as `deref`; `&mut self` keeps the access unique.
        unsafe { &mut *self.publisher.bus.buffer.get(self.sequence) }
    }
}

impl<T> Drop for Claim<'_, T> {
    fn drop(&mut self) {
        self.publisher.advance_cursor(self.sequence);
    }
}

/// The producing end of a ring.
///
/// `Send + Sync` and cheap to clone; every clone publishes into the same
/// sequence.
#[derive(Debug)]
pub struct Publisher<T> {
    bus: Arc<Bus<T>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<T> Publisher<T> {
    pub(crate) fn new(bus: Arc<Bus<T>>) -> Self {
        Self { bus }
    }

    /// Reserves the next sequence and returns write access to its slot.
    ///
    /// When the ring is full this blocks, backing off from spinning to
    /// yielding, until the slot being reused is published and released by
    /// the slowest consumer. With no consumers registered only the publish
    /// cursor gates the claim, so a thread that holds a claim and claims
    /// `capacity` more sequences blocks forever.
    pub fn claim(&self) -> Claim<'_, T> {
        let sequence = self.bus.claimed.fetch_add(1) + 1;
        self.wait_for_capacity(sequence);

        let mut claim = Claim {
            sequence,
            publisher: self,
        };
        let slot = claim.deref_mut();
        slot.kind = Default::default();
        slot.value = None;
        slot.error = None;
        slot.sequence = sequence;
        claim
    }

    /// Claims, writes and publishes `signal`, returning its sequence.
    pub fn publish(&self, signal: Signal<T>) -> i64 {
        let mut claim = self.claim();
        claim.write(signal);
        claim.publish()
    }

    pub fn next(&self, value: T) -> i64 {
        self.publish(Signal::Next(value))
    }

    pub fn error(&self, error: FlowError) -> i64 {
        self.publish(Signal::Error(error))
    }

    pub fn complete(&self) -> i64 {
        self.publish(Signal::Complete)
    }

    /// Highest published sequence.
    pub fn cursor(&self) -> i64 {
        self.bus.cursor.get()
    }

    /// Registers a new consumer that sees everything published from now on.
    pub fn subscribe(&self) -> Consumer<T> {
        // Gate at a cursor value already seen, then move to the cursor as
        // it stands once the gate is visible to claimants.
        let consumer = Consumer::new(Arc::clone(&self.bus), self.bus.cursor.get());
        fence(Ordering::SeqCst);
        consumer.release(self.bus.cursor.get());
        consumer
    }

    fn wait_for_capacity(&self, sequence: i64) {
        let wrap_point = sequence - self.bus.buffer.capacity() as i64;
        let backoff = Backoff::new();

        // Writing `sequence` reuses the slot of `wrap_point`, which must be
        // published and released by every consumer.
        loop {
            let cursor = self.bus.cursor.get();
            let min = self
                .bus
                .minimum_gating()
                .map_or(cursor, |gating| gating.min(cursor));
            if wrap_point <= min {
                return;
            }
            backoff.snooze();
        }
    }

    fn advance_cursor(&self, sequence: i64) {
        let backoff = Backoff::new();
        while self
            .bus
            .cursor
            .compare_exchange(sequence - 1, sequence)
            .is_err()
        {
            backoff.snooze();
        }
        self.bus.wait_strategy.signal_all_when_blocking();
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::channel;
    use crate::signal::{Signal, SignalType};
    use crate::wait::{BlockingWaitStrategy, YieldingWaitStrategy};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_claim_write_publish() {
        let (tx, mut rx) = channel::<i32>(4, Arc::new(YieldingWaitStrategy));

        let mut claim = tx.claim();
        assert_eq!(claim.sequence(), 0);
        claim.write(Signal::Next(100));
        assert_eq!(claim.kind, SignalType::Next);
        assert_eq!(tx.cursor(), -1, "nothing is visible before publish");
        assert_eq!(claim.publish(), 0);
        assert_eq!(tx.cursor(), 0);

        assert!(matches!(rx.next(), Ok(Signal::Next(100))));
    }

    #[test]
    fn test_publish_without_consumers_never_blocks() {
        let (tx, rx) = channel::<u32>(2, Arc::new(YieldingWaitStrategy));
        drop(rx);

        for i in 0..10 {
            tx.next(i);
        }
        assert_eq!(tx.cursor(), 9);
    }

    #[test]
    fn test_claims_never_share_a_slot_without_consumers() {
        let (tx, rx) = channel::<u32>(2, Arc::new(YieldingWaitStrategy));
        drop(rx);

        let mut first = tx.claim();
        let second = tx.claim();
        assert_eq!((first.sequence(), second.sequence()), (0, 1));

        let (claimed_tx, claimed_rx) = mpsc::channel();
        let lapping = {
            let tx = tx.clone();
            thread::spawn(move || {
                let mut claim = tx.claim();
                claimed_tx.send(claim.sequence()).unwrap();
                claim.write(Signal::Next(30));
            })
        };

        assert!(
            claimed_rx.recv_timeout(Duration::from_millis(50)).is_err(),
            "slot 0 is still being written"
        );
        first.write(Signal::Next(10));
        assert_eq!(first.value, Some(10));
        first.publish();
        second.publish();

        assert_eq!(claimed_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
        lapping.join().unwrap();
        assert_eq!(tx.cursor(), 2);
    }

    #[test]
    fn test_subscribers_joining_a_running_ring_read_intact_slots() {
        let (tx, rx) = channel::<i64>(4, Arc::new(YieldingWaitStrategy));
        drop(rx);

        let stop = Arc::new(AtomicBool::new(false));
        let producer = {
            let tx = tx.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let mut claim = tx.claim();
                    let sequence = claim.sequence();
                    claim.write(Signal::Next(sequence));
                }
            })
        };

        for _ in 0..2_000 {
            let mut rx = tx.subscribe();
            let mut expected = rx.position() + 1;
            for _ in 0..3 {
                rx.drain(|slot| {
                    assert_eq!(slot.sequence, expected);
                    assert_eq!(slot.value, Some(expected));
                    expected += 1;
                })
                .unwrap();
            }
        }

        stop.store(true, Ordering::Relaxed);
        producer.join().unwrap();
    }

    #[test]
    fn test_full_ring_blocks_publisher_until_released() {
        let (tx, mut rx) = channel::<u32>(2, Arc::new(BlockingWaitStrategy::new()));
        tx.next(1);
        tx.next(2);

        let (done_tx, done_rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            tx.next(3);
            done_tx.send(()).unwrap();
        });

        assert!(
            done_rx.recv_timeout(Duration::from_millis(50)).is_err(),
            "publisher must wait for the slowest consumer"
        );

        assert!(matches!(rx.next(), Ok(Signal::Next(1))));
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("publisher should be unblocked");
        producer.join().unwrap();

        assert!(matches!(rx.next(), Ok(Signal::Next(2))));
        assert!(matches!(rx.next(), Ok(Signal::Next(3))));
    }

    #[test]
    fn test_dynamic_subscribe_starts_at_cursor() {
        let (tx, mut rx1) = channel::<String>(4, Arc::new(YieldingWaitStrategy));
        tx.next("A".to_string());

        let mut rx2 = tx.subscribe();
        tx.next("B".to_string());

        assert!(matches!(rx1.next(), Ok(Signal::Next(s)) if s == "A"));
        assert!(matches!(rx1.next(), Ok(Signal::Next(s)) if s == "B"));
        assert!(matches!(rx2.next(), Ok(Signal::Next(s)) if s == "B"));
    }

    #[test]
    fn test_dropped_claim_is_skipped() {
        let (tx, mut rx) = channel::<u32>(4, Arc::new(YieldingWaitStrategy));
        drop(tx.claim());
        tx.next(7);

        assert!(matches!(rx.next(), Ok(Signal::Next(7))));
        assert_eq!(tx.cursor(), 1);
    }

    #[test]
    fn test_many_producers_publish_in_sequence_order() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 500;

        let (tx, mut rx) = channel::<u64>(8, Arc::new(YieldingWaitStrategy));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        tx.next(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        let mut last_per_producer = vec![None; PRODUCERS as usize];
        while seen.len() < (PRODUCERS * PER_PRODUCER) as usize {
            rx.drain(|slot| {
                if let Some(v) = slot.value {
                    let producer = (v / PER_PRODUCER) as usize;
                    if let Some(prev) = last_per_producer[producer] {
                        assert!(v > prev, "a producer's values stay in order");
                    }
                    last_per_producer[producer] = Some(v);
                    seen.push(v);
                }
            })
            .unwrap();
        }

        for h in handles {
            h.join().unwrap();
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
    }
}
