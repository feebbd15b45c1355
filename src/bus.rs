use crate::consumer::Consumer;
use crate::cursor::{Cursor, INITIAL_SEQUENCE};
use crate::publisher::Publisher;
use crate::ring_buffer::RingBuffer;
use crate::wait::WaitStrategy;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct ConsumerIds {
    id: CachePadded<AtomicU64>,
}

impl ConsumerIds {
    pub(crate) fn next_id(&self) -> u64 {
        self.id.fetch_add(1, Ordering::Relaxed)
    }
}

/// State shared by every publisher and consumer of one ring.
#[derive(Debug)]
pub(crate) struct Bus<T> {
    pub(crate) ids: ConsumerIds,
    pub(crate) buffer: RingBuffer<T>,
    /// Highest sequence handed out to a publisher.
    pub(crate) claimed: Cursor,
    /// Highest sequence whose slot is fully written.
    pub(crate) cursor: Arc<Cursor>,
    /// Gating cursor of each live consumer: the last sequence it released.
    pub(crate) consumers: papaya::HashMap<u64, Cursor>,
    pub(crate) wait_strategy: Arc<dyn WaitStrategy>,
}

impl<T> Bus<T> {
    pub(crate) fn new(capacity: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            ids: ConsumerIds::default(),
            buffer: RingBuffer::new(capacity),
            claimed: Cursor::new(INITIAL_SEQUENCE),
            cursor: Arc::new(Cursor::new(INITIAL_SEQUENCE)),
            consumers: Default::default(),
            wait_strategy,
        }
    }

    /// Slowest consumer position, `None` when nobody is consuming.
    pub(crate) fn minimum_gating(&self) -> Option<i64> {
        self.consumers.pin().values().map(Cursor::get).min()
    }
}

/// Creates a ring of `capacity` slots with one publisher and one consumer.
///
/// The consumer sees every signal published from now on. More producers are
/// obtained by cloning the publisher, more consumers with
/// [`Publisher::subscribe`].
///
/// # Panics
///
/// Panics if `capacity` is less than 2 or not a power of two.
pub fn channel<T: Send + Sync>(
    capacity: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
) -> (Publisher<T>, Consumer<T>) {
    let bus = Arc::new(Bus::new(capacity, wait_strategy));
    (
        Publisher::new(Arc::clone(&bus)),
        Consumer::new(bus, INITIAL_SEQUENCE),
    )
}
