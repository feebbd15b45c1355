//! In-process signal rings and backpressure-aware operators.
//!
//! The lower layer is a preallocated ring of [`SignalSlot`]s shared by any
//! number of [`Publisher`]s and [`Consumer`]s. Publishers claim a sequence,
//! write its slot and publish it; consumers wait on a [`SequenceBarrier`]
//! using one of the [`wait`] strategies and read slots in sequence order.
//!
//! The upper layer is the [`flow`] contract (source, subscriber, demand and
//! cancellation) with the [`Reduce`] and [`Retry`] operators, and the
//! [`RingBufferProcessor`] that feeds the ring from a source and dispatches
//! it to subscribers.
//!
//! ```
//! use eddy::wait::YieldingWaitStrategy;
//! use eddy::Signal;
//! use std::sync::Arc;
//!
//! let (tx, mut rx) = eddy::channel::<u32>(8, Arc::new(YieldingWaitStrategy));
//! tx.next(1);
//! tx.complete();
//!
//! assert!(matches!(rx.next().unwrap(), Signal::Next(1)));
//! assert!(matches!(rx.next().unwrap(), Signal::Complete));
//! ```

mod bus;
pub mod config;
mod consumer;
mod cursor;
mod error;
pub mod flow;
pub mod hooks;
mod ops;
mod processor;
mod publisher;
mod ring_buffer;
mod sequence_barrier;
mod signal;
pub mod wait;

pub use crate::bus::channel;
pub use crate::consumer::Consumer;
pub use crate::cursor::{Cursor, INITIAL_SEQUENCE};
pub use crate::error::{FlowError, WaitError};
pub use crate::ops::{Reduce, Retry};
pub use crate::processor::RingBufferProcessor;
pub use crate::publisher::{Claim, Publisher};
pub use crate::sequence_barrier::SequenceBarrier;
pub use crate::signal::{Signal, SignalSlot, SignalType};
