//! Signals and the reusable slot record that carries them through the ring.

use crate::cursor::INITIAL_SEQUENCE;
use crate::error::FlowError;

/// Discriminant of a [`SignalSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalType {
    #[default]
    Next,
    Error,
    Complete,
}

/// One element of a reactive sequence.
#[derive(Debug, Clone)]
pub enum Signal<T> {
    Next(T),
    Error(FlowError),
    Complete,
}

impl<T> Signal<T> {
    pub fn signal_type(&self) -> SignalType {
        match self {
            Signal::Next(_) => SignalType::Next,
            Signal::Error(_) => SignalType::Error,
            Signal::Complete => SignalType::Complete,
        }
    }

    /// `true` for `Error` and `Complete`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Signal::Next(_))
    }
}

/// A mutable signal record occupying one ring cell.
///
/// Slots are allocated once with the ring and overwritten in place by every
/// producer that claims their index. Only the field matching `kind` is
/// meaningful; [`SignalSlot::write`] clears the other one.
#[derive(Debug)]
pub struct SignalSlot<T> {
    pub kind: SignalType,
    pub value: Option<T>,
    pub error: Option<FlowError>,
    pub sequence: i64,
}

impl<T> Default for SignalSlot<T> {
    fn default() -> Self {
        Self {
            kind: SignalType::Next,
            value: None,
            error: None,
            sequence: INITIAL_SEQUENCE,
        }
    }
}

impl<T> SignalSlot<T> {
    /// Overwrites the slot with `signal` emitted at `sequence`.
    pub fn write(&mut self, sequence: i64, signal: Signal<T>) {
        self.sequence = sequence;
        self.kind = signal.signal_type();
        match signal {
            Signal::Next(value) => {
                self.value = Some(value);
                self.error = None;
            }
            Signal::Error(error) => {
                self.value = None;
                self.error = Some(error);
            }
            Signal::Complete => {
                self.value = None;
                self.error = None;
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind != SignalType::Next
    }
}

impl<T: Clone> SignalSlot<T> {
    /// Copies the slot out as an owned [`Signal`].
    ///
    /// Returns `None` for a `Next` slot that was never written.
    pub fn snapshot(&self) -> Option<Signal<T>> {
        match self.kind {
            SignalType::Next => self.value.clone().map(Signal::Next),
            SignalType::Error => self.error.clone().map(Signal::Error),
            SignalType::Complete => Some(Signal::Complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_slot_is_empty() {
        let slot = SignalSlot::<u32>::default();
        assert_eq!(slot.sequence, -1);
        assert_eq!(slot.kind, SignalType::Next);
        assert!(slot.snapshot().is_none());
    }

    #[test]
    fn test_overwrite_clears_previous_payload() {
        let mut slot = SignalSlot::default();
        slot.write(0, Signal::Next("a"));
        assert!(matches!(slot.snapshot(), Some(Signal::Next("a"))));

        slot.write(4, Signal::Error(FlowError::Cancelled));
        assert_eq!(slot.sequence, 4);
        assert!(slot.value.is_none());
        assert!(slot.is_terminal());
        assert!(matches!(slot.snapshot(), Some(Signal::Error(FlowError::Cancelled))));

        slot.write(8, Signal::Complete);
        assert!(slot.error.is_none());
        assert!(matches!(slot.snapshot(), Some(Signal::Complete)));
    }

    #[test]
    fn test_signal_terminal_flags() {
        assert!(!Signal::Next(1).is_terminal());
        assert!(Signal::<u8>::Complete.is_terminal());
        assert_eq!(Signal::<u8>::Error(FlowError::Interrupted).signal_type(), SignalType::Error);
    }
}
