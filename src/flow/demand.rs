//! Demand arithmetic.
//!
//! Demand saturates at [`UNBOUNDED`]; once there, nothing is ever subtracted.

use super::UNBOUNDED;
use crate::error::FlowError;
use crate::hooks;
use std::sync::atomic::{AtomicU64, Ordering};

/// `a + b`, capped at [`UNBOUNDED`].
#[inline]
pub fn add_cap(a: u64, b: u64) -> u64 {
    a.saturating_add(b)
}

/// Checks that a request is positive; reports and rejects it otherwise.
pub fn validate(n: u64) -> bool {
    if n == 0 {
        hooks::on_error_dropped(FlowError::Protocol(
            "request amount must be positive, got 0".to_string(),
        ));
        return false;
    }
    true
}

/// Atomically adds `n` to `requested` with [`add_cap`]; returns the previous value.
pub fn get_and_add_cap(requested: &AtomicU64, n: u64) -> u64 {
    let mut current = requested.load(Ordering::Acquire);
    loop {
        if current == UNBOUNDED {
            return UNBOUNDED;
        }
        match requested.compare_exchange_weak(
            current,
            add_cap(current, n),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(previous) => return previous,
            Err(actual) => current = actual,
        }
    }
}

/// Removes `n` delivered elements from `requested` and returns the remainder.
///
/// Unbounded demand is left untouched. Producing more than was requested is
/// a protocol violation; it is reported and the demand clamps to zero.
pub fn produced(requested: &AtomicU64, n: u64) -> u64 {
    let mut current = requested.load(Ordering::Acquire);
    loop {
        if current == UNBOUNDED {
            return UNBOUNDED;
        }
        let next = sub_or_report(current, n);
        match requested.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return next,
            Err(actual) => current = actual,
        }
    }
}

/// `current - n`, reporting an overflow and clamping to zero.
pub(crate) fn sub_or_report(current: u64, n: u64) -> u64 {
    current.checked_sub(n).unwrap_or_else(|| {
        hooks::on_error_dropped(FlowError::Protocol(format!(
            "more produced ({n}) than requested ({current})"
        )));
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testing::capture_dropped;

    #[test]
    fn test_add_cap_saturates() {
        assert_eq!(add_cap(1, 2), 3);
        assert_eq!(add_cap(UNBOUNDED - 1, 5), UNBOUNDED);
        assert_eq!(add_cap(UNBOUNDED, UNBOUNDED), UNBOUNDED);
    }

    #[test]
    fn test_zero_request_is_reported() {
        let seen = capture_dropped(|| assert!(!validate(0)));
        assert!(seen
            .iter()
            .any(|e| e.to_string().contains("request amount must be positive")));
        assert!(validate(1));
    }

    #[test]
    fn test_get_and_add_cap_returns_previous() {
        let requested = AtomicU64::new(0);
        assert_eq!(get_and_add_cap(&requested, 3), 0);
        assert_eq!(get_and_add_cap(&requested, UNBOUNDED), 3);
        assert_eq!(requested.load(Ordering::Relaxed), UNBOUNDED);
        assert_eq!(get_and_add_cap(&requested, 1), UNBOUNDED);
    }

    #[test]
    fn test_produced_leaves_unbounded_alone() {
        let requested = AtomicU64::new(5);
        assert_eq!(produced(&requested, 2), 3);

        let unbounded = AtomicU64::new(UNBOUNDED);
        assert_eq!(produced(&unbounded, 2), UNBOUNDED);
    }

    #[test]
    fn test_overproduction_clamps_to_zero() {
        let seen = capture_dropped(|| {
            let requested = AtomicU64::new(1);
            assert_eq!(produced(&requested, 4), 0);
        });
        assert!(seen
            .iter()
            .any(|e| e.to_string().contains("more produced (4) than requested (1)")));
    }
}
