use super::demand::{self, add_cap, sub_or_report};
use super::{Subscription, UNBOUNDED};
use crossbeam_utils::atomic::AtomicCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

type Upstream = Arc<dyn Subscription>;

/// Presents a sequence of upstream subscriptions as one to a subscriber.
///
/// Keeps the downstream's outstanding demand across upstream switches:
/// when a new upstream is installed it is asked for whatever is still owed,
/// i.e. everything requested minus everything [`produced`] so far.
///
/// All mutation of the current upstream and of the demand counter happens in
/// a drain loop entered by whoever moves `wip` off zero. Callers that find
/// the loop busy leave their update in a `missed_*` slot and the active
/// drainer picks it up before exiting.
///
/// [`produced`]: SubscriptionArbiter::produced
pub struct SubscriptionArbiter {
    actual: AtomicCell<Option<Upstream>>,
    requested: AtomicU64,
    missed_subscription: AtomicCell<Option<Upstream>>,
    missed_requested: AtomicU64,
    missed_produced: AtomicU64,
    wip: AtomicUsize,
    cancelled: AtomicBool,
    unbounded: AtomicBool,
}

impl Default for SubscriptionArbiter {
    fn default() -> Self {
        Self {
            actual: AtomicCell::new(None),
            requested: AtomicU64::new(0),
            missed_subscription: AtomicCell::new(None),
            missed_requested: AtomicU64::new(0),
            missed_produced: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            unbounded: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for SubscriptionArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionArbiter")
            .field("requested", &self.requested.load(Ordering::Relaxed))
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SubscriptionArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Outstanding demand as last settled by the drain loop.
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }

    /// Switches to a new upstream, requesting the outstanding demand from it.
    ///
    /// The previous upstream is assumed to have terminated and is not
    /// cancelled. After [`cancel`](Subscription::cancel), `s` is cancelled
    /// right away.
    pub fn set(&self, s: Upstream) {
        if self.is_cancelled() {
            s.cancel();
            return;
        }

        if self.try_enter() {
            self.actual.store(Some(Arc::clone(&s)));
            let r = self.requested.load(Ordering::Relaxed);
            self.leave();
            if r != 0 {
                s.request(r);
            }
            return;
        }

        self.missed_subscription.store(Some(s));
        self.drain();
    }

    /// Accounts for `n` elements delivered by the current upstream.
    pub fn produced(&self, n: u64) {
        if n == 0 || self.unbounded.load(Ordering::Acquire) {
            return;
        }

        if self.try_enter() {
            let r = self.requested.load(Ordering::Relaxed);
            if r != UNBOUNDED {
                self.requested.store(sub_or_report(r, n), Ordering::Relaxed);
            } else {
                self.unbounded.store(true, Ordering::Release);
            }
            self.leave();
            return;
        }

        demand::get_and_add_cap(&self.missed_produced, n);
        self.drain();
    }

    fn try_enter(&self) -> bool {
        self.wip
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Leaves the fast path, draining whatever arrived meanwhile.
    fn leave(&self) {
        if self.wip.fetch_sub(1, Ordering::AcqRel) != 1 {
            self.drain_loop();
        }
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        self.drain_loop();
    }

    fn drain_loop(&self) {
        let mut missed = 1;
        let mut request_amount = 0u64;
        let mut request_target: Option<Upstream> = None;

        loop {
            let ms = self.missed_subscription.take();
            let mr = self.missed_requested.swap(0, Ordering::AcqRel);
            let mp = self.missed_produced.swap(0, Ordering::AcqRel);

            if self.is_cancelled() {
                if let Some(a) = self.actual.take() {
                    a.cancel();
                }
                if let Some(ms) = ms {
                    ms.cancel();
                }
                request_target = None;
            } else {
                let mut r = self.requested.load(Ordering::Relaxed);
                if r != UNBOUNDED {
                    let u = add_cap(r, mr);
                    r = if u != UNBOUNDED { sub_or_report(u, mp) } else { u };
                    self.requested.store(r, Ordering::Relaxed);
                    if r == UNBOUNDED {
                        self.unbounded.store(true, Ordering::Release);
                    }
                }

                if let Some(ms) = ms {
                    self.actual.store(Some(Arc::clone(&ms)));
                    if r != 0 {
                        request_amount = add_cap(request_amount, r);
                        request_target = Some(ms);
                    }
                } else if mr != 0 {
                    let a = self.actual.take();
                    if let Some(a) = a {
                        self.actual.store(Some(Arc::clone(&a)));
                        request_amount = add_cap(request_amount, mr);
                        request_target = Some(a);
                    }
                }
            }

            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                if request_amount != 0 {
                    if let Some(target) = request_target {
                        target.request(request_amount);
                    }
                }
                return;
            }
        }
    }
}

impl Subscription for SubscriptionArbiter {
    fn request(&self, n: u64) {
        if !demand::validate(n) || self.unbounded.load(Ordering::Acquire) {
            return;
        }

        if self.try_enter() {
            let r = self.requested.load(Ordering::Relaxed);
            if r != UNBOUNDED {
                let u = add_cap(r, n);
                self.requested.store(u, Ordering::Relaxed);
                if u == UNBOUNDED {
                    self.unbounded.store(true, Ordering::Release);
                }
            }
            let a = self.actual.take();
            if let Some(a) = &a {
                self.actual.store(Some(Arc::clone(a)));
            }
            self.leave();
            if let Some(a) = a {
                a.request(n);
            }
            return;
        }

        demand::get_and_add_cap(&self.missed_requested, n);
        self.drain();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.drain();
        }
    }
}
