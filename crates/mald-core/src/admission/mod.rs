use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tracing::{error, trace};

use crate::metrics::{MetricsHandle, NoopMetrics};

/// Bounds the number of concurrently running classification jobs.
///
/// Invariant: `0 <= active <= capacity`. Both the check-and-increment in
/// [`try_acquire`](Self::try_acquire) and the decrement in
/// [`release`](Self::release) are single atomic read-modify-write operations.
pub struct AdmissionController {
    active: AtomicUsize,
    capacity: usize,
    metrics: MetricsHandle,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            capacity,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Take a slot if one is free. Leaves the counter untouched on refusal.
    pub fn try_acquire(&self) -> bool {
        let acquired = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.capacity).then_some(active + 1)
            });

        match acquired {
            Ok(prev) => {
                trace!(active = prev + 1, capacity = self.capacity, "admission slot acquired");
                self.metrics.slot_acquired();
                true
            }
            Err(active) => {
                trace!(active, capacity = self.capacity, "admission refused");
                false
            }
        }
    }

    /// Give a slot back.
    ///
    /// Releasing with no slot held is a bug in the caller: it panics in debug
    /// builds and is logged (without touching the counter) otherwise.
    pub fn release(&self) {
        match self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                active.checked_sub(1)
            }) {
            Ok(prev) => {
                trace!(active = prev - 1, capacity = self.capacity, "admission slot released");
                self.metrics.slot_released();
            }
            Err(_) => {
                error!(capacity = self.capacity, "admission slot released while none was held");
                debug_assert!(false, "admission slot released while none was held");
            }
        }
    }

    /// Like [`try_acquire`](Self::try_acquire), but the slot is tied to the
    /// returned guard and released when it drops.
    pub fn try_acquire_permit(self: &Arc<Self>) -> Option<AdmissionPermit> {
        self.try_acquire().then(|| AdmissionPermit {
            controller: Arc::clone(self),
        })
    }

    #[inline]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One held admission slot. Dropping it releases the slot exactly once.
#[must_use = "dropping the permit releases the admission slot immediately"]
pub struct AdmissionPermit {
    controller: Arc<AdmissionController>,
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("active", &self.controller.active())
            .field("capacity", &self.controller.capacity())
            .finish()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.controller.release();
    }
}
