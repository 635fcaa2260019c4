use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lock-free Idle/Busy flag guarding the single in-flight worker cycle.
///
/// Only the capture context moves Idle → Busy ([`try_admit`](Self::try_admit)).
/// Busy → Idle ([`release`](Self::release)) happens when the worker publishes,
/// or on the capture side when an admitted frame never reaches the worker.
/// Frames that arrive while Busy are dropped, never queued.
#[derive(Debug, Default)]
pub struct AdmissionGate {
    busy: AtomicBool,
    admissions: AtomicU64,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims the gate. Returns `false` if a cycle is in flight.
    pub fn try_admit(&self) -> bool {
        let admitted = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if admitted {
            self.admissions.fetch_add(1, Ordering::Relaxed);
        }
        admitted
    }

    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Total Idle → Busy transitions since creation.
    pub fn admissions(&self) -> u64 {
        self.admissions.load(Ordering::Relaxed)
    }
}
