use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::{Result, Status};

/// Injects I/O errors into store reads.
///
/// Arm it with a number of failures; each guarded read consumes one and
/// fails with an injected `IOError` until the budget is spent.
#[derive(Debug, Default)]
pub struct FaultInjector {
    armed: AtomicU64,
    injected: AtomicU64,
}

impl FaultInjector {
    pub fn new() -> Self {
        FaultInjector::default()
    }

    pub fn arm(&self, failures: u64) {
        self.armed.store(failures, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(0, Ordering::SeqCst);
    }

    /// Total failures injected so far.
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    pub fn check(&self, op: &str) -> Result<()> {
        let fired = self
            .armed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fired {
            self.injected.fetch_add(1, Ordering::Relaxed);
            return Err(Status::injected_io_error(format!("{op} failed")));
        }
        Ok(())
    }
}
