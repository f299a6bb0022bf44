//! Contention counters kept by each manager.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters. Relaxed ordering: these are diagnostics, not
/// synchronization.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub admitted: AtomicU64,
    pub conflict_waits: AtomicU64,
    pub commit_retries: AtomicU64,
    pub removal_retries: AtomicU64,
    pub timeouts: AtomicU64,
}

impl Counters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ManagerStats {
        ManagerStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            conflict_waits: self.conflict_waits.load(Ordering::Relaxed),
            commit_retries: self.commit_retries.load(Ordering::Relaxed),
            removal_retries: self.removal_retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a manager's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Borrowings admitted into the registry.
    pub admitted: u64,
    /// Times a caller blocked on a conflicting borrowing.
    pub conflict_waits: u64,
    /// Admissions whose commit lost a race and restarted.
    pub commit_retries: u64,
    /// Removals whose commit lost a race and restarted.
    pub removal_retries: u64,
    /// Timed admissions that gave up.
    pub timeouts: u64,
}

impl ManagerStats {
    /// Conflict waits per admission. Above 1.0 the average operation
    /// blocked more than once before running.
    pub fn wait_ratio(&self) -> f64 {
        if self.admitted == 0 {
            return 0.0;
        }
        self.conflict_waits as f64 / self.admitted as f64
    }

    /// LOW (<0.25), MEDIUM (0.25–1.0), HIGH (1.0–3.0), CRITICAL (>=3.0)
    pub fn severity_label(&self) -> &'static str {
        match self.wait_ratio() {
            r if r >= 3.0 => "CRITICAL",
            r if r >= 1.0 => "HIGH",
            r if r >= 0.25 => "MEDIUM",
            _ => "LOW",
        }
    }
}
