//! One operation's claim over a set of properties.

use custody_core::ClaimSet;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_BORROWING_ID: AtomicU64 = AtomicU64::new(1);

/// Unique tag of a borrowing; used for removal from a registry and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BorrowingId(u64);

impl BorrowingId {
    fn next() -> Self {
        Self(NEXT_BORROWING_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BorrowingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// A single-use claim: created, admitted, released, revoked.
///
/// The claim set never changes after construction. `revoked` only ever goes
/// from `false` to `true`, and waiters re-check it under the lock after
/// every wake, so a `revoke` racing a `wait` cannot be missed.
#[derive(Debug)]
pub struct Borrowing {
    id: BorrowingId,
    claims: ClaimSet,
    revoked: Mutex<bool>,
    released: Condvar,
}

impl Borrowing {
    pub fn new(claims: ClaimSet) -> Self {
        Self {
            id: BorrowingId::next(),
            claims,
            revoked: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> BorrowingId {
        self.id
    }

    #[inline]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn has_conflict_with(&self, other: &Borrowing) -> bool {
        self.claims.conflicts_with(&other.claims)
    }

    pub fn is_revoked(&self) -> bool {
        *self.revoked.lock()
    }

    /// Blocks until this borrowing is revoked.
    pub fn wait(&self) {
        let mut revoked = self.revoked.lock();
        while !*revoked {
            self.released.wait(&mut revoked);
        }
    }

    /// Blocks until this borrowing is revoked or `timeout` elapses.
    /// Returns whether it was revoked.
    ///
    /// A timeout too large to express as a deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut revoked = self.revoked.lock();
        while !*revoked {
            if self.released.wait_until(&mut revoked, deadline).timed_out() {
                break;
            }
        }
        *revoked
    }

    /// Marks the borrowing released and wakes every waiter. Idempotent.
    pub fn revoke(&self) {
        let mut revoked = self.revoked.lock();
        if !*revoked {
            *revoked = true;
            self.released.notify_all();
        }
    }
}
