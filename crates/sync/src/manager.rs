//! The admission protocol.
//!
//! `borrow` runs in three phases:
//!   1. Activate: snapshot the registry, look for a conflicting borrowing
//!      outside the lock, wait on it if found, otherwise commit
//!      `snapshot + candidate` iff the registry is still the same `Arc`.
//!   2. Execute the operation with accessors for the claimed properties.
//!   3. Deactivate (same snapshot/commit loop, removing) and revoke, on
//!      every exit path including unwinding.
//!
//! The registry lock is only held for a pointer clone or a
//! compare-and-replace; it is never held while waiting.

use crate::borrowing::Borrowing;
use crate::registry::Registry;
use crate::set::{PropertyIds, PropertySet};
use crate::stats::{Counters, ManagerStats};
use custody_core::{AccessMode, BorrowError, Claim, ClaimSet};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_LABEL: &str = "shared";

/// Grants operations temporary ownership of the properties they name.
///
/// Construct one and pass it (by reference or `Arc`) to whatever needs it.
/// Using a single manager for an entire application rules out circular
/// waits; scoping managers to components is also safe, since each one's
/// admission is self-contained.
pub struct SharedManager {
    label: String,
    registry: Mutex<Arc<Registry>>,
    counters: Counters,
}

impl SharedManager {
    pub fn new() -> Self {
        Self::named(DEFAULT_LABEL)
    }

    /// Manager whose log events carry `label`.
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            registry: Mutex::new(Arc::new(Registry::new())),
            counters: Counters::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs `operation` with exclusive access to every property in
    /// `properties`, blocking while any of them is borrowed elsewhere.
    ///
    /// Whatever the operation returns (including an `Err`) is passed
    /// through after the borrowing is released. A panic in the operation
    /// releases the borrowing and keeps unwinding.
    ///
    /// Return values, not accessors. An accessor returned from `operation`
    /// still holds its property after the borrowing is released: later
    /// borrowers are admitted and then block until it is dropped, and a
    /// thread that borrows the same property again while holding one
    /// deadlocks.
    ///
    /// ```
    /// use custody_sync::{Property, SharedManager};
    ///
    /// let manager = SharedManager::new();
    /// let (balance, traffic) = (Property::new(100_i64), Property::new(50_i64));
    ///
    /// let after = manager.borrow((&balance, &traffic), |(mut b, mut t)| {
    ///     *b -= 30;
    ///     *t += 1;
    ///     (*b, *t)
    /// });
    /// assert_eq!(after, (70, 51));
    /// ```
    ///
    /// # Panics
    /// Panics if `properties` is empty or names the same property twice.
    pub fn borrow<'p, S, F, R>(&self, properties: S, operation: F) -> R
    where
        S: PropertySet<'p>,
        F: FnOnce(S::Accessors) -> R,
    {
        let candidate = self.candidate(properties.ids(), AccessMode::Write);
        let admitted = self.activate(&candidate, None);
        debug_assert!(admitted, "untimed admission cannot give up");

        let _admission = Admission::new(self, candidate);
        operation(properties.open())
    }

    /// Like [`borrow`](Self::borrow), but gives up once `timeout` has passed
    /// without admission. On timeout the registry is left as it was and the
    /// operation never runs.
    ///
    /// # Panics
    /// Panics if `properties` is empty or names the same property twice.
    pub fn try_borrow_for<'p, S, F, R>(
        &self,
        properties: S,
        timeout: Duration,
        operation: F,
    ) -> Result<R, BorrowError>
    where
        S: PropertySet<'p>,
        F: FnOnce(S::Accessors) -> R,
    {
        let started = Instant::now();
        let candidate = self.candidate(properties.ids(), AccessMode::Write);

        // No representable deadline means no deadline.
        let deadline = started.checked_add(timeout);
        if !self.activate(&candidate, deadline) {
            candidate.revoke();
            Counters::bump(&self.counters.timeouts);
            let waited = started.elapsed();
            tracing::debug!(
                manager = %self.label,
                borrowing = %candidate.id(),
                waited_ms = waited.as_millis(),
                "admission timed out"
            );
            return Err(BorrowError::TimedOut { waited });
        }

        let _admission = Admission::new(self, candidate);
        Ok(operation(properties.open()))
    }

    /// Read-only variant of [`borrow`](Self::borrow).
    ///
    /// Claims every property in shared mode: overlapping `inspect` calls run
    /// in parallel, while any `borrow` touching one of the properties
    /// excludes them. `borrow` itself is unaffected and stays exclusive.
    ///
    /// # Panics
    /// Panics if `properties` is empty or names the same property twice.
    pub fn inspect<'p, S, F, R>(&self, properties: S, operation: F) -> R
    where
        S: PropertySet<'p>,
        F: FnOnce(S::Readers) -> R,
    {
        let candidate = self.candidate(properties.ids(), AccessMode::Read);
        let admitted = self.activate(&candidate, None);
        debug_assert!(admitted, "untimed admission cannot give up");

        let _admission = Admission::new(self, candidate);
        operation(properties.open_shared())
    }

    pub fn stats(&self) -> ManagerStats {
        self.counters.snapshot()
    }

    /// Number of borrowings currently admitted.
    pub fn active_borrowings(&self) -> usize {
        self.snapshot().len()
    }

    // -----------------------------------------------------------------------
    // Protocol
    // -----------------------------------------------------------------------

    fn candidate(&self, mut ids: PropertyIds, mode: AccessMode) -> Arc<Borrowing> {
        assert!(!ids.is_empty(), "borrow requires at least one property");
        ids.sort_unstable();
        assert!(
            ids.windows(2).all(|w| w[0] != w[1]),
            "the same property was passed twice to one borrow"
        );

        let claims: ClaimSet = ids.into_iter().map(|id| Claim { id, mode }).collect();
        Arc::new(Borrowing::new(claims))
    }

    fn snapshot(&self) -> Arc<Registry> {
        Arc::clone(&*self.registry.lock())
    }

    /// Installs `next` iff the registry is still `expected`.
    ///
    /// Identity, not contents: the caller holds `expected` alive, so its
    /// address cannot have been reused by a newer snapshot.
    fn commit(&self, expected: &Arc<Registry>, next: Arc<Registry>) -> bool {
        let mut current = self.registry.lock();
        if !Arc::ptr_eq(&*current, expected) {
            return false;
        }
        *current = next;
        true
    }

    /// Returns false only if `deadline` passed before admission.
    fn activate(&self, candidate: &Arc<Borrowing>, deadline: Option<Instant>) -> bool {
        loop {
            let snapshot = self.snapshot();

            let conflicting = snapshot.search_for_conflicting_borrowing_with(candidate);
            if let Some(conflicting) = conflicting {
                drop(snapshot);
                Counters::bump(&self.counters.conflict_waits);
                tracing::trace!(
                    manager = %self.label,
                    borrowing = %candidate.id(),
                    blocked_on = %conflicting.id(),
                    "conflict, waiting"
                );

                match deadline {
                    None => conflicting.wait(),
                    Some(deadline) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() || !conflicting.wait_timeout(remaining) {
                            return false;
                        }
                    }
                }
                continue;
            }

            let next = Arc::new(snapshot.copy_with_added(Arc::clone(candidate)));
            if self.commit(&snapshot, next) {
                Counters::bump(&self.counters.admitted);
                tracing::debug!(
                    manager = %self.label,
                    borrowing = %candidate.id(),
                    claims = candidate.claims().len(),
                    "admitted"
                );
                return true;
            }

            Counters::bump(&self.counters.commit_retries);
            tracing::trace!(
                manager = %self.label,
                borrowing = %candidate.id(),
                "registry changed before commit, retrying"
            );
        }
    }

    fn deactivate(&self, candidate: &Borrowing) {
        loop {
            let snapshot = self.snapshot();
            let next = Arc::new(snapshot.copy_with_removed(candidate));
            if self.commit(&snapshot, next) {
                break;
            }
            Counters::bump(&self.counters.removal_retries);
        }

        candidate.revoke();
        tracing::debug!(manager = %self.label, borrowing = %candidate.id(), "released");
    }
}

impl Default for SharedManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedManager")
            .field("label", &self.label)
            .field("active", &self.active_borrowings())
            .finish()
    }
}

/// Releases an admitted borrowing when dropped, unwinding included.
struct Admission<'m> {
    manager: &'m SharedManager,
    borrowing: Arc<Borrowing>,
}

impl<'m> Admission<'m> {
    fn new(manager: &'m SharedManager, borrowing: Arc<Borrowing>) -> Self {
        Self { manager, borrowing }
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.manager.deactivate(&self.borrowing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn borrow_returns_operation_result() {
        let manager = SharedManager::new();
        let balance = Property::new(100_i64);

        let after = manager.borrow(&balance, |mut acc| {
            *acc -= 30;
            *acc
        });

        assert_eq!(after, 70);
        assert_eq!(manager.active_borrowings(), 0);
        assert_eq!(manager.stats().admitted, 1);
    }

    #[test]
    fn registry_holds_borrowing_only_while_operation_runs() {
        let manager = SharedManager::new();
        let p = Property::new(());

        let inside = manager.borrow(&p, |_| manager.active_borrowings());
        assert_eq!(inside, 1);
        assert_eq!(manager.active_borrowings(), 0);
    }

    #[test]
    fn disjoint_borrows_nest_on_one_manager() {
        let manager = SharedManager::new();
        let a = Property::new(1);
        let b = Property::new(2);

        let sum = manager.borrow(&a, |acc_a| manager.borrow(&b, |acc_b| *acc_a + *acc_b));
        assert_eq!(sum, 3);
    }

    #[test]
    fn stale_snapshot_cannot_commit() {
        let manager = SharedManager::new();
        let stale = manager.snapshot();

        // Add and remove: same contents as `stale`, new identity.
        let p = Property::new(0);
        manager.borrow(&p, |_| ());
        let current = manager.snapshot();
        assert_eq!(stale.len(), current.len());
        assert!(!Arc::ptr_eq(&stale, &current));

        assert!(!manager.commit(&stale, Arc::new(Registry::new())));
        assert!(Arc::ptr_eq(&manager.snapshot(), &current));
        assert!(manager.commit(&current, Arc::new(Registry::new())));
    }

    #[test]
    fn err_result_passes_through_and_releases() {
        let manager = SharedManager::new();
        let p = Property::new(5);

        let result: Result<(), String> = manager.borrow(&p, |mut acc| {
            *acc = 6;
            Err("declined".to_string())
        });

        assert_eq!(result, Err("declined".to_string()));
        assert_eq!(manager.active_borrowings(), 0);
        assert_eq!(manager.borrow(&p, |acc| *acc), 6);
    }

    #[test]
    fn panic_in_operation_releases_borrowing() {
        let manager = SharedManager::new();
        let p = Property::new(0);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            manager.borrow(&p, |_| panic!("operation failed"));
        }));

        assert!(outcome.is_err());
        assert_eq!(manager.active_borrowings(), 0);
        assert_eq!(manager.borrow(&p, |mut acc| {
            *acc += 1;
            *acc
        }), 1);
    }

    #[test]
    #[should_panic(expected = "the same property was passed twice")]
    fn duplicate_property_is_rejected() {
        let manager = SharedManager::new();
        let p = Property::new(0);
        manager.borrow((&p, &p), |_| ());
    }

    #[test]
    #[should_panic(expected = "at least one property")]
    fn empty_slice_is_rejected() {
        let manager = SharedManager::new();
        let none: &[&Property<u8>] = &[];
        manager.borrow(none, |_| ());
    }

    #[test]
    fn timed_borrow_without_contention_runs() {
        let manager = SharedManager::new();
        let p = Property::new(1);
        let doubled = manager.try_borrow_for(&p, Duration::from_millis(10), |acc| *acc * 2);
        assert_eq!(doubled, Ok(2));
    }

    #[test]
    fn unbounded_timeout_behaves_like_borrow() {
        let manager = SharedManager::new();
        let p = Property::new(1);
        assert_eq!(manager.try_borrow_for(&p, Duration::MAX, |acc| *acc), Ok(1));

        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let later = std::thread::scope(|s| {
            let (manager, p) = (&manager, &p);
            s.spawn(move || {
                manager.borrow(p, |mut acc| {
                    held_tx.send(()).expect("receiver alive");
                    std::thread::sleep(Duration::from_millis(30));
                    *acc = 2;
                })
            });
            held_rx.recv().expect("holder started");
            manager.try_borrow_for(p, Duration::MAX, |acc| *acc)
        });

        assert_eq!(later, Ok(2));
        assert_eq!(manager.stats().timeouts, 0);
        assert_eq!(manager.active_borrowings(), 0);
    }

    #[test]
    fn nested_conflicting_timed_borrow_times_out() {
        let manager = SharedManager::new();
        let p = Property::new(1);
        let q = Property::new(2);

        let inner = manager.borrow(&p, |_| {
            manager.try_borrow_for((&q, &p), Duration::from_millis(10), |_| ())
        });

        assert!(matches!(inner, Err(BorrowError::TimedOut { .. })));
        assert_eq!(manager.active_borrowings(), 0);
        assert_eq!(manager.stats().timeouts, 1);
        assert_eq!(manager.stats().admitted, 1);
    }

    #[test]
    fn nested_inspect_of_inspected_property_is_admitted() {
        let manager = SharedManager::new();
        let p = Property::new(String::from("shared"));

        let lens = manager.inspect(&p, |outer| {
            manager.inspect(&p, |inner| outer.len() + inner.len())
        });
        assert_eq!(lens, 12);
    }

    #[test]
    fn escaped_accessor_outlives_its_borrowing() {
        let manager = SharedManager::new();
        let p = Property::new(7);

        let mut escaped = manager.borrow(&p, |acc| acc);
        assert_eq!(manager.active_borrowings(), 0);
        *escaped += 1;
        drop(escaped);

        assert_eq!(manager.borrow(&p, |acc| *acc), 8);
    }

    #[test]
    fn debug_shows_label_and_activity() {
        let manager = SharedManager::named("accounts");
        let rendered = format!("{manager:?}");
        assert!(rendered.contains("accounts"));
        assert!(rendered.contains("active: 0"));
        assert_eq!(manager.label(), "accounts");
    }
}
