//! Immutable snapshots of the active borrowings.

use crate::borrowing::Borrowing;
use std::sync::Arc;

/// The set of admitted borrowings at one point in time.
///
/// Never mutated: `copy_with_*` build a new snapshot. The manager holds
/// snapshots behind `Arc` and detects concurrent change with `Arc::ptr_eq`,
/// so two snapshots with equal contents are still distinct states. Not
/// `Clone`: snapshots are shared through `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    borrowings: Vec<Arc<Borrowing>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_with_added(&self, borrowing: Arc<Borrowing>) -> Registry {
        let mut borrowings = Vec::with_capacity(self.borrowings.len() + 1);
        borrowings.extend(self.borrowings.iter().cloned());
        borrowings.push(borrowing);
        Registry { borrowings }
    }

    pub fn copy_with_removed(&self, borrowing: &Borrowing) -> Registry {
        let borrowings = self
            .borrowings
            .iter()
            .filter(|b| b.id() != borrowing.id())
            .cloned()
            .collect();
        Registry { borrowings }
    }

    /// First active borrowing that conflicts with `candidate`, if any.
    /// The candidate itself is skipped.
    pub fn search_for_conflicting_borrowing_with(
        &self,
        candidate: &Borrowing,
    ) -> Option<Arc<Borrowing>> {
        self.borrowings
            .iter()
            .find(|b| b.id() != candidate.id() && b.has_conflict_with(candidate))
            .cloned()
    }

    pub fn contains(&self, borrowing: &Borrowing) -> bool {
        self.borrowings.iter().any(|b| b.id() == borrowing.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Borrowing>> {
        self.borrowings.iter()
    }

    pub fn len(&self) -> usize {
        self.borrowings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.borrowings.is_empty()
    }
}
