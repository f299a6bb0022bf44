//! Domain types for the Custody borrow manager.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

static NEXT_PROPERTY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one unit of shared state.
///
/// Assigned from a process-wide counter and never reused, so two ids are
/// equal only if they name the same property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(u64);

impl PropertyId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        Self(NEXT_PROPERTY_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Shared (`Read`) or exclusive (`Write`) access.
///
/// Ordered `Read(0) < Write(1)` so reverse-sort puts writes first
/// during dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Read = 0,
    Write = 1,
}

impl PartialOrd for AccessMode {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccessMode {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

/// A single property access: identity + mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub id: PropertyId,
    pub mode: AccessMode,
}

impl Claim {
    pub fn read(id: PropertyId) -> Self {
        Self {
            id,
            mode: AccessMode::Read,
        }
    }

    pub fn write(id: PropertyId) -> Self {
        Self {
            id,
            mode: AccessMode::Write,
        }
    }
}

/// Everything one operation claims, deduplicated by property id.
///
/// Entries are kept sorted by id so conflict tests are a linear merge.
/// `SmallVec<[Claim; 8]>` avoids heap allocation for typical operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClaimSet {
    claims: SmallVec<[Claim; 8]>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every id claimed exclusively.
    pub fn exclusive<I: IntoIterator<Item = PropertyId>>(ids: I) -> Self {
        ids.into_iter().map(Claim::write).collect()
    }

    /// Every id claimed shared.
    pub fn shared<I: IntoIterator<Item = PropertyId>>(ids: I) -> Self {
        ids.into_iter().map(Claim::read).collect()
    }

    /// Returns true if two claim sets cannot be admitted together: they
    /// share a property and at least one side writes it.
    pub fn conflicts_with(&self, other: &ClaimSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.claims.len() && j < other.claims.len() {
            let (x, y) = (&self.claims[i], &other.claims[j]);
            match x.id.cmp(&y.id) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    if x.mode == AccessMode::Write || y.mode == AccessMode::Write {
                        return true;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        false
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.claims.binary_search_by(|c| c.id.cmp(&id)).is_ok()
    }

    pub fn mode_of(&self, id: PropertyId) -> Option<AccessMode> {
        self.claims
            .binary_search_by(|c| c.id.cmp(&id))
            .ok()
            .map(|i| self.claims[i].mode)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl FromIterator<Claim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        let mut claims: SmallVec<[Claim; 8]> = iter.into_iter().collect();
        claims.sort_unstable_by(|a, b| a.id.cmp(&b.id).then(a.mode.cmp(&b.mode).reverse()));
        claims.dedup_by(|a, b| a.id == b.id);
        Self { claims }
    }
}
