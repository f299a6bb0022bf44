//! Guarded values and the accessors handed to operation bodies.

use custody_core::PropertyId;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// One unit of shared state.
///
/// The value is only reachable through an [`Accessor`] issued by a
/// [`SharedManager`](crate::SharedManager) while a borrowing covering this
/// property is admitted. The inner lock is never contended under a single
/// manager; it keeps access sound when the same property is reachable from
/// two managers.
pub struct Property<V> {
    id: PropertyId,
    value: RwLock<V>,
}

impl<V> Property<V> {
    pub fn new(initial: V) -> Self {
        Self {
            id: PropertyId::next(),
            value: RwLock::new(initial),
        }
    }

    #[inline]
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// Consumes the property. Owning it proves no borrowing can reach it.
    pub fn into_inner(self) -> V {
        self.value.into_inner()
    }

    pub(crate) fn exclusive_accessor(&self) -> Accessor<'_, V> {
        Accessor {
            id: self.id,
            guard: self.value.write(),
        }
    }

    pub(crate) fn shared_accessor(&self) -> ReadAccessor<'_, V> {
        ReadAccessor {
            id: self.id,
            guard: self.value.read(),
        }
    }
}

impl<V> fmt::Debug for Property<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("id", &self.id).finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

/// Read/write handle to one property, valid for one operation body.
///
/// Holding it past the end of the operation is a misuse: the borrowing is
/// already released, and later borrowers of the same property will block
/// until the accessor is dropped.
pub struct Accessor<'a, V> {
    id: PropertyId,
    guard: RwLockWriteGuard<'a, V>,
}

impl<V> Accessor<'_, V> {
    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn get(&self) -> &V {
        &self.guard
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.guard
    }

    pub fn set(&mut self, value: V) {
        *self.guard = value;
    }

    /// Stores `value` and returns the previous one.
    pub fn replace(&mut self, value: V) -> V {
        std::mem::replace(&mut *self.guard, value)
    }
}

impl<V> Deref for Accessor<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.guard
    }
}

impl<V> DerefMut for Accessor<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.guard
    }
}

impl<V: fmt::Debug> fmt::Debug for Accessor<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("id", &self.id)
            .field("value", &*self.guard)
            .finish()
    }
}

/// Read-only handle issued by [`SharedManager::inspect`](crate::SharedManager::inspect).
pub struct ReadAccessor<'a, V> {
    id: PropertyId,
    guard: RwLockReadGuard<'a, V>,
}

impl<V> ReadAccessor<'_, V> {
    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn get(&self) -> &V {
        &self.guard
    }
}

impl<V> Deref for ReadAccessor<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.guard
    }
}

impl<V: fmt::Debug> fmt::Debug for ReadAccessor<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadAccessor")
            .field("id", &self.id)
            .field("value", &*self.guard)
            .finish()
    }
}
