//! Arity support: what an operation can name, and what it gets back.
//!
//! `PropertySet` is implemented for a single property reference, tuples of
//! one to six property references of independent types, and slices of
//! same-typed property references (dynamic arity).

use crate::property::{Accessor, Property, ReadAccessor};
use custody_core::PropertyId;
use smallvec::{smallvec, SmallVec};

/// Property ids in argument order, duplicates included.
pub type PropertyIds = SmallVec<[PropertyId; 8]>;

/// A group of properties one operation borrows together.
pub trait PropertySet<'p> {
    /// Handed to [`SharedManager::borrow`](crate::SharedManager::borrow) bodies.
    type Accessors;
    /// Handed to [`SharedManager::inspect`](crate::SharedManager::inspect) bodies.
    type Readers;

    fn ids(&self) -> PropertyIds;

    /// Called only once the covering borrowing is admitted.
    fn open(self) -> Self::Accessors;

    /// Called only once the covering shared borrowing is admitted.
    fn open_shared(self) -> Self::Readers;
}

impl<'p, A> PropertySet<'p> for &'p Property<A> {
    type Accessors = Accessor<'p, A>;
    type Readers = ReadAccessor<'p, A>;

    fn ids(&self) -> PropertyIds {
        smallvec![self.id()]
    }

    fn open(self) -> Self::Accessors {
        self.exclusive_accessor()
    }

    fn open_shared(self) -> Self::Readers {
        self.shared_accessor()
    }
}

macro_rules! impl_property_tuple {
    ($($idx:tt : $ty:ident),+) => {
        impl<'p, $($ty),+> PropertySet<'p> for ($(&'p Property<$ty>,)+) {
            type Accessors = ($(Accessor<'p, $ty>,)+);
            type Readers = ($(ReadAccessor<'p, $ty>,)+);

            fn ids(&self) -> PropertyIds {
                smallvec![$(self.$idx.id()),+]
            }

            fn open(self) -> Self::Accessors {
                ($(self.$idx.exclusive_accessor(),)+)
            }

            fn open_shared(self) -> Self::Readers {
                ($(self.$idx.shared_accessor(),)+)
            }
        }
    };
}

impl_property_tuple!(0: A);
impl_property_tuple!(0: A, 1: B);
impl_property_tuple!(0: A, 1: B, 2: C);
impl_property_tuple!(0: A, 1: B, 2: C, 3: D);
impl_property_tuple!(0: A, 1: B, 2: C, 3: D, 4: E);
impl_property_tuple!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F);

impl<'p, V> PropertySet<'p> for &[&'p Property<V>] {
    type Accessors = Vec<Accessor<'p, V>>;
    type Readers = Vec<ReadAccessor<'p, V>>;

    fn ids(&self) -> PropertyIds {
        self.iter().map(|p| p.id()).collect()
    }

    fn open(self) -> Self::Accessors {
        self.iter().map(|p| p.exclusive_accessor()).collect()
    }

    fn open_shared(self) -> Self::Readers {
        self.iter().map(|p| p.shared_accessor()).collect()
    }
}
