//! Operation-scoped borrow manager.
//!
//! A [`SharedManager`] grants an operation temporary, exclusive use of the
//! exact set of [`Property`] values it names. Operations over disjoint sets
//! run in parallel; overlapping ones are serialized. All admission goes
//! through one [`Registry`] snapshot per manager, so there is no lock
//! ordering to get wrong.
//!
//! ```ignore
//! let manager = SharedManager::new();
//! let balance = Property::new(100_i64);
//! let traffic = Property::new(50_i64);
//!
//! manager.borrow(&balance, |mut b| *b -= 30);
//! manager.borrow((&balance, &traffic), |(mut b, mut t)| {
//!     *b -= 1;
//!     *t += 1;
//! });
//! ```

pub mod borrowing;
pub mod manager;
pub mod property;
pub mod registry;
pub mod set;
pub mod stats;

pub use borrowing::{Borrowing, BorrowingId};
pub use manager::SharedManager;
pub use property::{Accessor, Property, ReadAccessor};
pub use registry::Registry;
pub use set::PropertySet;
pub use stats::ManagerStats;

pub use custody_core::{AccessMode, BorrowError, Claim, ClaimSet, CustodyError, PropertyId};
