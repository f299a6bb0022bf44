//! Property identities, claim sets, and error definitions.
//!
//! Foundation crate -- no locking or threading dependencies.

pub mod error;
pub mod types;

pub use error::{BorrowError, CustodyError, CustodyResult};
pub use types::{AccessMode, Claim, ClaimSet, PropertyId};
