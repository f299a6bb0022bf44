//! Centralized error types for the Custody workspace.

use std::time::Duration;
use thiserror::Error;

/// Top-level error enum.
///
/// `borrow` itself never fails; only the timed and CLI paths produce these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CustodyError {
    /// Admission did not happen before the deadline. No borrowing was
    /// registered, so nothing needs releasing.
    #[error("Borrow timed out after {waited:?}")]
    TimedOut { waited: Duration },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error surfaced by timed admission.
pub type BorrowError = CustodyError;

pub type CustodyResult<T> = Result<T, CustodyError>;
