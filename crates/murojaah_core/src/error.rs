//! crates/murojaah_core/src/error.rs
//!
//! The error taxonomy of the progress ledger.

use crate::domain::PagePosition;
use crate::ports::PortError;

/// Errors returned by ledger and recap operations.
///
/// Every variant except `Persistence` is detected before anything is written.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("range end ({end}) must not precede its start ({start})")]
    InvalidRange {
        start: PagePosition,
        end: PagePosition,
    },

    #[error("target must span more than 0 pages, got {0}")]
    NonPositiveTarget(i32),

    /// The day's sessions sum to more pages than the totals can hold.
    #[error("daily page totals exceed the supported range")]
    TotalsOverflow,

    #[error("{0} not found")]
    NotFound(String),

    /// The record exists but belongs to someone else.
    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("storage failure: {0}")]
    Persistence(String),
}

impl From<PortError> for LedgerError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => Self::NotFound(what),
            PortError::Unexpected(msg) => Self::Persistence(msg),
        }
    }
}

/// A convenience type alias for `Result<T, LedgerError>`.
pub type LedgerResult<T> = Result<T, LedgerError>;
