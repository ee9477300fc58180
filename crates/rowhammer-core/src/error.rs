//! Error taxonomy for the harness: configuration, environmental,
//! statistical, and operational failures each carry distinct policy at the
//! call site.

use thiserror::Error;

/// Errors the harness core can report.
///
/// `Statistical` variants are warnings in spirit — callers typically log
/// them and continue rather than aborting, since a successful run may still
/// produce flips even when a bank-count estimate is off. `Operational`
/// failures (the locator finding no contiguous region) call for a clean
/// exit with zero flips reported, not a hard error path.
#[derive(Debug, Error)]
pub enum RowhammerError {
    /// Bad flag value or an internally inconsistent configuration
    /// (e.g. a buffer size too small to hold a single huge page).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Allocation failure, or a required OS facility (e.g. pagemap) being
    /// unavailable or insufficiently privileged.
    #[error("environmental error: {0}")]
    Environmental(String),

    /// A statistical anomaly in timing-based discovery (too few or too
    /// many same-bank hits, calibration producing a degenerate threshold).
    #[error("statistical anomaly: {0}")]
    Statistical(String),

    /// The contiguous-region locator (or another discovery step) found
    /// nothing usable.
    #[error("operational failure: {0}")]
    Operational(String),
}

pub type Result<T> = std::result::Result<T, RowhammerError>;
