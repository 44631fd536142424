//! Error types shared by every matrix operation.

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by matrix operations and factorizations.
///
/// Numerically degenerate inputs (rank-deficient or all-zero matrices)
/// are never errors; they produce well-defined results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Element or slice access outside the matrix shape
    #[error("index ({row}, {col}) out of bounds for {rows}x{cols} matrix")]
    IndexOutOfBounds {
        /// Requested row
        row: usize,
        /// Requested column
        col: usize,
        /// Number of rows in the matrix
        rows: usize,
        /// Number of columns in the matrix
        cols: usize,
    },

    /// Operand shapes incompatible with the requested operation
    #[error("dimension mismatch in {op}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        /// Shape the operation required
        expected: (usize, usize),
        /// Shape it was handed
        found: (usize, usize),
        /// The operation name
        op: &'static str,
    },

    /// Factorization getter called before the matching compute call
    #[error("factor {factor} not computed; call the matching compute method first")]
    NotComputed {
        /// The requested factor
        factor: &'static str,
    },

    /// Malformed input to an operation, e.g. a non-finite factorization source
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description of the violation
        reason: String,
    },
}
