//! Error types for array-level operations.

/// Errors raised by [`VarVec`](crate::VarVec) before any tape entry is made.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two parallel inputs disagree in length.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An element index is outside the array.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, Error>;
