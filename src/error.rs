//! Error types for building and loading dictionaries.
//!
//! Query operations never produce an [`Error`]: a missing key or an id past the
//! end is reported as `None` (or an empty iterator).

use thiserror::Error;

/// Error variants for dictionary construction and (de)serialization.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error while reading or writing a dictionary.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The input ended before a field could be read completely.
    #[error("unexpected end of input at byte {0}")]
    Truncated(u64),

    /// The header names a different trie variant than the one requested.
    #[error("dictionary type mismatch: expected type id {expected}, found {found}")]
    TypeMismatch {
        /// Type id of the requested variant.
        expected: u32,
        /// Type id stored in the header.
        found: u32,
    },

    /// The header names a trie variant this crate does not know.
    #[error("unknown dictionary type id {0}")]
    UnknownType(u32),

    /// The header carries a format version this crate cannot read.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    /// A loaded field contradicts another one.
    #[error("corrupt dictionary: {0}")]
    Corrupt(String),

    /// Keys passed to a sorted builder were not strictly increasing.
    #[error("keys must be strictly increasing (violated at index {index})")]
    UnsortedKeys {
        /// Index of the first key that is not greater than its predecessor.
        index: usize,
    },

    /// The double array would exceed the 32-bit rank directory.
    #[error("dictionary too large: {0} cells")]
    TooLarge(usize),
}

/// A specialized Result type for dictionary operations.
pub type Result<T> = std::result::Result<T, Error>;
