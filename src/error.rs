//! Error types for DLT buffering, decoding and rendering.
//!
//! This module defines the [`Error`] enum which represents all possible failures
//! that can occur when operating the ring buffer, decoding messages, rendering
//! them as text or loading filter rules.
//!
//! # Example
//!
//! ```
//! use dlt_core::{Error, RingBuffer};
//!
//! let mut buffer = RingBuffer::new();
//! match buffer.push(b"payload") {
//!     Err(Error::Uninitialized) => {}
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```

use core::fmt;

use alloc::string::String;

/// Errors that can occur while handling DLT records and messages.
///
/// Every error is local and synchronous: it is returned to the immediate
/// caller and no operation retries internally beyond the bounded growth loop
/// of [`RingBuffer::push`](crate::RingBuffer::push).
#[derive(Debug)]
pub enum Error {
    /// A required argument was absent or empty.
    NullArgument(&'static str),

    /// The ring buffer has no storage (never initialized, or already freed).
    Uninitialized,

    /// The ring buffer was initialized twice without an intervening free.
    AlreadyInitialized,

    /// Buffer sizing parameters are inconsistent or cannot be satisfied.
    InvalidConfiguration(String),

    /// Not enough space for a record, even after growing to the maximum size.
    BufferFull {
        /// Number of bytes required
        needed: usize,
        /// Number of bytes that could be made available
        available: usize,
    },

    /// The ring buffer holds no records.
    BufferEmpty,

    /// A length, cursor or type field is structurally invalid.
    ///
    /// Raised for corrupted ring-buffer bookkeeping as well as for malformed
    /// message headers and argument tags.
    Corrupt(String),

    /// Fewer bytes are available than a header declares.
    Truncated {
        /// Number of bytes the header declares
        expected: usize,
        /// Number of bytes actually available
        actual: usize,
    },

    /// A numeric option (header field mask, payload format, verbosity) or a
    /// filter rule is outside its documented range.
    InvalidOption(String),

    /// An optional block or element is absent.
    NotPresent(&'static str),

    /// The rendered text does not fit into the requested capacity.
    OutputTooSmall {
        /// Length of the rendered text
        needed: usize,
        /// Capacity the caller allowed
        capacity: usize,
    },

    /// An I/O error occurred while reading a trace file or an index.
    ///
    /// Only available with the `std` feature.
    #[cfg(feature = "std")]
    IOError(std::io::Error),

    /// A frame index could not be serialized, parsed, or does not belong to
    /// the trace file it is applied to.
    ///
    /// Only available with the `std` feature.
    #[cfg(feature = "std")]
    IndexError(String),
}

impl Error {
    /// Returns true for per-record decode failures.
    ///
    /// Scanning callers skip the offending record and continue with the next
    /// candidate; single-message callers propagate the error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Corrupt(_) | Error::Truncated { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NullArgument(what) => write!(f, "Missing argument: {what}"),
            Error::Uninitialized => write!(f, "Ring buffer is not initialized"),
            Error::AlreadyInitialized => write!(f, "Ring buffer is already initialized"),
            Error::InvalidConfiguration(s) => write!(f, "Invalid buffer configuration: {s}"),
            Error::BufferFull { needed, available } => write!(
                f,
                "Ring buffer full: need {needed} bytes, only {available} available"
            ),
            Error::BufferEmpty => write!(f, "Ring buffer is empty"),
            Error::Corrupt(s) => write!(f, "Corrupt data: {s}"),
            Error::Truncated { expected, actual } => write!(
                f,
                "Truncated data: header declares {expected} bytes, got {actual}"
            ),
            Error::InvalidOption(s) => write!(f, "Invalid option: {s}"),
            Error::NotPresent(what) => write!(f, "Not present: {what}"),
            Error::OutputTooSmall { needed, capacity } => write!(
                f,
                "Output too small: text needs {needed} bytes, capacity is {capacity}"
            ),
            #[cfg(feature = "std")]
            Error::IOError(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "std")]
            Error::IndexError(s) => write!(f, "Frame index error: {s}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

#[cfg(feature = "std")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::IndexError(alloc::format!("{err}"))
    }
}

/// A specialized Result type for DLT operations.
///
/// This is defined as `core::result::Result<T, Error>` for convenience.
pub type Result<T> = core::result::Result<T, Error>;
