//! Error types for the codec.

use std::fmt;

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for decode, encode, and optimize operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The stream ended inside a segment, marker, or entropy-coded data.
    UnexpectedEndOfStream,
    /// A malformed marker sequence outside an entropy-coded segment
    /// (0xFF followed by a stuffing zero where a marker is required, or
    /// padding that never resolves to a code byte).
    InvalidMarker,
    /// A header or table field violates a constraint. Carries the absolute
    /// stream offset of the offending segment and a static description.
    InvalidData {
        /// Absolute byte offset in the input stream
        offset: usize,
        /// What constraint was violated
        message: &'static str,
    },
    /// A frame type this codec does not handle (hierarchical, differential).
    /// Carries the SOF marker code.
    Unsupported(u8),
    /// API misuse: an operation was invoked on a value not set up for it
    /// (decode without a frame, encode without components, and so on).
    InvalidOperation(&'static str),
    /// A caller-provided buffer cannot hold the requested segment.
    BufferTooSmall,
    /// The output sink failed.
    IoError(String),
}

impl Error {
    /// Attach an absolute stream offset to a bare `InvalidData` produced by
    /// a segment parser that only sees its own payload.
    pub(crate) fn at_offset(self, offset: usize) -> Error {
        match self {
            Error::InvalidData { message, .. } => Error::InvalidData { offset, message },
            other => other,
        }
    }

    /// Shorthand used by segment parsers; the orchestrator rewrites the
    /// offset to an absolute stream position via [`Error::at_offset`].
    pub(crate) fn invalid(message: &'static str) -> Error {
        Error::InvalidData { offset: 0, message }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedEndOfStream => {
                write!(f, "Unexpected end of stream")
            }
            Error::InvalidMarker => {
                write!(f, "Invalid marker sequence")
            }
            Error::InvalidData { offset, message } => {
                write!(f, "Invalid data at offset {}: {}", offset, message)
            }
            Error::Unsupported(marker) => {
                write!(f, "Unsupported frame type (marker 0xFF{:02X})", marker)
            }
            Error::InvalidOperation(msg) => {
                write!(f, "Invalid operation: {}", msg)
            }
            Error::BufferTooSmall => {
                write!(f, "Buffer too small for segment")
            }
            Error::IoError(msg) => {
                write!(f, "I/O error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}
