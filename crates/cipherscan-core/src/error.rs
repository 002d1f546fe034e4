//! Error types for CipherScan Core
//!
//! Error taxonomy for raw transaction decoding and address encoding.

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CipherScan Core errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Input is not valid hex (non hex-digit characters or odd length)
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Input is shorter than the smallest possible transaction
    #[error("Input too short: {len} bytes (minimum {min})")]
    InputTooShort {
        /// Decoded length in bytes
        len: usize,
        /// Minimum accepted length in bytes
        min: usize,
    },

    /// A read ran past the end of the buffer
    #[error("Unexpected end of data at byte offset {offset} (need {needed} bytes, have {remaining})")]
    TruncatedInput {
        /// Cursor position when the read was attempted
        offset: usize,
        /// Bytes the read required
        needed: u64,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Transaction version outside 1..=5
    #[error("Unsupported transaction version: {0}")]
    UnsupportedVersion(u32),

    /// Decoding finished before the end of the buffer
    #[error("Trailing data: decoded {consumed} of {total} bytes")]
    TrailingBytes {
        /// Bytes consumed by the decoder
        consumed: usize,
        /// Total buffer length
        total: usize,
    },

    /// String contains characters outside the Base58 alphabet
    #[error("Invalid base58: {0}")]
    InvalidBase58(String),

    /// Base58Check checksum did not match the payload
    #[error("Checksum mismatch")]
    ChecksumMismatch,
}

impl Error {
    /// Byte offset associated with the error, if any
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::TruncatedInput { offset, .. } => Some(*offset),
            Error::TrailingBytes { consumed, .. } => Some(*consumed),
            _ => None,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidHex(_) | Error::InputTooShort { .. } => ErrorCategory::Input,
            Error::TruncatedInput { .. }
            | Error::UnsupportedVersion(_)
            | Error::TrailingBytes { .. } => ErrorCategory::Transaction,
            Error::InvalidBase58(_) | Error::ChecksumMismatch => ErrorCategory::Address,
        }
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidHex(e.to_string())
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed caller input
    Input,
    /// Structurally invalid transaction bytes
    Transaction,
    /// Address encoding errors
    Address,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "Input"),
            ErrorCategory::Transaction => write!(f, "Transaction"),
            ErrorCategory::Address => write!(f, "Address"),
        }
    }
}
