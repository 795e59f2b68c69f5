//! Control-transfer error types

use thiserror::Error;

/// Errors reported by a [`crate::ControlChannel`]
///
/// A short transfer is always surfaced as an error with the actual and
/// expected byte counts, never silently coerced to success; the
/// handshake layer decides per request whether it is fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    /// The transfer did not complete within the per-call timeout.
    #[error("control transfer timed out")]
    Timeout,

    /// Fewer bytes moved than requested.
    #[error("short transfer: {actual} of {expected} bytes")]
    ShortTransfer { actual: usize, expected: usize },

    /// The underlying device handle is invalid or already released.
    #[error("control channel closed")]
    ChannelClosed,

    /// Any other transport failure (stall, I/O error, ...).
    #[error("control transfer failed: {0}")]
    Failed(String),
}

/// Type alias for transfer results
pub type Result<T> = std::result::Result<T, TransferError>;
