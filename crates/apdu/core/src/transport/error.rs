//! Error types specific to card transport

use thiserror::Error;

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The smart card service is not running
    #[error("Smart card service unavailable")]
    NoService,

    /// The reader is gone or unknown
    #[error("Reader unavailable")]
    ReaderUnavailable,

    /// The card was removed from the reader
    #[error("Card removed")]
    CardRemoved,

    /// The card was reset by another application
    #[error("Card was reset")]
    CardReset,

    /// Communication with the reader or card failed
    #[error("Failed to transmit data")]
    Communication,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Cancelled operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Receive buffer too small for the answer
    #[error("Buffer too small")]
    InsufficientBuffer,

    /// Operation not supported by this transport or reader
    #[error("Operation not supported")]
    Unsupported,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Whether the card session is lost and must be re-established
    pub const fn is_session_lost(&self) -> bool {
        matches!(self, Self::CardRemoved | Self::CardReset | Self::ReaderUnavailable)
    }
}
