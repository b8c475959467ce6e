//! Core error type for all APDU operations
//!
//! Each layer has its own error enum; this type aggregates them so that
//! channel operations can bubble any of them up through the call stack.

use crate::atr::AtrError;
use crate::command::ApduError;
use crate::response::status::StatusWord;
use crate::secure::SecureMessagingError;
use crate::tlv::TlvError;
use crate::transport::TransportError;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Transport failure, propagated unchanged
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed or unencodable APDU
    #[error(transparent)]
    Apdu(#[from] ApduError),

    /// TLV decoding or encoding failure
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// Secure messaging layer failure
    #[error(transparent)]
    SecureMessaging(#[from] SecureMessagingError),

    /// ATR decoding failure
    #[error(transparent)]
    Atr(#[from] AtrError),

    /// GET RESPONSE continuation exceeded the configured bounds
    #[error("Chain limit exceeded")]
    ChainLimitExceeded,

    /// Status error from response
    #[error("Status error {status}: {}", status.description())]
    Status {
        /// Status word that caused the error
        status: StatusWord,
    },

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new status error
    pub const fn status(sw1: u8, sw2: u8) -> Self {
        Self::Status {
            status: StatusWord::new(sw1, sw2),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<StatusWord> for Error {
    fn from(status: StatusWord) -> Self {
        Self::Status { status }
    }
}

/// Extension trait for Result with APDU Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T, Error>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T, Error> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chain() {
        let result: Result<(), TransportError> = Err(TransportError::CardRemoved);
        let err = result.context("Failed to select application").unwrap_err();
        assert_eq!(err.to_string(), "Failed to select application: Card removed");
        assert_eq!(err.root(), &Error::Transport(TransportError::CardRemoved));
    }

    #[test]
    fn test_status_error() {
        let err: Error = StatusWord::new(0x6A, 0x82).into();
        assert_eq!(err, Error::status(0x6A, 0x82));
        assert_eq!(err.to_string(), "Status error 6A82: File not found");
    }
}
