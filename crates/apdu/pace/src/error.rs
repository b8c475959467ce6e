//! Error types for reader features and PACE

use eidlink_apdu_core::{TlvError, TransportError};

use crate::result::PaceResultCode;

/// Errors raised while talking to a reader's PACE implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaceError {
    /// The control command could not be delivered
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Feature list is not valid simple-TLV
    #[error("Invalid feature list: {0}")]
    Tlv(#[from] TlvError),

    /// Feature entry does not carry a 4 byte control code
    #[error("Feature {tag:#04x} carries {len} bytes instead of a control code")]
    InvalidFeature {
        /// Feature tag
        tag: u8,
        /// Length of the value
        len: usize,
    },

    /// Reader does not offer the PACE feature
    #[error("Reader does not support PACE")]
    NotSupported,

    /// Reader answered with a malformed PACE response
    #[error("Malformed PACE response: {0}")]
    MalformedResponse(&'static str),

    /// A request field does not fit its length prefix
    #[error("PACE request field {field} too long: {len} bytes")]
    FieldTooLong {
        /// Field name
        field: &'static str,
        /// Actual length
        len: usize,
    },

    /// Password type byte outside MRZ, CAN, PIN and PUK
    #[error("Invalid PIN-ID {0:#04x}")]
    InvalidPinId(u8),

    /// Reader reported a PACE failure
    #[error("PACE failed: {0}")]
    Result(PaceResultCode),

    /// Reader returned a result code outside the known table
    #[error("Unknown PACE result code {0:#010x}")]
    UnknownResultCode(u32),

    /// Establishment was cancelled by the caller
    #[error("PACE establishment cancelled")]
    Cancelled,

    /// Establishment did not finish in time
    #[error("PACE establishment timed out")]
    Timeout,
}

impl PaceError {
    /// Whether the error should abort the whole session rather than one attempt
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownResultCode(_) | Self::MalformedResponse(_))
            || matches!(self, Self::Transport(e) if e.is_session_lost())
    }
}
