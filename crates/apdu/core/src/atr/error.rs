//! Error types for ATR and historical bytes decoding

use crate::tlv::TlvError;

/// Errors raised while decoding an answer-to-reset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AtrError {
    /// The ATR ends before the announced interface or historical bytes
    #[error("ATR truncated after {0} bytes")]
    TooShort(usize),

    /// Initial character is neither direct (3B) nor inverse (3F) convention
    #[error("Invalid initial character TS: {0:#04x}")]
    InvalidTs(u8),

    /// Check byte TCK does not match
    #[error("ATR checksum mismatch")]
    Checksum,

    /// The ATR carries no historical bytes
    #[error("No historical bytes")]
    NoHistoricalBytes,

    /// Malformed compact-TLV data objects
    #[error("Invalid historical bytes: {0}")]
    Tlv(#[from] TlvError),
}
