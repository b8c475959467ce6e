//! Error types for APDU encoding and decoding

/// Errors of the APDU value model
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApduError {
    /// Fewer bytes than the smallest valid APDU
    #[error("Truncated APDU: {0} bytes")]
    TruncatedApdu(usize),

    /// Lc/Le fields are inconsistent with the APDU length
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Command data does not fit the encoding available for this card
    #[error("Payload of {0} bytes too large")]
    PayloadTooLarge(usize),
}
