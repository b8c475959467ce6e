//! Error types for PC/SC transport

use eidlink_apdu_core::TransportError;

/// PC/SC-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Classify a PC/SC error for the transport layer
pub(crate) fn transport_error(error: pcsc::Error) -> TransportError {
    use pcsc::Error;

    match error {
        Error::NoService | Error::ServiceStopped => TransportError::NoService,
        Error::ReaderUnavailable | Error::UnknownReader | Error::NoReadersAvailable => {
            TransportError::ReaderUnavailable
        }
        Error::RemovedCard | Error::NoSmartcard => TransportError::CardRemoved,
        Error::ResetCard => TransportError::CardReset,
        Error::CommError => TransportError::Communication,
        Error::Timeout => TransportError::Timeout,
        Error::Cancelled => TransportError::Cancelled,
        Error::InsufficientBuffer => TransportError::InsufficientBuffer,
        Error::UnsupportedFeature => TransportError::Unsupported,
        other => TransportError::other(other.to_string()),
    }
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::Pcsc(e) => transport_error(e),
            PcscError::NoReadersAvailable | PcscError::ReaderNotFound(_) => Self::ReaderUnavailable,
            PcscError::NoCard(_) => Self::CardRemoved,
            PcscError::Other(msg) => Self::Other(msg),
        }
    }
}
