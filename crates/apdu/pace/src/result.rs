//! PACE result codes
//!
//! Every PACE control response starts with a 32-bit result code. Codes in the
//! `F00x` families embed the status word the card answered to one step of the
//! protocol in their lower half.

use eidlink_apdu_core::StatusWord;

use crate::error::PaceError;

/// Bits selecting a result code family
const FAMILY_MASK: u32 = 0xFFFF_0000;

/// Result code reported by the reader after a PACE function
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum PaceResultCode {
    /// Function completed
    #[display("no error")]
    NoError,
    /// Lengths in the input are inconsistent
    #[display("inconsistent lengths in input")]
    InconsistentLengthsInInput,
    /// Input contains unexpected data
    #[display("unexpected data in input")]
    UnexpectedDataInInput,
    /// Input combines data that may not be combined
    #[display("unexpected combination of data in input")]
    UnexpectedCombinationOfDataInInput,
    /// Card response is not valid TLV
    #[display("syntax error in TLV response")]
    TlvSyntaxError,
    /// Card response misses an object or has an unexpected one
    #[display("unexpected or missing object in TLV response")]
    UnexpectedOrMissingTlvObject,
    /// PIN identifier is unknown
    #[display("unknown PIN-ID")]
    UnknownPinId,
    /// Authentication token of the card did not verify
    #[display("wrong authentication token")]
    WrongAuthenticationToken,
    /// SELECT of EF.CardAccess failed
    #[display("select EF.CardAccess: {_0}")]
    SelectEfCardAccess(StatusWord),
    /// READ BINARY of EF.CardAccess failed
    #[display("read binary EF.CardAccess: {_0}")]
    ReadBinaryEfCardAccess(StatusWord),
    /// MSE: Set AT failed
    #[display("MSE: Set AT: {_0}")]
    MseSetAt(StatusWord),
    /// First GENERAL AUTHENTICATE failed
    #[display("general authenticate step 1: {_0}")]
    GeneralAuthenticate1(StatusWord),
    /// Second GENERAL AUTHENTICATE failed
    #[display("general authenticate step 2: {_0}")]
    GeneralAuthenticate2(StatusWord),
    /// Third GENERAL AUTHENTICATE failed
    #[display("general authenticate step 3: {_0}")]
    GeneralAuthenticate3(StatusWord),
    /// Fourth GENERAL AUTHENTICATE failed
    #[display("general authenticate step 4: {_0}")]
    GeneralAuthenticate4(StatusWord),
    /// Communication aborted, e.g. card removed during the protocol
    #[display("communication abort")]
    CommunicationAbort,
    /// No card in the reader
    #[display("no card")]
    NoCard,
    /// Aborted at the reader
    #[display("abort")]
    Abort,
    /// Reader timed out waiting for the user
    #[display("timeout")]
    Timeout,
}

/// Split a code into its family and the embedded status word
const fn split_family(code: u32) -> (u32, StatusWord) {
    (code & FAMILY_MASK, StatusWord::from_u16(code as u16))
}

impl PaceResultCode {
    /// Decode a raw result code
    pub const fn from_code(code: u32) -> Result<Self, PaceError> {
        let result = match code {
            0x0000_0000 => Self::NoError,
            0xD000_0001 => Self::InconsistentLengthsInInput,
            0xD000_0002 => Self::UnexpectedDataInInput,
            0xD000_0003 => Self::UnexpectedCombinationOfDataInInput,
            0xE000_0001 => Self::TlvSyntaxError,
            0xE000_0002 => Self::UnexpectedOrMissingTlvObject,
            0xE000_0003 => Self::UnknownPinId,
            0xE000_0006 => Self::WrongAuthenticationToken,
            0xF010_0001 => Self::CommunicationAbort,
            0xF010_0002 => Self::NoCard,
            0xF020_0001 => Self::Abort,
            0xF020_0002 => Self::Timeout,
            _ => match split_family(code) {
                (0xF000_0000, sw) => Self::SelectEfCardAccess(sw),
                (0xF001_0000, sw) => Self::ReadBinaryEfCardAccess(sw),
                (0xF002_0000, sw) => Self::MseSetAt(sw),
                (0xF003_0000, sw) => Self::GeneralAuthenticate1(sw),
                (0xF004_0000, sw) => Self::GeneralAuthenticate2(sw),
                (0xF005_0000, sw) => Self::GeneralAuthenticate3(sw),
                (0xF006_0000, sw) => Self::GeneralAuthenticate4(sw),
                _ => return Err(PaceError::UnknownResultCode(code)),
            },
        };
        Ok(result)
    }

    /// Raw result code
    pub const fn code(&self) -> u32 {
        match self {
            Self::NoError => 0x0000_0000,
            Self::InconsistentLengthsInInput => 0xD000_0001,
            Self::UnexpectedDataInInput => 0xD000_0002,
            Self::UnexpectedCombinationOfDataInInput => 0xD000_0003,
            Self::TlvSyntaxError => 0xE000_0001,
            Self::UnexpectedOrMissingTlvObject => 0xE000_0002,
            Self::UnknownPinId => 0xE000_0003,
            Self::WrongAuthenticationToken => 0xE000_0006,
            Self::SelectEfCardAccess(sw) => 0xF000_0000 | sw.to_u16() as u32,
            Self::ReadBinaryEfCardAccess(sw) => 0xF001_0000 | sw.to_u16() as u32,
            Self::MseSetAt(sw) => 0xF002_0000 | sw.to_u16() as u32,
            Self::GeneralAuthenticate1(sw) => 0xF003_0000 | sw.to_u16() as u32,
            Self::GeneralAuthenticate2(sw) => 0xF004_0000 | sw.to_u16() as u32,
            Self::GeneralAuthenticate3(sw) => 0xF005_0000 | sw.to_u16() as u32,
            Self::GeneralAuthenticate4(sw) => 0xF006_0000 | sw.to_u16() as u32,
            Self::CommunicationAbort => 0xF010_0001,
            Self::NoCard => 0xF010_0002,
            Self::Abort => 0xF020_0001,
            Self::Timeout => 0xF020_0002,
        }
    }

    /// Whether the function succeeded
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::NoError)
    }

    /// Status word the card answered with, for the card-step families
    pub const fn status_word(&self) -> Option<StatusWord> {
        match self {
            Self::SelectEfCardAccess(sw)
            | Self::ReadBinaryEfCardAccess(sw)
            | Self::MseSetAt(sw)
            | Self::GeneralAuthenticate1(sw)
            | Self::GeneralAuthenticate2(sw)
            | Self::GeneralAuthenticate3(sw)
            | Self::GeneralAuthenticate4(sw) => Some(*sw),
            _ => None,
        }
    }

    /// Remaining password attempts when the card answered 63 CX
    pub const fn retry_counter(&self) -> Option<u8> {
        match self.status_word() {
            Some(sw) => sw.retry_counter(),
            None => None,
        }
    }

    /// Turn anything but success into an error
    pub const fn into_result(self) -> Result<(), PaceError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(PaceError::Result(self))
        }
    }
}

impl TryFrom<u32> for PaceResultCode {
    type Error = PaceError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}
