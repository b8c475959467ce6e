//! Compact-TLV data objects of the historical bytes (ISO/IEC 7816-4 §8.1.1.2)

use bytes::Bytes;

use crate::command::Command;
use crate::response::status::StatusWord;
use crate::tlv::{Tlv, TlvSliceExt, compact};

/// Find a compact data object by its 4-bit tag, optionally with an exact length
fn find_compact(objects: &[Tlv], tag: u8, len: Option<usize>) -> Option<&Bytes> {
    objects
        .find_all_by_num(compact::tag_num(tag))
        .filter_map(Tlv::value)
        .find(|value| len.is_none_or(|len| value.len() == len))
}

fn nibbles(bytes: &[u8]) -> impl Iterator<Item = u8> + '_ {
    bytes.iter().flat_map(|b| [b >> 4, b & 0x0F])
}

fn digits(nibbles: impl Iterator<Item = u8>) -> String {
    nibbles
        .filter_map(|n| char::from_digit(u32::from(n), 16))
        .collect()
}

/// Country indicator, compact tag 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryIndicator {
    country_code: String,
    subsequent_nibbles: Vec<u8>,
}

impl CountryIndicator {
    /// Compact tag number
    pub const TAG: u8 = 1;

    /// Decode from compact data objects, requires at least two bytes
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        let value = find_compact(objects, Self::TAG, None)?;
        if value.len() < 2 {
            return None;
        }
        let all: Vec<u8> = nibbles(value).collect();
        let (code, rest) = all.split_at(3);
        Some(Self {
            country_code: digits(code.iter().copied()),
            subsequent_nibbles: rest.to_vec(),
        })
    }

    /// Three-digit ISO 3166-1 country code
    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Nationally assigned data following the country code, one nibble per byte
    pub fn subsequent_nibbles(&self) -> &[u8] {
        &self.subsequent_nibbles
    }
}

/// Issuer indicator, compact tag 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerIndicator {
    issuer_identification_number: String,
}

impl IssuerIndicator {
    /// Compact tag number
    pub const TAG: u8 = 2;

    /// Decode from compact data objects
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        let value = find_compact(objects, Self::TAG, None)?;
        Some(Self {
            issuer_identification_number: digits(nibbles(value).take_while(|n| *n != 0x0F)),
        })
    }

    /// Issuer identification number (ISO/IEC 7812-1), digits up to the first `F` nibble
    pub fn issuer_identification_number(&self) -> &str {
        &self.issuer_identification_number
    }
}

/// How EF.DIR and EF.ATR are accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfAccessMethod {
    /// READ BINARY on a transparent EF
    ReadBinary,
    /// READ RECORD on a record EF
    ReadRecord,
    /// GET DATA
    GetData,
    /// Reserved encoding
    Unknown,
}

/// Card service data, compact tag 3 with length 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardServiceData(u8);

impl CardServiceData {
    /// Compact tag number
    pub const TAG: u8 = 3;

    /// Decode from compact data objects
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        find_compact(objects, Self::TAG, Some(1)).map(|value| Self(value[0]))
    }

    /// Application selection by full DF name
    pub const fn select_by_full_df(&self) -> bool {
        self.0 & 0x80 != 0
    }

    /// Application selection by partial DF name
    pub const fn select_by_partial_df(&self) -> bool {
        self.0 & 0x40 != 0
    }

    /// BER-TLV data objects available in EF.DIR
    pub const fn has_ef_dir(&self) -> bool {
        self.0 & 0x20 != 0
    }

    /// BER-TLV data objects available in EF.ATR
    pub const fn has_ef_atr(&self) -> bool {
        self.0 & 0x10 != 0
    }

    /// Access method for EF.DIR and EF.ATR
    pub const fn ef_access_method(&self) -> EfAccessMethod {
        match (self.0 >> 1) & 0x07 {
            0b100 => EfAccessMethod::ReadBinary,
            0b000 => EfAccessMethod::ReadRecord,
            0b010 => EfAccessMethod::GetData,
            _ => EfAccessMethod::Unknown,
        }
    }

    /// Card with MF
    pub const fn has_mf(&self) -> bool {
        self.0 & 0x01 == 0
    }
}

/// Initial access data, compact tag 4
///
/// Tells the terminal how to retrieve the initial data string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialAccessData {
    value: Bytes,
}

impl InitialAccessData {
    /// Compact tag number
    pub const TAG: u8 = 4;

    /// Decode from compact data objects
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        find_compact(objects, Self::TAG, None).map(|value| Self {
            value: value.clone(),
        })
    }

    /// Raw object value
    pub const fn value(&self) -> &Bytes {
        &self.value
    }

    /// Command retrieving the initial data string, if the encoding is valid
    ///
    /// One byte is the Le of a READ BINARY on the current EF. Two bytes are a
    /// structure byte and Le: bit 8 set reads a transparent EF by short
    /// identifier, otherwise the first record of the EF is read. Five bytes or
    /// more are a complete command.
    pub fn command(&self) -> Option<Command> {
        match self.value.as_ref() {
            [le] => Some(Command::new_with_le(0x00, 0xB0, 0x00, 0x00, u16::from(*le))),
            [structure, le] if *structure & 0x80 != 0 => Some(Command::new_with_le(
                0x00,
                0xB0,
                *structure,
                0x00,
                u16::from(*le),
            )),
            [structure, le] => Some(Command::new_with_le(
                0x00,
                0xB2,
                0x01,
                (*structure << 3) | 0b110,
                u16::from(*le),
            )),
            apdu if apdu.len() >= 5 => Command::from_bytes(apdu).ok(),
            _ => None,
        }
    }
}

/// Card issuer's data, compact tag 5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardIssuersData(Bytes);

impl CardIssuersData {
    /// Compact tag number
    pub const TAG: u8 = 5;

    /// Decode from compact data objects
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        find_compact(objects, Self::TAG, None).cloned().map(Self)
    }

    /// Raw object value
    pub const fn value(&self) -> &Bytes {
        &self.0
    }
}

/// Pre-issuing data, compact tag 6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreIssuingData(Bytes);

impl PreIssuingData {
    /// Compact tag number
    pub const TAG: u8 = 6;

    /// Decode from compact data objects
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        find_compact(objects, Self::TAG, None).cloned().map(Self)
    }

    /// Raw object value
    pub const fn value(&self) -> &Bytes {
        &self.0
    }
}

/// Card life cycle status (ISO/IEC 7816-4 §5.3.3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum LifeCycleStatus {
    /// No information given
    #[display("unspecified")]
    Unspecified,
    /// Creation state
    #[display("creation")]
    Creation,
    /// Initialisation state
    #[display("initialization")]
    Initialization,
    /// Operational state, activated
    #[display("operational (active)")]
    OperationalActive,
    /// Operational state, deactivated
    #[display("operational (inactive)")]
    OperationalInactive,
    /// Termination state
    #[display("termination")]
    Termination,
    /// Proprietary encoding
    #[display("proprietary")]
    Proprietary,
}

impl LifeCycleStatus {
    /// Decode the life cycle status byte
    pub const fn from_status_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Unspecified,
            0x01 => Self::Creation,
            0x03 => Self::Initialization,
            b if b & 0xFD == 0x05 => Self::OperationalActive,
            b if b & 0xFD == 0x04 => Self::OperationalInactive,
            b if b & 0xFC == 0x0C => Self::Termination,
            _ => Self::Proprietary,
        }
    }
}

/// Status indicator: life cycle status and/or status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusIndicator {
    life_cycle: Option<LifeCycleStatus>,
    status: Option<StatusWord>,
}

impl StatusIndicator {
    /// Compact tag number
    pub const TAG: u8 = 8;

    /// Decode the value of a status indicator
    ///
    /// One byte is the life cycle status, two bytes a status word, three bytes both.
    pub const fn from_value(value: &[u8]) -> Option<Self> {
        match value {
            [lcs] => Some(Self {
                life_cycle: Some(LifeCycleStatus::from_status_byte(*lcs)),
                status: None,
            }),
            [sw1, sw2] => Some(Self {
                life_cycle: None,
                status: Some(StatusWord::new(*sw1, *sw2)),
            }),
            [lcs, sw1, sw2] => Some(Self {
                life_cycle: Some(LifeCycleStatus::from_status_byte(*lcs)),
                status: Some(StatusWord::new(*sw1, *sw2)),
            }),
            _ => None,
        }
    }

    /// Decode from compact data objects
    pub fn from_data_objects(objects: &[Tlv]) -> Option<Self> {
        find_compact(objects, Self::TAG, None).and_then(|value| Self::from_value(value))
    }

    /// Life cycle status if present
    pub const fn life_cycle(&self) -> Option<LifeCycleStatus> {
        self.life_cycle
    }

    /// Status word if present
    pub const fn status(&self) -> Option<StatusWord> {
        self.status
    }
}
