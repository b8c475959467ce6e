//! Answer-to-reset and historical bytes decoding
//!
//! References:
//!
//! * "Answer-to-Reset", ISO/IEC 7816-3 §8.2
//! * "Historical bytes", ISO/IEC 7816-4 §8.1.1
//! * "ATR, Contactless Storage Cards", PC/SC Specification Part 3, §3.1.3.2.3.2
//!
//! The derived views are pure functions of the bytes: decoding the same ATR
//! twice yields equal results, so a [`CardInfo`] is built once per card session
//! and shared from there.

pub mod capabilities;
pub mod data_objects;
mod error;

use bytes::Bytes;
use tracing::{debug, trace, warn};

pub use capabilities::CardCapabilities;
pub use data_objects::{
    CardIssuersData, CardServiceData, CountryIndicator, InitialAccessData, IssuerIndicator,
    LifeCycleStatus, PreIssuingData, StatusIndicator,
};
pub use error::AtrError;

use crate::tlv::{Tlv, compact};

/// PC/SC registered application provider identifier
const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

/// Validate TCK: XOR of T0 up to and including TCK is zero
fn checksum(data: &[u8]) -> bool {
    data[1..].iter().fold(0, |acc, b| acc ^ b) == 0
}

/// Decoded answer-to-reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atr {
    raw: Bytes,
    protocols: Vec<u8>,
    historical_bytes: Bytes,
    tck: Option<u8>,
}

impl Atr {
    /// Parse an ATR, validating the check byte when one is required
    pub fn parse(data: &[u8]) -> Result<Self, AtrError> {
        let [ts, t0, ..] = *data else {
            return Err(AtrError::TooShort(data.len()));
        };
        if ts != 0x3B && ts != 0x3F {
            return Err(AtrError::InvalidTs(ts));
        }

        let historical_len = usize::from(t0 & 0x0F);
        let mut y = t0 >> 4;
        let mut pos = 2;
        let mut protocols = Vec::new();
        loop {
            // TA, TB and TC carry no information needed here
            pos += (y & 0x07).count_ones() as usize;
            if y & 0x08 == 0 {
                break;
            }
            let td = *data.get(pos).ok_or(AtrError::TooShort(data.len()))?;
            protocols.push(td & 0x0F);
            y = td >> 4;
            pos += 1;
        }

        let historical_end = pos + historical_len;
        if historical_end > data.len() {
            return Err(AtrError::TooShort(data.len()));
        }
        let historical_bytes = Bytes::copy_from_slice(&data[pos..historical_end]);

        // TCK is present unless T=0 is the only protocol offered
        let tck = if protocols.iter().any(|t| *t != 0) {
            let tck = *data
                .get(historical_end)
                .ok_or(AtrError::TooShort(data.len()))?;
            if !checksum(&data[..=historical_end]) {
                return Err(AtrError::Checksum);
            }
            Some(tck)
        } else {
            None
        };

        let consumed = historical_end + usize::from(tck.is_some());
        if consumed < data.len() {
            debug!(
                extra = %hex::encode(&data[consumed..]),
                "Ignoring bytes after the end of the ATR"
            );
        }

        if protocols.is_empty() {
            protocols.push(0);
        }
        protocols.sort_unstable();
        protocols.dedup();

        trace!(
            atr = %hex::encode(data),
            protocols = ?protocols,
            historical = %hex::encode(&historical_bytes),
            "Parsed ATR"
        );

        Ok(Self {
            raw: Bytes::copy_from_slice(&data[..consumed]),
            protocols,
            historical_bytes,
            tck,
        })
    }

    /// ATR bytes as received, without trailing garbage
    pub const fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Transmission protocols offered, `T=0` if none is indicated
    pub fn protocols(&self) -> &[u8] {
        &self.protocols
    }

    /// Historical bytes T1..TK
    pub const fn historical_bytes(&self) -> &Bytes {
        &self.historical_bytes
    }

    /// Check byte, if the ATR carries one
    pub const fn tck(&self) -> Option<u8> {
        self.tck
    }

    /// Decode the historical bytes
    pub fn historical(&self) -> Result<HistoricalBytes, AtrError> {
        HistoricalBytes::parse(&self.historical_bytes)
    }
}

impl TryFrom<&[u8]> for Atr {
    type Error = AtrError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::parse(data)
    }
}

/// Category indicator, first historical byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum CategoryIndicator {
    /// `00`: compact-TLV objects followed by a three byte status indicator
    #[display("compact-TLV with status indicator")]
    CompactWithStatus,
    /// `10`: DIR data reference
    #[display("DIR data reference")]
    DirDataReference,
    /// `80`: compact-TLV objects, status indicator optional
    #[display("compact-TLV")]
    Compact,
    /// Any other value
    #[display("proprietary ({_0:#04x})")]
    Proprietary(u8),
}

impl CategoryIndicator {
    /// Decode the category indicator byte
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::CompactWithStatus,
            0x10 => Self::DirDataReference,
            0x80 => Self::Compact,
            other => Self::Proprietary(other),
        }
    }
}

/// Decoded historical bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalBytes {
    raw: Bytes,
    category: CategoryIndicator,
    objects: Vec<Tlv>,
    status: Option<StatusIndicator>,
    dir_reference: Option<u8>,
    storage_card: bool,
    capabilities: Option<CardCapabilities>,
}

impl HistoricalBytes {
    /// Decode historical bytes, deriving the card capabilities eagerly
    pub fn parse(data: &[u8]) -> Result<Self, AtrError> {
        let Some((&category_byte, rest)) = data.split_first() else {
            return Err(AtrError::NoHistoricalBytes);
        };
        let category = CategoryIndicator::from_byte(category_byte);

        let mut objects = Vec::new();
        let mut status = None;
        let mut dir_reference = None;
        let mut storage_card = false;

        match category {
            CategoryIndicator::CompactWithStatus => {
                let Some((payload, status_bytes)) = rest.split_last_chunk::<3>() else {
                    return Err(AtrError::TooShort(data.len()));
                };
                (objects, storage_card) = parse_objects(payload)?;
                status = StatusIndicator::from_value(status_bytes);
            }
            CategoryIndicator::Compact => {
                (objects, storage_card) = parse_objects(rest)?;
                status = StatusIndicator::from_data_objects(&objects);
            }
            CategoryIndicator::DirDataReference => {
                dir_reference = rest.first().copied();
            }
            CategoryIndicator::Proprietary(byte) => {
                debug!(category = format_args!("{byte:#04x}"), "Proprietary historical bytes");
            }
        }

        let capabilities = CardCapabilities::from_data_objects(&objects);

        Ok(Self {
            raw: Bytes::copy_from_slice(data),
            category,
            objects,
            status,
            dir_reference,
            storage_card,
            capabilities,
        })
    }

    /// Historical bytes as received
    pub const fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Category indicator
    pub const fn category(&self) -> CategoryIndicator {
        self.category
    }

    /// Compact-TLV data objects
    pub fn objects(&self) -> &[Tlv] {
        &self.objects
    }

    /// Status indicator, mandatory for category `00`
    pub const fn status_indicator(&self) -> Option<StatusIndicator> {
        self.status
    }

    /// DIR data reference for category `10`
    pub const fn dir_data_reference(&self) -> Option<u8> {
        self.dir_reference
    }

    /// Whether this is a PC/SC contactless storage card
    ///
    /// Storage cards put simple-TLV data where compact-TLV is expected, their
    /// objects are not decoded.
    pub const fn is_storage_card(&self) -> bool {
        self.storage_card
    }

    /// Card capabilities, `None` when the card does not declare them
    pub const fn capabilities(&self) -> Option<&CardCapabilities> {
        self.capabilities.as_ref()
    }

    /// Country indicator
    pub fn country_indicator(&self) -> Option<CountryIndicator> {
        CountryIndicator::from_data_objects(&self.objects)
    }

    /// Issuer indicator
    pub fn issuer_indicator(&self) -> Option<IssuerIndicator> {
        IssuerIndicator::from_data_objects(&self.objects)
    }

    /// Card service data
    pub fn card_service_data(&self) -> Option<CardServiceData> {
        CardServiceData::from_data_objects(&self.objects)
    }

    /// Initial access data
    pub fn initial_access_data(&self) -> Option<InitialAccessData> {
        InitialAccessData::from_data_objects(&self.objects)
    }

    /// Card issuer's data
    pub fn card_issuers_data(&self) -> Option<CardIssuersData> {
        CardIssuersData::from_data_objects(&self.objects)
    }

    /// Pre-issuing data
    pub fn pre_issuing_data(&self) -> Option<PreIssuingData> {
        PreIssuingData::from_data_objects(&self.objects)
    }
}

fn parse_objects(payload: &[u8]) -> Result<(Vec<Tlv>, bool), AtrError> {
    if payload.is_empty() {
        return Ok((Vec::new(), false));
    }
    if payload.len() > 6 + PCSC_RID.len() && payload[0] == 0x4F && payload[2..7] == PCSC_RID {
        return Ok((Vec::new(), true));
    }
    let forest = compact::parse(payload)?;
    if !forest.is_complete() {
        debug!(
            trailing = %hex::encode(forest.trailing()),
            "Ignoring undecodable historical bytes"
        );
    }
    Ok((forest.into_nodes(), false))
}

/// Card description derived from the ATR, built once per card session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    atr: Atr,
    historical: Option<HistoricalBytes>,
}

impl CardInfo {
    /// Derive the card description from a parsed ATR
    ///
    /// Historical bytes that fail to decode are logged and treated as absent.
    pub fn from_atr(atr: Atr) -> Self {
        let historical = match atr.historical() {
            Ok(historical) => Some(historical),
            Err(AtrError::NoHistoricalBytes) => None,
            Err(e) => {
                warn!(error = %e, "Failed to decode historical bytes");
                None
            }
        };
        Self { atr, historical }
    }

    /// Parse the ATR bytes and derive the card description
    pub fn from_atr_bytes(data: &[u8]) -> Result<Self, AtrError> {
        Atr::parse(data).map(Self::from_atr)
    }

    /// The parsed ATR
    pub const fn atr(&self) -> &Atr {
        &self.atr
    }

    /// Decoded historical bytes
    pub const fn historical_bytes(&self) -> Option<&HistoricalBytes> {
        self.historical.as_ref()
    }

    /// Card capabilities, if declared
    pub fn capabilities(&self) -> Option<&CardCapabilities> {
        self.historical.as_ref().and_then(HistoricalBytes::capabilities)
    }
}
