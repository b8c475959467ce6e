//! PC/SC part 10 reader features
//!
//! Readers announce optional functions such as PIN pads or PACE through
//! `GET_FEATURE_REQUEST`. The answer is simple-TLV, one entry per feature, each
//! value the big-endian control code to use for that feature.

use std::collections::BTreeMap;
use std::sync::Arc;

use eidlink_apdu_core::{ControlTransport, TlvDecode};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::PaceError;
use crate::feature::PaceFeature;

/// Function number of GET_FEATURE_REQUEST
pub const GET_FEATURE_REQUEST: u32 = 3400;

/// Reader feature tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum FeatureTag {
    VerifyPinStart = 0x01,
    VerifyPinFinish = 0x02,
    ModifyPinStart = 0x03,
    ModifyPinFinish = 0x04,
    GetKeyPressed = 0x05,
    VerifyPinDirect = 0x06,
    ModifyPinDirect = 0x07,
    MctReaderDirect = 0x08,
    MctUniversal = 0x09,
    IfdPinProperties = 0x0A,
    Abort = 0x0B,
    SetSpeMessage = 0x0C,
    VerifyPinDirectAppId = 0x0D,
    ModifyPinDirectAppId = 0x0E,
    WriteDisplay = 0x0F,
    GetKey = 0x10,
    IfdDisplayProperties = 0x11,
    GetTlvProperties = 0x12,
    CcidEscCommand = 0x13,
    ExecutePace = 0x20,
}

impl FeatureTag {
    /// Look up a feature by its tag byte
    pub const fn from_tag(tag: u8) -> Option<Self> {
        let feature = match tag {
            0x01 => Self::VerifyPinStart,
            0x02 => Self::VerifyPinFinish,
            0x03 => Self::ModifyPinStart,
            0x04 => Self::ModifyPinFinish,
            0x05 => Self::GetKeyPressed,
            0x06 => Self::VerifyPinDirect,
            0x07 => Self::ModifyPinDirect,
            0x08 => Self::MctReaderDirect,
            0x09 => Self::MctUniversal,
            0x0A => Self::IfdPinProperties,
            0x0B => Self::Abort,
            0x0C => Self::SetSpeMessage,
            0x0D => Self::VerifyPinDirectAppId,
            0x0E => Self::ModifyPinDirectAppId,
            0x0F => Self::WriteDisplay,
            0x10 => Self::GetKey,
            0x11 => Self::IfdDisplayProperties,
            0x12 => Self::GetTlvProperties,
            0x13 => Self::CcidEscCommand,
            0x20 => Self::ExecutePace,
            _ => return None,
        };
        Some(feature)
    }

    /// Tag byte
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// Features a reader announced, with their control codes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderFeatures {
    features: BTreeMap<FeatureTag, u32>,
}

impl ReaderFeatures {
    /// Ask the reader for its features
    pub fn discover<C: ControlTransport + ?Sized>(transport: &mut C) -> Result<Self, PaceError> {
        let code = transport.control_code(GET_FEATURE_REQUEST);
        let response = transport.control(code, &[])?;
        let features = Self::decode(&response)?;
        debug!(count = features.len(), "Discovered reader features");
        Ok(features)
    }

    /// Decode a GET_FEATURE_REQUEST answer
    pub fn decode(data: &[u8]) -> Result<Self, PaceError> {
        let mut features = BTreeMap::new();
        if data.is_empty() {
            return Ok(Self { features });
        }

        let forest = data.to_tlv_simple()?;
        if !forest.is_complete() {
            debug!(trailing = %hex::encode(forest.trailing()), "Ignoring trailing feature bytes");
        }

        for node in forest.nodes() {
            // simple-TLV tags are a single octet
            let tag = node.tag().number() as u8;
            let value: &[u8] = node.value().map_or(&[][..], |v| &v[..]);
            let code = <[u8; 4]>::try_from(value)
                .map(u32::from_be_bytes)
                .map_err(|_| PaceError::InvalidFeature {
                    tag,
                    len: value.len(),
                })?;

            match FeatureTag::from_tag(tag) {
                Some(feature) => {
                    trace!(%feature, code = format_args!("{code:#010x}"), "Reader feature");
                    features.insert(feature, code);
                }
                None => debug!(tag = format_args!("{tag:#04x}"), "Skipping unknown reader feature"),
            }
        }

        Ok(Self { features })
    }

    /// Control code of `feature`
    pub fn get(&self, feature: FeatureTag) -> Option<u32> {
        self.features.get(&feature).copied()
    }

    /// Whether the reader offers `feature`
    pub fn contains(&self, feature: FeatureTag) -> bool {
        self.features.contains_key(&feature)
    }

    /// Number of known features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the reader offers no known feature
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features with their control codes, in tag order
    pub fn iter(&self) -> impl Iterator<Item = (FeatureTag, u32)> + '_ {
        self.features.iter().map(|(feature, code)| (*feature, *code))
    }

    /// PACE access over `transport` when the reader offers it
    pub fn pace<C>(&self, transport: Arc<Mutex<C>>) -> Option<PaceFeature<C>>
    where
        C: ControlTransport + 'static,
    {
        self.get(FeatureTag::ExecutePace)
            .map(|code| PaceFeature::new(transport, code))
    }
}
