//! Byte layouts of the PACE control command
//!
//! A request is `[function, len_lo, len_hi, data...]`. A response is a
//! little-endian 32-bit result code, a little-endian 16-bit length and the
//! output data.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use eidlink_apdu_core::StatusWord;

use crate::error::PaceError;
use crate::result::PaceResultCode;

/// Functions of the PACE control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PaceFunction {
    /// Query the PACE variants the reader implements
    GetReaderPaceCapabilities = 0x01,
    /// Run PACE with the card
    EstablishPaceChannel = 0x02,
    /// Tear down a channel established by the reader
    DestroyPaceChannel = 0x03,
}

impl PaceFunction {
    /// Control payload for this function
    pub fn request(self, data: &[u8]) -> Result<Bytes, PaceError> {
        let len = u16::try_from(data.len()).map_err(|_| PaceError::FieldTooLong {
            field: "input data",
            len: data.len(),
        })?;
        let mut buf = BytesMut::with_capacity(3 + data.len());
        buf.put_u8(self as u8);
        buf.put_u16_le(len);
        buf.put_slice(data);
        Ok(buf.freeze())
    }
}

/// Check the result code of a PACE response and return its output data
pub fn decode_response(response: &[u8]) -> Result<Bytes, PaceError> {
    let mut cursor = Cursor::new(response);
    let code = cursor
        .take_array::<4>()
        .map(u32::from_le_bytes)
        .ok_or(PaceError::MalformedResponse("missing result code"))?;
    PaceResultCode::from_code(code)?.into_result()?;

    let len = cursor
        .take_array::<2>()
        .map(u16::from_le_bytes)
        .ok_or(PaceError::MalformedResponse("missing output length"))?;
    let data = cursor
        .take(usize::from(len))
        .ok_or(PaceError::MalformedResponse("output data shorter than its length"))?;
    Ok(Bytes::copy_from_slice(data))
}

/// A PACE variant supported by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PaceCapability {
    /// PACE for qualified electronic signature applications
    Qes = 0x10,
    /// PACE for the German eID application
    GermanEid = 0x20,
    /// Generic PACE
    GenericPace = 0x40,
    /// Reader can destroy a channel it established
    DestroyChannel = 0x80,
}

impl PaceCapability {
    /// All capabilities in bit order
    pub const ALL: [Self; 4] = [Self::Qes, Self::GermanEid, Self::GenericPace, Self::DestroyChannel];
}

impl fmt::Display for PaceCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Qes => "QES",
            Self::GermanEid => "German eID",
            Self::GenericPace => "generic PACE",
            Self::DestroyChannel => "destroy channel",
        })
    }
}

/// Set of PACE capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaceCapabilities(u8);

impl PaceCapabilities {
    /// Create from the raw bit-set
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bit-set
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Decode the output of GetReaderPaceCapabilities
    ///
    /// Output longer than one byte starts with the length of the bit-set.
    pub fn decode(data: &[u8]) -> Result<Self, PaceError> {
        let bits = match data {
            [] => &[][..],
            [_] => data,
            [len, rest @ ..] => rest
                .get(..usize::from(*len))
                .ok_or(PaceError::MalformedResponse("capability bit-set shorter than its length"))?,
        };
        Ok(Self(bits.first().copied().unwrap_or(0)))
    }

    /// Whether `capability` is in the set
    pub const fn contains(&self, capability: PaceCapability) -> bool {
        self.0 & capability as u8 != 0
    }

    /// Whether the reader runs Terminal Authentication and needs a certificate description
    pub const fn includes_cert_description(&self) -> bool {
        self.contains(PaceCapability::GermanEid) || self.contains(PaceCapability::Qes)
    }

    /// Capabilities in the set
    pub fn iter(&self) -> impl Iterator<Item = PaceCapability> + '_ {
        PaceCapability::ALL
            .into_iter()
            .filter(|capability| self.contains(*capability))
    }
}

impl fmt::Display for PaceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for capability in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{capability}")?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Password used to run PACE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PinId {
    /// Machine readable zone
    Mrz = 0x01,
    /// Card access number
    Can = 0x02,
    /// eID PIN
    Pin = 0x03,
    /// PIN unblocking key
    Puk = 0x04,
}

impl TryFrom<u8> for PinId {
    type Error = PaceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Mrz),
            0x02 => Ok(Self::Can),
            0x03 => Ok(Self::Pin),
            0x04 => Ok(Self::Puk),
            _ => Err(PaceError::InvalidPinId(value)),
        }
    }
}

/// Input of EstablishPaceChannel
#[derive(Clone, PartialEq, Eq)]
pub struct EstablishChannelRequest {
    /// Password type
    pub pin_id: PinId,
    /// Certificate holder authorization template for a following Terminal Authentication
    pub chat: Option<Bytes>,
    /// Password handed to the reader, `None` to enter it on the reader's PIN pad
    pub pin: Option<String>,
    /// Certificate description for a following Terminal Authentication
    pub cert_description: Option<Bytes>,
}

impl fmt::Debug for EstablishChannelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstablishChannelRequest")
            .field("pin_id", &self.pin_id)
            .field("chat", &self.chat.as_ref().map(hex::encode))
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .field("cert_description", &self.cert_description.as_ref().map(hex::encode))
            .finish()
    }
}

impl EstablishChannelRequest {
    /// Request for `pin_id` with the password entered on the reader
    pub const fn new(pin_id: PinId) -> Self {
        Self {
            pin_id,
            chat: None,
            pin: None,
            cert_description: None,
        }
    }

    /// Set the CHAT
    pub fn with_chat(mut self, chat: impl Into<Bytes>) -> Self {
        self.chat = Some(chat.into());
        self
    }

    /// Hand the password to the reader
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    /// Set the certificate description
    pub fn with_cert_description(mut self, cert_description: impl Into<Bytes>) -> Self {
        self.cert_description = Some(cert_description.into());
        self
    }

    /// Input data for a reader with `capabilities`
    pub fn encode(&self, capabilities: PaceCapabilities) -> Result<Bytes, PaceError> {
        let chat = self.chat.as_deref().unwrap_or_default();
        let pin = self.pin.as_deref().unwrap_or_default().as_bytes();

        let mut buf = BytesMut::new();
        buf.put_u8(self.pin_id as u8);
        put_u8_prefixed(&mut buf, "chat", chat)?;
        put_u8_prefixed(&mut buf, "pin", pin)?;
        if capabilities.includes_cert_description() {
            let cert = self.cert_description.as_deref().unwrap_or_default();
            let len = u16::try_from(cert.len()).map_err(|_| PaceError::FieldTooLong {
                field: "cert_description",
                len: cert.len(),
            })?;
            buf.put_u16_le(len);
            buf.put_slice(cert);
        }
        Ok(buf.freeze())
    }

    /// Complete control payload for a reader with `capabilities`
    pub fn to_request(&self, capabilities: PaceCapabilities) -> Result<Bytes, PaceError> {
        PaceFunction::EstablishPaceChannel.request(&self.encode(capabilities)?)
    }
}

fn put_u8_prefixed(buf: &mut BytesMut, field: &'static str, value: &[u8]) -> Result<(), PaceError> {
    let len = u8::try_from(value.len()).map_err(|_| PaceError::FieldTooLong {
        field,
        len: value.len(),
    })?;
    buf.put_u8(len);
    buf.put_slice(value);
    Ok(())
}

/// Output of EstablishPaceChannel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishChannelResponse {
    /// Status word of MSE: Set AT
    pub status: StatusWord,
    /// Content of EF.CardAccess
    pub ef_card_access: Bytes,
    /// Most recent certification authority reference
    pub car_current: Option<Bytes>,
    /// Previous certification authority reference
    pub car_previous: Option<Bytes>,
    /// Ephemeral card identifier for Terminal Authentication
    pub id_icc: Option<Bytes>,
}

impl EstablishChannelResponse {
    /// Decode the output data of EstablishPaceChannel
    ///
    /// Groups missing at the end are treated as empty.
    pub fn decode(data: &[u8]) -> Result<Self, PaceError> {
        let mut cursor = Cursor::new(data);
        let status = cursor
            .take_array::<2>()
            .map(u16::from_le_bytes)
            .map(StatusWord::from_u16)
            .ok_or(PaceError::MalformedResponse("missing MSE: Set AT status"))?;

        let ef_card_access = cursor.group_u16("EF.CardAccess")?;
        let car_current = cursor.group_u8("current CAR")?;
        let car_previous = cursor.group_u8("previous CAR")?;
        let id_icc = cursor.group_u16("IDicc")?;

        Ok(Self {
            status,
            ef_card_access,
            car_current: non_empty(car_current),
            car_previous: non_empty(car_previous),
            id_icc: non_empty(id_icc),
        })
    }
}

fn non_empty(value: Bytes) -> Option<Bytes> {
    (!value.is_empty()).then_some(value)
}

/// Bounds checked reader over response bytes
struct Cursor<'a> {
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let (head, rest) = self.data.split_at_checked(len)?;
        self.data = rest;
        Some(head)
    }

    fn take_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, rest) = self.data.split_first_chunk::<N>()?;
        self.data = rest;
        Some(*head)
    }

    fn group_u8(&mut self, group: &'static str) -> Result<Bytes, PaceError> {
        if self.data.is_empty() {
            return Ok(Bytes::new());
        }
        let [len] = self
            .take_array::<1>()
            .ok_or(PaceError::MalformedResponse(group))?;
        self.group_value(group, usize::from(len))
    }

    fn group_u16(&mut self, group: &'static str) -> Result<Bytes, PaceError> {
        if self.data.is_empty() {
            return Ok(Bytes::new());
        }
        let len = self
            .take_array::<2>()
            .map(u16::from_le_bytes)
            .ok_or(PaceError::MalformedResponse(group))?;
        self.group_value(group, usize::from(len))
    }

    fn group_value(&mut self, group: &'static str, len: usize) -> Result<Bytes, PaceError> {
        self.take(len)
            .map(Bytes::copy_from_slice)
            .ok_or(PaceError::MalformedResponse(group))
    }
}
