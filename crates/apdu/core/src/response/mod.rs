//! APDU response definitions
//!
//! This module provides the response APDU value type according to ISO/IEC 7816-4.

pub mod status;
pub mod utils;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::command::ApduError;
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data without the status word
    data: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with data and status
    pub fn new(data: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            data: data.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub fn success(data: impl Into<Bytes>) -> Self {
        Self::new(data, status::common::SUCCESS)
    }

    /// Create a response carrying only a status word
    pub fn from_status(status: impl Into<StatusWord>) -> Self {
        Self::new(Bytes::new(), status)
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &Bytes) -> Result<Self, ApduError> {
        let (status, payload) = utils::extract_status_and_payload(data)?;

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            data: data.slice(..payload.len()),
            status,
        })
    }

    /// Response data without the status word
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Take the response data
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Status word as a single integer
    pub const fn sw(&self) -> u16 {
        self.status.to_u16()
    }

    /// First status byte
    pub const fn sw1(&self) -> u8 {
        self.status.sw1
    }

    /// Second status byte
    pub const fn sw2(&self) -> u8 {
        self.status.sw2
    }

    /// Whether the card reported normal processing (90 00)
    pub const fn is_normal_processed(&self) -> bool {
        self.status.is_success()
    }

    /// Return the data on 90 00, otherwise the status word as error
    pub fn into_result(self) -> Result<Bytes, StatusWord> {
        if self.is_normal_processed() {
            Ok(self.data)
        } else {
            Err(self.status)
        }
    }

    /// Encode data followed by SW1 SW2
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 2);
        buf.put_slice(&self.data);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = ApduError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(&Bytes::copy_from_slice(data))
    }
}

impl TryFrom<Bytes> for Response {
    type Error = ApduError;

    fn try_from(data: Bytes) -> Result<Self, Self::Error> {
        Self::from_bytes(&data)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}
