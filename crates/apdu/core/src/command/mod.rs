//! APDU command definitions
//!
//! This module provides the command APDU value type with short and extended
//! length encodings according to ISO/IEC 7816-4 §5.1.

pub mod error;

use bytes::{BufMut, Bytes, BytesMut};

pub use error::ApduError;

/// Largest Nc/Ne expressible with a short length field
pub const SHORT_MAX: usize = 0xFF;

/// Largest Nc expressible with an extended length field
pub const EXTENDED_MAX: usize = 0xFFFF;

/// CLA bit announcing that more command chunks follow
pub const CLA_CHAINING: u8 = 0x10;

/// CLA bits announcing secure messaging with an authenticated header
pub const CLA_SECURE_MESSAGING: u8 = 0x0C;

/// Instruction byte of GET RESPONSE
pub const INS_GET_RESPONSE: u8 = 0xC0;

/// Generic APDU command structure
///
/// `le` carries the raw Le field value. `Some(0)` requests the maximum: 256
/// bytes in short form, 65536 bytes in extended form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<u16>,
    /// Encode with extended length fields even when short ones would do
    pub force_extended: bool,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
            force_extended: false,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u16) -> Self {
        Self::new(cla, ins, p1, p2).with_le(le)
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Create a new command with both data and expected length
    pub fn new_with_data_and_le<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
        le: u16,
    ) -> Self {
        Self::new_with_data(cla, ins, p1, p2, data).with_le(le)
    }

    /// GET RESPONSE requesting `le` bytes
    pub const fn get_response(cla: u8, le: u8) -> Self {
        Self::new_with_le(cla, INS_GET_RESPONSE, 0x00, 0x00, le as u16)
    }

    /// Set the data field, an empty payload clears it
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        let data = data.into();
        self.data = (!data.is_empty()).then_some(data);
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u16) -> Self {
        self.le = Some(le);
        self
    }

    /// Remove the expected length field
    pub const fn without_le(mut self) -> Self {
        self.le = None;
        self
    }

    /// Force or relax extended length encoding
    pub const fn with_extended(mut self, extended: bool) -> Self {
        self.force_extended = extended;
        self
    }

    /// Mark this command as a non-final chunk of a chain
    pub const fn with_chaining(mut self) -> Self {
        self.cla |= CLA_CHAINING;
        self
    }

    /// Whether the chaining bit is set in CLA
    pub const fn is_chained(&self) -> bool {
        self.cla & CLA_CHAINING != 0
    }

    /// Command data, empty when absent
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Length of the command data (Nc)
    pub fn lc(&self) -> usize {
        self.data.as_ref().map_or(0, Bytes::len)
    }

    /// Whether this command is encoded with extended length fields
    pub fn is_extended(&self) -> bool {
        self.force_extended
            || self.lc() > SHORT_MAX
            || self.le.is_some_and(|le| usize::from(le) > SHORT_MAX)
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        let lc = self.lc();
        let extended = self.is_extended();

        let mut length = 4;
        if lc > 0 {
            length += lc + if extended { 3 } else { 1 };
        }
        if self.le.is_some() {
            length += match (extended, lc > 0) {
                (false, _) => 1,
                (true, true) => 2,
                (true, false) => 3,
            };
        }
        length
    }

    /// Convert to raw APDU bytes
    pub fn try_to_bytes(&self) -> Result<Bytes, ApduError> {
        let lc = self.lc();
        if lc > EXTENDED_MAX {
            return Err(ApduError::PayloadTooLarge(lc));
        }
        let extended = self.is_extended();

        let mut buffer = BytesMut::with_capacity(self.command_length());
        buffer.put_slice(&[self.cla, self.ins, self.p1, self.p2]);

        if let Some(data) = self.data.as_ref().filter(|d| !d.is_empty()) {
            if extended {
                buffer.put_u8(0x00);
                buffer.put_u16(lc as u16);
            } else {
                buffer.put_u8(lc as u8);
            }
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            match (extended, lc > 0) {
                (false, _) => buffer.put_u8(le as u8),
                (true, true) => buffer.put_u16(le),
                (true, false) => {
                    buffer.put_u8(0x00);
                    buffer.put_u16(le);
                }
            }
        }

        Ok(buffer.freeze())
    }

    /// Parse a command from raw bytes
    ///
    /// The case is derived from the shape of the bytes following the header. A
    /// leading `00` is an extended marker unless it is the only remaining byte.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ApduError> {
        let Some((header, body)) = data.split_first_chunk::<4>() else {
            return Err(ApduError::TruncatedApdu(data.len()));
        };
        let [cla, ins, p1, p2] = *header;
        let mut command = Self::new(cla, ins, p1, p2);
        let invalid = || ApduError::InvalidCommandLength(data.len());

        match body {
            // case 1
            [] => {}
            // case 2 short
            [le] => command.le = Some(u16::from(*le)),
            // case 2 extended
            [0x00, hi, lo] => {
                command.le = Some(u16::from_be_bytes([*hi, *lo]));
                command.force_extended = true;
            }
            // case 3 or 4 extended
            [0x00, hi, lo, rest @ ..] => {
                let lc = usize::from(u16::from_be_bytes([*hi, *lo]));
                if lc == 0 {
                    return Err(invalid());
                }
                let payload = rest.get(..lc).ok_or_else(invalid)?;
                command.data = Some(Bytes::copy_from_slice(payload));
                command.force_extended = true;
                match &rest[lc..] {
                    [] => {}
                    [hi, lo] => command.le = Some(u16::from_be_bytes([*hi, *lo])),
                    _ => return Err(invalid()),
                }
            }
            // case 3 or 4 short
            [lc, rest @ ..] => {
                let lc = usize::from(*lc);
                if lc == 0 {
                    return Err(invalid());
                }
                let payload = rest.get(..lc).ok_or_else(invalid)?;
                command.data = Some(Bytes::copy_from_slice(payload));
                match &rest[lc..] {
                    [] => {}
                    [le] => command.le = Some(u16::from(*le)),
                    _ => return Err(invalid()),
                }
            }
        }

        Ok(command)
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = ApduError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Command {
        Command::new(0x00, 0x01, 0x02, 0x03)
    }

    #[test]
    fn test_command_serialization() {
        let data = Bytes::from_static(&[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00]);
        let cmd = Command::new_with_data_and_le(0x00, 0xA4, 0x04, 0x00, data, 0);
        assert_eq!(
            cmd.try_to_bytes().unwrap().as_ref(),
            hex::decode("00A4040006A0000001510000").unwrap().as_slice()
        );
    }

    #[test]
    fn test_short_cases() {
        assert_eq!(header().try_to_bytes().unwrap().as_ref(), &[0x00, 0x01, 0x02, 0x03]);
        assert_eq!(
            header().with_le(0).try_to_bytes().unwrap().as_ref(),
            &[0x00, 0x01, 0x02, 0x03, 0x00]
        );
        assert_eq!(
            header().with_le(0xFF).try_to_bytes().unwrap().as_ref(),
            &[0x00, 0x01, 0x02, 0x03, 0xFF]
        );
        assert_eq!(
            header().with_data(vec![0xAA]).try_to_bytes().unwrap().as_ref(),
            &[0x00, 0x01, 0x02, 0x03, 0x01, 0xAA]
        );
    }

    #[test]
    fn test_extended_le_only() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00).with_le(256);
        let bytes = cmd.try_to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0xA4, 0x04, 0x00, 0x00, 0x01, 0x00]);

        let decoded = Command::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.le, Some(256));
        assert!(decoded.data.is_none());
        assert_eq!(decoded.data(), &[] as &[u8]);

        assert_eq!(
            header().with_le(0xFFFF).try_to_bytes().unwrap().as_ref(),
            hex::decode("0001020300FFFF").unwrap().as_slice()
        );
    }

    #[test]
    fn test_extended_data() {
        let payload = vec![0x5A; 0x100];
        let bytes = header().with_data(payload.clone()).try_to_bytes().unwrap();
        assert_eq!(&bytes[..7], &[0x00, 0x01, 0x02, 0x03, 0x00, 0x01, 0x00]);
        assert_eq!(bytes.len(), 7 + 0x100);

        let bytes = header().with_data(payload.clone()).with_le(0).try_to_bytes().unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], &[0x00, 0x00]);

        let decoded = Command::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.data(), payload.as_slice());
        assert_eq!(decoded.le, Some(0));
    }

    #[test]
    fn test_forced_extended() {
        let bytes = header().with_le(0).with_extended(true).try_to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0x01, 0x02, 0x03, 0x00, 0x00, 0x00]);

        let bytes = header().with_data(vec![0x01]).with_extended(true).try_to_bytes().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x00, 0x01, 0x02, 0x03, 0x00, 0x00, 0x01, 0x01]
        );

        // a case 1 command never grows extended markers
        assert_eq!(header().with_extended(true).try_to_bytes().unwrap().len(), 4);
    }

    #[test]
    fn test_command_length() {
        let cmds = [
            header(),
            header().with_le(0xFF),
            header().with_data(vec![1, 2, 3]),
            header().with_data(vec![1, 2, 3]).with_le(0xFF),
            header().with_le(0x100),
            header().with_data(vec![0; 300]).with_le(0x100),
        ];
        for cmd in cmds {
            assert_eq!(cmd.command_length(), cmd.try_to_bytes().unwrap().len());
        }
    }

    #[test]
    fn test_command_from_bytes() {
        let cmd = Command::from_bytes(&[0x00, 0xA4, 0x04, 0x00]).unwrap();
        assert_eq!((cmd.cla, cmd.ins, cmd.p1, cmd.p2), (0x00, 0xA4, 0x04, 0x00));
        assert!(cmd.data.is_none());
        assert!(cmd.le.is_none());

        let cmd = Command::from_bytes(&[0x00, 0xA4, 0x04, 0x00, 0x03, 0x01, 0x02, 0x03]).unwrap();
        assert_eq!(cmd.data(), &[0x01, 0x02, 0x03]);
        assert!(cmd.le.is_none());

        let cmd =
            Command::from_bytes(&[0x00, 0xA4, 0x04, 0x00, 0x03, 0x01, 0x02, 0x03, 0xFF]).unwrap();
        assert_eq!(cmd.data(), &[0x01, 0x02, 0x03]);
        assert_eq!(cmd.le, Some(0xFF));

        // a single 00 after the header is a short Le
        let cmd = Command::from_bytes(&[0x00, 0xB0, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(cmd.le, Some(0));
        assert!(!cmd.force_extended);
    }

    #[test]
    fn test_command_from_bytes_invalid() {
        assert_eq!(
            Command::from_bytes(&[0x00, 0xA4, 0x04]),
            Err(ApduError::TruncatedApdu(3))
        );
        assert_eq!(
            Command::from_bytes(&[0x00, 0xA4, 0x04, 0x00, 0x03, 0x01]),
            Err(ApduError::InvalidCommandLength(6))
        );
        assert_eq!(
            Command::from_bytes(&[0x00, 0xA4, 0x04, 0x00, 0x01, 0x01, 0x02, 0x03]),
            Err(ApduError::InvalidCommandLength(8))
        );
        assert_eq!(
            Command::from_bytes(&[0x00, 0xA4, 0x04, 0x00, 0x00, 0x00, 0x02, 0x01]),
            Err(ApduError::InvalidCommandLength(8))
        );
    }

    #[test]
    fn test_chaining_bit() {
        let cmd = Command::new(0x0C, 0xDA, 0x01, 0x02).with_chaining();
        assert_eq!(cmd.cla, 0x1C);
        assert!(cmd.is_chained());
        assert!(!Command::new(0x00, 0xDA, 0x01, 0x02).is_chained());
    }

    #[test]
    fn test_payload_too_large() {
        let cmd = header().with_data(vec![0u8; EXTENDED_MAX + 1]);
        assert_eq!(
            cmd.try_to_bytes(),
            Err(ApduError::PayloadTooLarge(EXTENDED_MAX + 1))
        );
        assert_eq!(
            cmd.with_le(0).try_to_bytes(),
            Err(ApduError::PayloadTooLarge(EXTENDED_MAX + 1))
        );

        // the largest encodable payload is kept whole
        let bytes = header().with_data(vec![0x5A; EXTENDED_MAX]).try_to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + 3 + EXTENDED_MAX);
        assert_eq!(&bytes[4..7], &[0x00, 0xFF, 0xFF]);
    }
}
