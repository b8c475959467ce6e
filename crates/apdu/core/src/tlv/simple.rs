//! Simple-TLV dialect
//!
//! One tag octet, then either a single length octet or `FF` followed by a
//! two octet big-endian length. Simple-TLV has no class or constructed bits, so
//! the whole tag octet is stored as a universal primitive tag number.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Tag, TagClass, Tlv, TlvError, TlvForest, parse_units};

const DIALECT: &str = "simple";

/// Length octet announcing a three octet length field
const THREE_BYTE_LENGTH: u8 = 0xFF;

/// Tag for simple-TLV tag octet `octet`
pub const fn tag(octet: u8) -> Tag {
    Tag::primitive(TagClass::Universal, octet as u64)
}

/// Parse a simple-TLV byte stream
pub fn parse(data: &[u8]) -> Result<TlvForest, TlvError> {
    parse_units(data, parse_node)
}

fn parse_node(data: &[u8]) -> Result<(Tlv, usize), TlvError> {
    let (&tag_octet, rest) = data.split_first().ok_or(TlvError::TruncatedInput)?;
    let (&first_len, rest) = rest.split_first().ok_or(TlvError::TruncatedInput)?;

    let (len, header_len) = if first_len == THREE_BYTE_LENGTH {
        let raw = rest.get(..2).ok_or(TlvError::TruncatedInput)?;
        (usize::from(u16::from_be_bytes([raw[0], raw[1]])), 4)
    } else {
        (usize::from(first_len), 2)
    };

    let value = data
        .get(header_len..header_len + len)
        .ok_or(TlvError::TruncatedInput)?;

    let node = Tlv::Primitive {
        tag: tag(tag_octet),
        value: Bytes::copy_from_slice(value),
    };
    Ok((node, header_len + len))
}

/// Serialize primitive nodes as simple-TLV
pub fn serialize(nodes: &[Tlv]) -> Result<Bytes, TlvError> {
    let mut buf = BytesMut::new();
    for node in nodes {
        let Tlv::Primitive { tag, value } = node else {
            return Err(TlvError::ConstructedNotAllowed(DIALECT));
        };
        let octet = u8::try_from(tag.number())
            .map_err(|_| TlvError::TagNotEncodable(tag.tag_num_with_class(), DIALECT))?;
        if tag.class() != TagClass::Universal {
            return Err(TlvError::TagNotEncodable(tag.tag_num_with_class(), DIALECT));
        }

        buf.put_u8(octet);
        match value.len() {
            len @ 0..=0xFE => buf.put_u8(len as u8),
            len @ 0xFF..=0xFFFF => {
                buf.put_u8(THREE_BYTE_LENGTH);
                buf.put_u16(len as u16);
            }
            len => return Err(TlvError::ValueTooLong(len, DIALECT)),
        }
        buf.put_slice(value);
    }
    Ok(buf.freeze())
}
