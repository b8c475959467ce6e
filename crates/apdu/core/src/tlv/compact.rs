//! Compact-TLV dialect used in historical bytes
//!
//! Each data object starts with one octet carrying the tag number in the upper
//! nibble and the value length in the lower nibble. Tags are application class
//! primitives, so compact tag `n` has the encoded tag `0x40 | n`.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Tag, TagClass, Tlv, TlvError, TlvForest, parse_units};

const DIALECT: &str = "compact";

/// Encoded tag of compact data object `number`
pub const fn tag_num(number: u8) -> u64 {
    0x40 | (number & 0x0F) as u64
}

/// Tag of compact data object `number`
pub const fn tag(number: u8) -> Tag {
    Tag::primitive(TagClass::Application, (number & 0x0F) as u64)
}

/// Parse a compact-TLV byte stream
pub fn parse(data: &[u8]) -> Result<TlvForest, TlvError> {
    parse_units(data, parse_node)
}

fn parse_node(data: &[u8]) -> Result<(Tlv, usize), TlvError> {
    let header = *data.first().ok_or(TlvError::TruncatedInput)?;
    let len = usize::from(header & 0x0F);
    let value = data.get(1..1 + len).ok_or(TlvError::TruncatedInput)?;

    let node = Tlv::Primitive {
        tag: tag(header >> 4),
        value: Bytes::copy_from_slice(value),
    };
    Ok((node, 1 + len))
}

/// Serialize primitive application-class nodes as compact-TLV
pub fn serialize(nodes: &[Tlv]) -> Result<Bytes, TlvError> {
    let mut buf = BytesMut::new();
    for node in nodes {
        let Tlv::Primitive { tag, value } = node else {
            return Err(TlvError::ConstructedNotAllowed(DIALECT));
        };
        if tag.class() != TagClass::Application || tag.number() > 0x0F {
            return Err(TlvError::TagNotEncodable(tag.tag_num_with_class(), DIALECT));
        }
        if value.len() > 0x0F {
            return Err(TlvError::ValueTooLong(value.len(), DIALECT));
        }

        buf.put_u8(((tag.number() as u8) << 4) | value.len() as u8);
        buf.put_slice(value);
    }
    Ok(buf.freeze())
}
