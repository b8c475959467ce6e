//! BER-TLV dialect

use bytes::{BufMut, Bytes, BytesMut};

use super::length::{self, Length};
use super::{Tag, Tlv, TlvError, TlvForest, parse_units};

/// Parse a BER-TLV byte stream into top-level nodes and trailing bytes
pub fn parse(data: &[u8]) -> Result<TlvForest, TlvError> {
    parse_units(data, parse_node)
}

/// Deepest nesting of constructed nodes accepted from a card
pub const MAX_DEPTH: usize = 32;

/// Parse exactly one node from the start of `data`
///
/// Returns the node and the number of octets it occupied, including an
/// end-of-contents terminator for indefinite lengths.
pub fn parse_node(data: &[u8]) -> Result<(Tlv, usize), TlvError> {
    parse_node_at(data, 0)
}

fn parse_node_at(data: &[u8], depth: usize) -> Result<(Tlv, usize), TlvError> {
    let (tag, tag_len) = Tag::parse(data)?;
    let rest = &data[tag_len..];
    let (len, len_len) = length::parse(rest)?;
    let rest = &rest[len_len..];
    let header_len = tag_len + len_len;

    if !tag.is_constructed() {
        let Length::Definite(n) = len else {
            return Err(TlvError::IndefinitePrimitive(tag.tag_num_with_class()));
        };
        let value = rest.get(..n).ok_or(TlvError::TruncatedInput)?;
        let node = Tlv::Primitive {
            tag,
            value: Bytes::copy_from_slice(value),
        };
        return Ok((node, header_len + n));
    }

    if depth >= MAX_DEPTH {
        return Err(TlvError::NestingTooDeep(MAX_DEPTH));
    }

    let (children, value_len) = match len {
        Length::Definite(n) => {
            let value = rest.get(..n).ok_or(TlvError::TruncatedInput)?;
            (parse_children(value, depth + 1)?, n)
        }
        Length::Indefinite => parse_until_end_of_contents(rest, depth + 1)?,
    };

    Ok((Tlv::Constructed { tag, children }, header_len + value_len))
}

/// Parse the value of a definite constructed node, which must consist of whole nodes
fn parse_children(mut data: &[u8], depth: usize) -> Result<Vec<Tlv>, TlvError> {
    let mut children = Vec::new();
    while !data.is_empty() {
        let (child, consumed) = parse_node_at(data, depth)?;
        children.push(child);
        data = &data[consumed..];
    }
    Ok(children)
}

/// Parse children up to the end-of-contents octets of their parent
///
/// Returns the children and the octets consumed, terminator included.
fn parse_until_end_of_contents(data: &[u8], depth: usize) -> Result<(Vec<Tlv>, usize), TlvError> {
    let mut children = Vec::new();
    let mut offset = 0;
    loop {
        let rest = &data[offset..];
        if rest.starts_with(&length::END_OF_CONTENTS) {
            return Ok((children, offset + length::END_OF_CONTENTS.len()));
        }
        if rest.is_empty() {
            return Err(TlvError::TruncatedInput);
        }
        let (child, consumed) = parse_node_at(rest, depth)?;
        children.push(child);
        offset += consumed;
    }
}

/// Serialize nodes as BER-TLV with minimal definite lengths
pub fn serialize(nodes: &[Tlv]) -> Bytes {
    let mut buf = BytesMut::with_capacity(nodes.iter().map(encoded_len).sum());
    for node in nodes {
        encode_into(node, &mut buf);
    }
    buf.freeze()
}

fn value_len(node: &Tlv) -> usize {
    match node {
        Tlv::Primitive { value, .. } => value.len(),
        Tlv::Constructed { children, .. } => children.iter().map(encoded_len).sum(),
    }
}

fn encoded_len(node: &Tlv) -> usize {
    let value_len = value_len(node);
    node.tag().encoded_len() + length::encoded_len(value_len) + value_len
}

fn encode_into(node: &Tlv, buf: &mut BytesMut) {
    node.tag().encode_into(buf);
    length::encode_into(value_len(node), buf);
    match node {
        Tlv::Primitive { value, .. } => buf.put_slice(value),
        Tlv::Constructed { children, .. } => {
            for child in children {
                encode_into(child, buf);
            }
        }
    }
}
