//! Tag-length-value codec
//!
//! Three wire dialects share one tree model:
//!
//! - BER-TLV ([`ber`]): multi-octet tags, nested constructed objects, definite and
//!   indefinite lengths.
//! - Compact-TLV ([`compact`]): one octet holding tag number and length, used by the
//!   historical bytes of an ATR.
//! - Simple-TLV ([`simple`]): one tag octet with a one or three octet length, used by
//!   PC/SC reader feature lists.
//!
//! A [`Tlv`] owns its children as an ordered vector, so siblings are simply neighbouring
//! elements of a slice. Lookups over siblings are provided by [`TlvSliceExt`].

pub mod ber;
pub mod compact;
mod error;
pub mod length;
pub mod simple;
mod tag;

use bytes::Bytes;

pub use error::TlvError;
pub use tag::{CONSTRUCTED_BIT, Tag, TagClass};

/// A node of a TLV tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tlv {
    /// Leaf node with an opaque value
    Primitive {
        /// Node tag, never constructed
        tag: Tag,
        /// Raw value octets
        value: Bytes,
    },
    /// Node whose value is a sequence of child nodes
    Constructed {
        /// Node tag, always constructed
        tag: Tag,
        /// Children in document order
        children: Vec<Tlv>,
    },
}

impl Tlv {
    /// Create a primitive node, rejecting constructed tags
    pub fn primitive(tag: Tag, value: impl Into<Bytes>) -> Result<Self, TlvError> {
        if tag.is_constructed() {
            return Err(TlvError::KindMismatch(tag.tag_num_with_class()));
        }
        Ok(Self::Primitive {
            tag,
            value: value.into(),
        })
    }

    /// Create a constructed node, rejecting primitive tags
    pub fn constructed(tag: Tag, children: Vec<Self>) -> Result<Self, TlvError> {
        if !tag.is_constructed() {
            return Err(TlvError::KindMismatch(tag.tag_num_with_class()));
        }
        Ok(Self::Constructed { tag, children })
    }

    /// Tag of this node
    pub const fn tag(&self) -> &Tag {
        match self {
            Self::Primitive { tag, .. } | Self::Constructed { tag, .. } => tag,
        }
    }

    /// Whether this node holds children
    pub const fn is_constructed(&self) -> bool {
        matches!(self, Self::Constructed { .. })
    }

    /// Value of a primitive node
    pub const fn value(&self) -> Option<&Bytes> {
        match self {
            Self::Primitive { value, .. } => Some(value),
            Self::Constructed { .. } => None,
        }
    }

    /// Children of a constructed node, empty for primitives
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Primitive { .. } => &[],
            Self::Constructed { children, .. } => children,
        }
    }

    /// First direct child with the given tag
    pub fn find_child(&self, tag: &Tag) -> Option<&Self> {
        self.children().find(tag)
    }

    /// First direct child whose encoded tag equals `num`
    pub fn find_child_by_num(&self, num: u64) -> Option<&Self> {
        self.children().find_by_num(num)
    }

    /// All direct children whose encoded tag equals `num`
    pub fn find_children_by_num(&self, num: u64) -> impl Iterator<Item = &Self> {
        self.children().find_all_by_num(num)
    }

    /// Follow a path of encoded tags through nested children
    ///
    /// The first element must match this node's own tag.
    pub fn find_path(&self, path: &[u64]) -> Option<&Self> {
        let (first, rest) = path.split_first()?;
        if self.tag().tag_num_with_class() != *first {
            return None;
        }
        rest.iter()
            .try_fold(self, |node, num| node.find_child_by_num(*num))
    }

    /// Serialize this node as BER-TLV
    pub fn to_ber(&self) -> Bytes {
        ber::serialize(std::slice::from_ref(self))
    }

    /// Serialize this node as compact-TLV
    pub fn to_compact(&self) -> Result<Bytes, TlvError> {
        compact::serialize(std::slice::from_ref(self))
    }

    /// Serialize this node as simple-TLV
    pub fn to_simple(&self) -> Result<Bytes, TlvError> {
        simple::serialize(std::slice::from_ref(self))
    }
}

/// Result of parsing a TLV byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvForest {
    nodes: Vec<Tlv>,
    trailing: Bytes,
}

impl TlvForest {
    pub(crate) const fn new(nodes: Vec<Tlv>, trailing: Bytes) -> Self {
        Self { nodes, trailing }
    }

    /// First top-level node
    pub fn root(&self) -> Option<&Tlv> {
        self.nodes.first()
    }

    /// All top-level nodes in document order
    pub fn nodes(&self) -> &[Tlv] {
        &self.nodes
    }

    /// Take ownership of the top-level nodes
    pub fn into_nodes(self) -> Vec<Tlv> {
        self.nodes
    }

    /// Bytes following the last parsable node
    pub const fn trailing(&self) -> &Bytes {
        &self.trailing
    }

    /// Whether the whole input was consumed
    pub fn is_complete(&self) -> bool {
        self.trailing.is_empty()
    }
}

/// Sibling lookups over a sequence of nodes
pub trait TlvSliceExt {
    /// First node with the given tag
    fn find(&self, tag: &Tag) -> Option<&Tlv>;

    /// All nodes with the given tag
    fn find_all<'a>(&'a self, tag: &'a Tag) -> impl Iterator<Item = &'a Tlv>;

    /// First node whose encoded tag equals `num`
    fn find_by_num(&self, num: u64) -> Option<&Tlv>;

    /// All nodes whose encoded tag equals `num`
    fn find_all_by_num(&self, num: u64) -> impl Iterator<Item = &Tlv>;
}

impl TlvSliceExt for [Tlv] {
    fn find(&self, tag: &Tag) -> Option<&Tlv> {
        self.iter().find(|node| node.tag() == tag)
    }

    fn find_all<'a>(&'a self, tag: &'a Tag) -> impl Iterator<Item = &'a Tlv> {
        self.iter().filter(move |node| node.tag() == tag)
    }

    fn find_by_num(&self, num: u64) -> Option<&Tlv> {
        self.iter()
            .find(|node| node.tag().tag_num_with_class() == num)
    }

    fn find_all_by_num(&self, num: u64) -> impl Iterator<Item = &Tlv> {
        self.iter()
            .filter(move |node| node.tag().tag_num_with_class() == num)
    }
}

/// Decoding entry points on raw bytes
pub trait TlvDecode {
    /// Parse as BER-TLV
    fn to_tlv_ber(&self) -> Result<TlvForest, TlvError>;

    /// Parse as compact-TLV
    fn to_tlv_compact(&self) -> Result<TlvForest, TlvError>;

    /// Parse as simple-TLV
    fn to_tlv_simple(&self) -> Result<TlvForest, TlvError>;
}

impl TlvDecode for [u8] {
    fn to_tlv_ber(&self) -> Result<TlvForest, TlvError> {
        ber::parse(self)
    }

    fn to_tlv_compact(&self) -> Result<TlvForest, TlvError> {
        compact::parse(self)
    }

    fn to_tlv_simple(&self) -> Result<TlvForest, TlvError> {
        simple::parse(self)
    }
}

/// Parse top-level units until the input ends or a unit fails
///
/// A failure on the first unit is returned as an error, later failures leave the
/// remaining bytes as trailing data.
pub(crate) fn parse_units<F>(data: &[u8], mut parse_one: F) -> Result<TlvForest, TlvError>
where
    F: FnMut(&[u8]) -> Result<(Tlv, usize), TlvError>,
{
    if data.is_empty() {
        return Err(TlvError::NoData);
    }

    let mut nodes = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        match parse_one(&data[offset..]) {
            Ok((node, consumed)) => {
                nodes.push(node);
                offset += consumed;
            }
            Err(e) if nodes.is_empty() => return Err(e),
            Err(e) => {
                tracing::trace!(error = %e, offset, "Stopping TLV parse, keeping trailing bytes");
                break;
            }
        }
    }

    Ok(TlvForest::new(
        nodes,
        Bytes::copy_from_slice(&data[offset..]),
    ))
}
