//! BER tag model shared by all TLV dialects

use bytes::{BufMut, BytesMut};
use derive_more::Display;

use super::error::TlvError;

/// Bit marking a constructed tag in the first tag octet
pub const CONSTRUCTED_BIT: u8 = 0x20;

/// Low five bits of the first octet announcing a multi-octet tag number
const LONG_FORM_MARKER: u8 = 0x1F;

/// Tag class encoded in bits 8 and 7 of the first tag octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TagClass {
    /// Universal class (00)
    #[display("universal")]
    Universal = 0,
    /// Application class (01)
    #[display("application")]
    Application = 1,
    /// Context-specific class (10)
    #[display("context")]
    Context = 2,
    /// Private class (11)
    #[display("private")]
    Private = 3,
}

impl TagClass {
    /// Decode the class from the first tag octet
    pub const fn from_octet(octet: u8) -> Self {
        match octet >> 6 {
            0 => Self::Universal,
            1 => Self::Application,
            2 => Self::Context,
            _ => Self::Private,
        }
    }

    /// The class bits positioned for the first tag octet
    pub const fn bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// Identifier of a TLV node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    class: TagClass,
    constructed: bool,
    number: u64,
}

impl Tag {
    /// Create a tag from its parts
    pub const fn new(class: TagClass, constructed: bool, number: u64) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    /// Create a primitive tag
    pub const fn primitive(class: TagClass, number: u64) -> Self {
        Self::new(class, false, number)
    }

    /// Create a constructed tag
    pub const fn constructed(class: TagClass, number: u64) -> Self {
        Self::new(class, true, number)
    }

    /// Tag class
    pub const fn class(&self) -> TagClass {
        self.class
    }

    /// Whether the value of this tag is a sequence of child nodes
    pub const fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Tag number without class and constructed bits
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// The encoded tag octets read as a big-endian integer
    ///
    /// This is the conventional "hex" name of a tag, e.g. `0x5F20` or `0x7F21`.
    pub fn tag_num_with_class(&self) -> u64 {
        self.to_bytes()
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    /// Rebuild a tag from its conventional big-endian integer name
    pub fn from_tag_num_with_class(value: u64) -> Result<Self, TlvError> {
        let raw = value.to_be_bytes();
        let start = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);
        let (tag, consumed) = Self::parse(&raw[start..])?;
        if consumed != raw.len() - start {
            return Err(TlvError::InvalidTag(value));
        }
        Ok(tag)
    }

    /// Parse a tag from the start of `data`, returning the tag and the number of octets read
    pub fn parse(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let first = *data.first().ok_or(TlvError::TruncatedInput)?;
        let class = TagClass::from_octet(first);
        let constructed = first & CONSTRUCTED_BIT != 0;

        if first & LONG_FORM_MARKER != LONG_FORM_MARKER {
            let number = u64::from(first & LONG_FORM_MARKER);
            return Ok((Self::new(class, constructed, number), 1));
        }

        let mut number: u64 = 0;
        let mut significant_bits: u32 = 0;
        for (idx, octet) in data[1..].iter().enumerate() {
            let group = u64::from(octet & 0x7F);
            if significant_bits == 0 && group != 0 {
                significant_bits = 7 - (octet & 0x7F).leading_zeros().saturating_sub(1);
            } else if significant_bits != 0 {
                significant_bits += 7;
            }
            if significant_bits > u64::BITS {
                return Err(TlvError::TagOverflow);
            }
            number = (number << 7) | group;

            if octet & 0x80 == 0 {
                return Ok((Self::new(class, constructed, number), idx + 2));
            }
        }

        Err(TlvError::TruncatedInput)
    }

    /// Encoded length of this tag in octets
    pub const fn encoded_len(&self) -> usize {
        if self.number < LONG_FORM_MARKER as u64 {
            1
        } else {
            let bits = u64::BITS - self.number.leading_zeros();
            1 + bits.div_ceil(7) as usize
        }
    }

    /// Write the tag octets into `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let mut first = self.class.bits();
        if self.constructed {
            first |= CONSTRUCTED_BIT;
        }

        if self.number < LONG_FORM_MARKER as u64 {
            buf.put_u8(first | self.number as u8);
            return;
        }

        buf.put_u8(first | LONG_FORM_MARKER);
        let groups = self.encoded_len() - 1;
        for i in (0..groups).rev() {
            let group = ((self.number >> (7 * i)) & 0x7F) as u8;
            let more = if i == 0 { 0x00 } else { 0x80 };
            buf.put_u8(group | more);
        }
    }

    /// Encode the tag into its own buffer
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form() {
        let (tag, len) = Tag::parse(&[0x6F]).unwrap();
        assert_eq!(len, 1);
        assert_eq!(tag.class(), TagClass::Application);
        assert!(tag.is_constructed());
        assert_eq!(tag.number(), 15);
        assert_eq!(tag.tag_num_with_class(), 0x6F);
        assert_eq!(tag.to_bytes().as_ref(), &[0x6F]);
    }

    #[test]
    fn test_number_thirty_stays_short() {
        let tag = Tag::primitive(TagClass::Context, 30);
        assert_eq!(tag.to_bytes().as_ref(), &[0x9E]);
    }

    #[test]
    fn test_long_form() {
        let (tag, len) = Tag::parse(&hex::decode("5F20").unwrap()).unwrap();
        assert_eq!(len, 2);
        assert_eq!(tag.class(), TagClass::Application);
        assert!(!tag.is_constructed());
        assert_eq!(tag.number(), 0x20);
        assert_eq!(tag.tag_num_with_class(), 0x5F20);

        let (tag, len) = Tag::parse(&hex::decode("7F4E").unwrap()).unwrap();
        assert_eq!(len, 2);
        assert!(tag.is_constructed());
        assert_eq!(tag.number(), 0x4E);

        let tag = Tag::primitive(TagClass::Context, 31);
        assert_eq!(tag.to_bytes().as_ref(), &[0x9F, 0x1F]);

        let tag = Tag::primitive(TagClass::Private, 0x3FFF);
        assert_eq!(tag.to_bytes().as_ref(), &[0xDF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_long_form_recovers_number_and_class() {
        for number in [31u64, 127, 128, 0x4000, 1 << 35, u64::MAX - 1, u64::MAX] {
            for class in [
                TagClass::Universal,
                TagClass::Application,
                TagClass::Context,
                TagClass::Private,
            ] {
                let tag = Tag::constructed(class, number);
                let encoded = tag.to_bytes();
                assert_eq!(encoded.len(), tag.encoded_len());
                let (decoded, len) = Tag::parse(&encoded).unwrap();
                assert_eq!(len, encoded.len());
                assert_eq!(decoded, tag);
            }
        }
    }

    #[test]
    fn test_tag_overflow() {
        // 10 groups of 7 bits with a leading 0x7F exceed 64 bits
        let mut data = vec![0x1F];
        data.extend(std::iter::repeat_n(0xFF, 9));
        data.push(0x7F);
        assert_eq!(Tag::parse(&data), Err(TlvError::TagOverflow));
    }

    #[test]
    fn test_truncated_tag() {
        assert_eq!(Tag::parse(&[]), Err(TlvError::TruncatedInput));
        assert_eq!(Tag::parse(&[0x5F]), Err(TlvError::TruncatedInput));
        assert_eq!(Tag::parse(&[0x5F, 0x81]), Err(TlvError::TruncatedInput));
    }

    #[test]
    fn test_from_tag_num_with_class() {
        let tag = Tag::from_tag_num_with_class(0x7F21).unwrap();
        assert_eq!(tag, Tag::constructed(TagClass::Application, 0x21));
        let tag = Tag::from_tag_num_with_class(0x47).unwrap();
        assert_eq!(tag, Tag::primitive(TagClass::Application, 7));
        let tag = Tag::from_tag_num_with_class(0).unwrap();
        assert_eq!(tag, Tag::primitive(TagClass::Universal, 0));
    }
}
