//! BER length field reader and writer

use bytes::{BufMut, BytesMut};

use super::error::TlvError;

/// Marker octet of the indefinite length form
const INDEFINITE: u8 = 0x80;

/// Largest number of length octets accepted in the long form
const MAX_LENGTH_OCTETS: usize = 4;

/// Decoded BER length field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Definite length with the number of value octets
    Definite(usize),
    /// Indefinite length, value terminated by end-of-contents octets
    Indefinite,
}

/// Parse a BER length field, returning the length and the number of octets read
pub fn parse(data: &[u8]) -> Result<(Length, usize), TlvError> {
    let first = *data.first().ok_or(TlvError::TruncatedInput)?;

    if first & 0x80 == 0 {
        return Ok((Length::Definite(usize::from(first)), 1));
    }
    if first == INDEFINITE {
        return Ok((Length::Indefinite, 1));
    }

    let count = usize::from(first & 0x7F);
    if count > MAX_LENGTH_OCTETS {
        return Err(TlvError::LengthOverflow(count));
    }
    let octets = data.get(1..1 + count).ok_or(TlvError::TruncatedInput)?;
    let value = octets
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));

    Ok((Length::Definite(value), 1 + count))
}

/// Terminator of an indefinite length value
pub const END_OF_CONTENTS: [u8; 2] = [0x00, 0x00];

/// Number of octets the minimal encoding of `len` occupies
pub const fn encoded_len(len: usize) -> usize {
    if len <= 0x7F {
        1
    } else {
        let bytes = (usize::BITS - len.leading_zeros()).div_ceil(8);
        1 + bytes as usize
    }
}

/// Write the minimal definite encoding of `len`
pub fn encode_into(len: usize, buf: &mut BytesMut) {
    if len <= 0x7F {
        buf.put_u8(len as u8);
        return;
    }

    let count = encoded_len(len) - 1;
    buf.put_u8(0x80 | count as u8);
    for i in (0..count).rev() {
        buf.put_u8((len >> (8 * i)) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(len: usize) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_into(len, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_short_and_long_boundary() {
        assert_eq!(encode(127), vec![0x7F]);
        assert_eq!(encode(128), vec![0x81, 0x80]);
        assert_eq!(encode(0x1234), vec![0x82, 0x12, 0x34]);

        assert_eq!(parse(&[0x7F]).unwrap(), (Length::Definite(127), 1));
        assert_eq!(parse(&[0x81, 0x80]).unwrap(), (Length::Definite(128), 2));
        assert_eq!(
            parse(&[0x82, 0x12, 0x34]).unwrap(),
            (Length::Definite(0x1234), 3)
        );
    }

    #[test]
    fn test_indefinite() {
        assert_eq!(parse(&[0x80]).unwrap(), (Length::Indefinite, 1));
    }

    #[test]
    fn test_invalid_lengths() {
        assert_eq!(parse(&[]), Err(TlvError::TruncatedInput));
        assert_eq!(parse(&[0x82, 0x01]), Err(TlvError::TruncatedInput));
        assert_eq!(parse(&[0x85, 0, 0, 0, 0, 1]), Err(TlvError::LengthOverflow(5)));
    }
}
