//! Utility functions for PC/SC operations

/// Match an ATR against a prefix pattern with an optional mask
///
/// If a mask is provided, only the bits set in the mask are compared.
pub(crate) fn match_atr(atr: &[u8], pattern: &[u8], mask: Option<&[u8]>) -> bool {
    if pattern.len() > atr.len() {
        return false;
    }

    match mask {
        Some(mask) if mask.len() < pattern.len() => false,
        Some(mask) => atr
            .iter()
            .zip(pattern)
            .zip(mask)
            .all(|((a, p), m)| a & m == p & m),
        None => atr.starts_with(pattern),
    }
}
