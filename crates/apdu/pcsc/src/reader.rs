//! Reader snapshots taken while listing

use eidlink_apdu_core::CardInfo;
use eidlink_apdu_core::atr::AtrError;
use pcsc::{ReaderState, State};

/// A reader as seen by the last status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcscReader {
    name: String,
    atr: Option<Vec<u8>>,
    /// Another application holds the card exclusively
    exclusive: bool,
}

impl PcscReader {
    /// Snapshot of a reader, `atr` set when a card is present
    pub const fn new(name: String, atr: Option<Vec<u8>>) -> Self {
        Self {
            name,
            atr,
            exclusive: false,
        }
    }

    /// Reader name as reported by the resource manager
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a card was present
    pub const fn has_card(&self) -> bool {
        self.atr.is_some()
    }

    /// Raw ATR of the present card
    pub fn atr(&self) -> Option<&[u8]> {
        self.atr.as_deref()
    }

    /// Whether another application had the card in exclusive use
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Parsed ATR and historical bytes of the present card
    pub fn card_info(&self) -> Option<Result<CardInfo, AtrError>> {
        self.atr.as_deref().map(CardInfo::from_atr_bytes)
    }

    pub(crate) fn from_reader_state(reader_state: &ReaderState) -> Self {
        let state = reader_state.event_state();
        let present = state.contains(State::PRESENT) && !state.contains(State::EMPTY);

        Self {
            name: reader_state.name().to_string_lossy().into_owned(),
            atr: present.then(|| reader_state.atr().to_vec()),
            exclusive: state.contains(State::EXCLUSIVE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_without_card() {
        let reader = PcscReader::new("Reader 0".into(), None);
        assert!(!reader.has_card());
        assert!(reader.card_info().is_none());
        assert!(!reader.is_exclusive());
    }

    #[test]
    fn test_reader_card_info() {
        let atr = hex::decode("3B8A80018031B8738401E082900006").unwrap();
        let reader = PcscReader::new("Reader 1".into(), Some(atr.clone()));
        assert!(reader.has_card());
        assert_eq!(reader.atr(), Some(&atr[..]));
        let info = reader.card_info().unwrap().unwrap();
        assert_eq!(info.atr().raw().as_ref(), &atr[..]);
        assert!(info.capabilities().unwrap().supports_extended_length());
    }
}
