use eidlink_apdu_transport_pcsc::{PcscDeviceManager, PcscReader};
use std::error::Error;

/// Find a reader with a specific name
pub fn find_reader_by_name(
    manager: &PcscDeviceManager,
    reader_name: &str,
) -> Result<PcscReader, Box<dyn Error>> {
    let readers = manager.list_readers()?;

    readers
        .into_iter()
        .find(|r| r.name() == reader_name)
        .ok_or_else(|| format!("Reader '{reader_name}' not found").into())
}

/// Find a reader with a card inserted
pub fn find_reader_with_card(manager: &PcscDeviceManager) -> Result<PcscReader, Box<dyn Error>> {
    manager
        .list_readers()?
        .into_iter()
        .find(PcscReader::has_card)
        .ok_or_else(|| "No card found in any reader!".into())
}

/// Pick the reader a command runs against
///
/// A named reader is used as is, otherwise the first reader with a card or,
/// when no card is needed, the first reader.
pub fn select_reader(
    manager: &PcscDeviceManager,
    name: Option<&str>,
    require_card: bool,
) -> Result<PcscReader, Box<dyn Error>> {
    match name {
        Some(name) => find_reader_by_name(manager, name),
        None if require_card => find_reader_with_card(manager),
        None => manager
            .list_readers()?
            .into_iter()
            .next()
            .ok_or_else(|| "No readers found!".into()),
    }
}
