//! Common test utilities

use eidlink_apdu_transport_pcsc::{PcscConfig, PcscDeviceManager, PcscTransport};

/// Try to get a real PC/SC manager for tests
pub fn get_manager() -> Option<PcscDeviceManager> {
    PcscDeviceManager::new().ok()
}

/// Try to get the name of a reader with a card for tests
pub fn get_reader_with_card() -> Option<String> {
    get_manager()?
        .list_readers()
        .ok()?
        .into_iter()
        .find(|reader| reader.has_card())
        .map(|reader| reader.name().to_string())
}

/// Try to get a real transport for tests
pub fn get_test_transport() -> Option<PcscTransport> {
    let manager = get_manager()?;
    let reader_name = get_reader_with_card()?;
    manager
        .open_reader_with_config(&reader_name, PcscConfig::default())
        .ok()
}
