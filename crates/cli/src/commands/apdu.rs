//! Raw command exchange

use eidlink_apdu_core::{CardChannel, Command, ResultExt};
use eidlink_apdu_transport_pcsc::{PcscConfig, PcscDeviceManager, PcscReader};
use std::error::Error;
use tracing::debug;

use crate::utils::{display, parse_hex};

/// Send one command APDU through a card channel
pub fn send_command(
    manager: &PcscDeviceManager,
    reader: &PcscReader,
    apdu: &str,
) -> Result<(), Box<dyn Error>> {
    let command = Command::from_bytes(&parse_hex(apdu)?).context("Invalid command APDU")?;
    let transport = manager.open_reader_with_config(reader.name(), PcscConfig::default())?;
    let mut channel = CardChannel::new(transport);
    debug!(capabilities = ?channel.capabilities(), "Card channel ready");

    let response = channel.transmit(&command)?;

    println!(
        "{}",
        display::key_value_box(
            "Response",
            vec![
                ("Data", display::bytes(response.data())),
                ("Status", display::status(response.status())),
            ],
        )
    );

    Ok(())
}
