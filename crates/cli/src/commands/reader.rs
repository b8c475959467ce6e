//! Commands about readers and the inserted card

use eidlink_apdu_core::{CardCapabilities, CardInfo, CardTransport, HistoricalBytes};
use eidlink_apdu_pace::ReaderFeatures;
use eidlink_apdu_transport_pcsc::{PcscConfig, PcscDeviceManager, PcscReader};
use std::error::Error;
use tracing::debug;

use crate::utils::display;

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> Result<(), Box<dyn Error>> {
    let readers = manager.list_readers()?;

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let mut status = match reader.atr() {
            Some(atr) => format!("card present, ATR {}", display::bytes(atr)),
            None => "no card".to_string(),
        };
        if let Some(Err(e)) = reader.card_info() {
            status.push_str(&format!(", undecodable ATR: {e}"));
        }
        if reader.is_exclusive() {
            status.push_str(", in exclusive use");
        }
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}

/// Decode the ATR of the card in `reader`
pub fn atr_command(manager: &PcscDeviceManager, reader: &PcscReader) -> Result<(), Box<dyn Error>> {
    let transport = manager.open_reader_with_config(reader.name(), PcscConfig::default())?;
    let atr = match transport.atr() {
        Some(atr) => atr.to_vec(),
        None => reader.atr().ok_or("No card in reader")?.to_vec(),
    };
    debug!(atr = %hex::encode(&atr), "Decoding ATR");

    let info = CardInfo::from_atr_bytes(&atr)?;
    let parsed = info.atr();
    let protocols = parsed
        .protocols()
        .iter()
        .map(|p| format!("T={p}"))
        .collect::<Vec<_>>()
        .join(", ");

    println!(
        "{}",
        display::key_value_box(
            "Answer to reset",
            vec![
                ("ATR", display::bytes(parsed.raw())),
                ("Protocols", protocols),
                ("Historical bytes", display::bytes(parsed.historical_bytes())),
            ],
        )
    );

    match info.historical_bytes() {
        Some(historical) => print_historical(historical),
        None => println!("{}", display::warning("No decodable historical bytes")),
    }

    match info.capabilities() {
        Some(capabilities) => print_capabilities(capabilities),
        None => println!("{}", display::warning("Card declares no capabilities")),
    }

    Ok(())
}

fn print_historical(historical: &HistoricalBytes) {
    let mut items = vec![("Category", historical.category().to_string())];

    if let Some(country) = historical.country_indicator() {
        items.push(("Country", country.country_code().to_string()));
    }
    if let Some(issuer) = historical.issuer_indicator() {
        items.push(("Issuer", issuer.issuer_identification_number().to_string()));
    }
    if let Some(service) = historical.card_service_data() {
        items.push(("Has MF", display::flag(service.has_mf())));
        items.push(("EF.DIR", display::flag(service.has_ef_dir())));
        items.push(("EF.ATR", display::flag(service.has_ef_atr())));
        items.push(("EF access", format!("{:?}", service.ef_access_method())));
    }
    if let Some(initial) = historical.initial_access_data() {
        let command = match initial.command().map(|command| command.try_to_bytes()) {
            Some(Ok(bytes)) => display::bytes(&bytes),
            Some(Err(e)) => format!("unencodable ({e})"),
            None => "-".to_string(),
        };
        items.push(("Initial access", command));
    }
    if let Some(status) = historical.status_indicator() {
        if let Some(life_cycle) = status.life_cycle() {
            items.push(("Life cycle", life_cycle.to_string()));
        }
        if let Some(sw) = status.status() {
            items.push(("Status", display::status(sw)));
        }
    }
    if let Some(reference) = historical.dir_data_reference() {
        items.push(("DIR reference", format!("{reference:02X}")));
    }
    items.push(("Storage card", display::flag(historical.is_storage_card())));

    println!("{}", display::key_value_box("Historical bytes", items));
}

fn print_capabilities(capabilities: &CardCapabilities) {
    let selection = capabilities.selection_methods();
    let mut items = vec![
        ("Selection methods", format!("{:02X}", selection.byte())),
        ("Select by DF name", display::flag(selection.select_df_by_full_name())),
        ("Select by path", display::flag(selection.select_df_by_path())),
        ("Select by file id", display::flag(selection.select_df_by_file_id())),
        ("Short EF id", display::flag(selection.supports_short_ef())),
    ];

    if let Some(coding) = capabilities.data_coding() {
        items.push(("TLV EFs", display::flag(coding.tlv_efs())));
        items.push(("Write behaviour", format!("{:?}", coding.write_behaviour())));
        items.push(("Data unit bytes", coding.data_unit_bytes().to_string()));
    }
    if let Some(coding) = capabilities.command_coding() {
        items.push(("Logical channels", coding.max_logical_channels().to_string()));
        items.push(("Channel assignment", format!("{:?}", coding.logical_channel_assignment())));
    }
    items.push(("Command chaining", display::flag(capabilities.supports_command_chaining())));
    items.push(("Extended length", display::flag(capabilities.supports_extended_length())));

    println!("{}", display::key_value_box("Card capabilities", items));
}

/// List the control features of `reader`
pub fn features_command(
    manager: &PcscDeviceManager,
    reader: &PcscReader,
) -> Result<(), Box<dyn Error>> {
    let mut transport = manager.open_reader_with_config(reader.name(), PcscConfig::direct())?;
    let features = ReaderFeatures::discover(&mut transport)?;

    if features.is_empty() {
        println!("{}", display::warning("Reader offers no control features"));
        return Ok(());
    }

    let rows = features
        .iter()
        .map(|(feature, code)| {
            (feature.to_string(), format!("{:02X} -> {code:#010x}", feature.tag()))
        })
        .collect::<Vec<_>>();
    println!(
        "{}",
        display::key_value_box(
            "Reader features",
            rows.iter().map(|(name, value)| (name.as_str(), value.clone())).collect(),
        )
    );

    Ok(())
}
