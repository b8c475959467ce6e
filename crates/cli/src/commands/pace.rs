//! Commands driving the reader's PACE implementation

use eidlink_apdu_pace::{
    CancellationToken, EstablishChannelRequest, FeatureTag, PaceConfig, PaceError, PaceFeature,
    PinId, ReaderFeatures,
};
use eidlink_apdu_transport_pcsc::{PcscConfig, PcscDeviceManager, PcscReader, PcscTransport};
use parking_lot::Mutex;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::utils::{display, parse_hex};

/// Open `reader` and look up its PACE control code
fn open_pace(
    manager: &PcscDeviceManager,
    reader: &PcscReader,
    config: PcscConfig,
    pace_config: PaceConfig,
) -> Result<PaceFeature<PcscTransport>, Box<dyn Error>> {
    let transport = manager.open_reader_with_config(reader.name(), config)?;
    let transport = Arc::new(Mutex::new(transport));

    let features = ReaderFeatures::discover(&mut *transport.lock())?;
    let code = features
        .get(FeatureTag::ExecutePace)
        .ok_or(PaceError::NotSupported)?;
    Ok(PaceFeature::with_config(transport, code, pace_config))
}

/// Show the PACE capabilities of `reader`
pub fn pace_caps_command(
    manager: &PcscDeviceManager,
    reader: &PcscReader,
) -> Result<(), Box<dyn Error>> {
    let pace = open_pace(manager, reader, PcscConfig::direct(), PaceConfig::default())?;
    let capabilities = pace.get_pace_capabilities()?;

    println!(
        "{}",
        display::key_value_box(
            "PACE capabilities",
            vec![
                ("Raw", format!("{:02X}", capabilities.bits())),
                ("Supported", capabilities.to_string()),
            ],
        )
    );

    Ok(())
}

/// Establish a PACE channel through `reader`
pub fn pace_command(
    manager: &PcscDeviceManager,
    reader: &PcscReader,
    pin_id: PinId,
    pin: Option<String>,
    chat: Option<&str>,
    timeout: u64,
) -> Result<(), Box<dyn Error>> {
    let pace_config = PaceConfig::default().with_timeout(Duration::from_secs(timeout));
    let pace = open_pace(manager, reader, PcscConfig::default(), pace_config)?;

    let mut request = EstablishChannelRequest::new(pin_id);
    if let Some(pin) = pin {
        request = request.with_pin(pin);
    } else {
        info!("Enter the password on the reader's PIN pad");
    }
    if let Some(chat) = chat {
        request = request.with_chat(parse_hex(chat)?);
    }

    // the handle is never fired here, the timeout bounds the wait
    let (token, _handle) = CancellationToken::new();
    let response = match pace.establish_channel(&request, &token) {
        Ok(response) => response,
        Err(PaceError::Result(code)) => {
            if let Some(retries) = code.retry_counter() {
                println!("{}", display::warning(&format!("{retries} attempts left")));
            }
            return Err(PaceError::Result(code).into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", display::success("PACE channel established"));
    println!(
        "{}",
        display::key_value_box(
            "Establish channel response",
            vec![
                ("MSE: Set AT", display::status(response.status)),
                ("EF.CardAccess", display::bytes(&response.ef_card_access)),
                ("Current CAR", display::bytes(response.car_current.as_deref().unwrap_or_default())),
                (
                    "Previous CAR",
                    display::bytes(response.car_previous.as_deref().unwrap_or_default()),
                ),
                ("IDicc", display::bytes(response.id_icc.as_deref().unwrap_or_default())),
            ],
        )
    );

    Ok(())
}
