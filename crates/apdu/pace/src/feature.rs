//! PACE executed by the reader
//!
//! The reader runs the whole protocol with the card after a single control
//! command. Establishment can take as long as the user needs to enter a PIN on
//! the reader, so it runs on a worker thread that the caller can abandon.

use std::fmt;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use crossbeam_channel::{SendError, bounded, select};
use eidlink_apdu_core::{ControlTransport, TransportError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::codec::{
    EstablishChannelRequest, EstablishChannelResponse, PaceCapabilities, PaceFunction,
    decode_response,
};
use crate::config::PaceConfig;
use crate::error::PaceError;

/// PACE control command of one reader
pub struct PaceFeature<C> {
    transport: Arc<Mutex<C>>,
    control_code: u32,
    config: PaceConfig,
}

impl<C> fmt::Debug for PaceFeature<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaceFeature")
            .field("control_code", &format_args!("{:#010x}", self.control_code))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C> PaceFeature<C>
where
    C: ControlTransport + 'static,
{
    /// Create from a shared transport and the EXECUTE_PACE control code
    pub fn new(transport: Arc<Mutex<C>>, control_code: u32) -> Self {
        Self::with_config(transport, control_code, PaceConfig::default())
    }

    /// Create with a custom configuration
    pub const fn with_config(transport: Arc<Mutex<C>>, control_code: u32, config: PaceConfig) -> Self {
        Self {
            transport,
            control_code,
            config,
        }
    }

    /// EXECUTE_PACE control code
    pub const fn control_code(&self) -> u32 {
        self.control_code
    }

    /// Active configuration
    pub const fn config(&self) -> &PaceConfig {
        &self.config
    }

    /// PACE variants the reader implements
    pub fn get_pace_capabilities(&self) -> Result<PaceCapabilities, PaceError> {
        let data = self.execute(PaceFunction::GetReaderPaceCapabilities)?;
        let capabilities = PaceCapabilities::decode(&data)?;
        debug!(%capabilities, "Reader PACE capabilities");
        Ok(capabilities)
    }

    /// Run PACE with the card
    ///
    /// Returns [`PaceError::Cancelled`] when `cancel` fires and
    /// [`PaceError::Timeout`] when the configured timeout passes first. The
    /// reader's late answer is discarded in both cases. The transport stays
    /// locked until the reader answers.
    pub fn establish_channel(
        &self,
        request: &EstablishChannelRequest,
        cancel: &CancellationToken,
    ) -> Result<EstablishChannelResponse, PaceError> {
        if cancel.is_cancelled() {
            return Err(PaceError::Cancelled);
        }

        let capabilities = self.get_pace_capabilities()?;
        let payload = request.to_request(capabilities)?;
        debug!(pin_id = ?request.pin_id, "Establishing PACE channel");

        // rendezvous: a send only succeeds while the caller still waits
        let (sender, receiver) = bounded(0);
        let transport = Arc::clone(&self.transport);
        let code = self.control_code;
        thread::Builder::new()
            .name("pace-establish".into())
            .spawn(move || {
                let mut transport = transport.lock();
                let result = transport.control(code, &payload);
                if let Err(SendError(Ok(response))) = sender.send(result) {
                    close_abandoned_channel(&mut *transport, code, &response);
                }
            })
            .map_err(|e| TransportError::other(format!("Failed to start PACE worker: {e}")))?;

        select! {
            recv(receiver) -> result => {
                let response = result
                    .map_err(|_| TransportError::other("PACE worker terminated without an answer"))??;
                let data = decode_response(&response)?;
                let response = EstablishChannelResponse::decode(&data)?;
                debug!(status = %response.status, "PACE channel established");
                Ok(response)
            }
            recv(cancel.receiver()) -> _ => {
                debug!("PACE establishment cancelled");
                Err(PaceError::Cancelled)
            }
            default(self.config.timeout) => {
                warn!(timeout = ?self.config.timeout, "PACE establishment timed out");
                Err(PaceError::Timeout)
            }
        }
    }

    /// Tear down the channel the reader established
    pub fn destroy_channel(&self) -> Result<(), PaceError> {
        let data = self.execute(PaceFunction::DestroyPaceChannel)?;
        if !data.is_empty() {
            debug!(data = %hex::encode(&data), "Ignoring DestroyPaceChannel output");
        }
        Ok(())
    }

    fn execute(&self, function: PaceFunction) -> Result<Bytes, PaceError> {
        let request = function.request(&[])?;
        let response = self.transport.lock().control(self.control_code, &request)?;
        decode_response(&response)
    }
}

/// Destroy a channel the reader established after the caller gave up on it
fn close_abandoned_channel<C: ControlTransport + ?Sized>(transport: &mut C, code: u32, response: &[u8]) {
    if decode_response(response).is_err() {
        return;
    }
    debug!("Destroying PACE channel established after cancel or timeout");

    let destroyed = PaceFunction::DestroyPaceChannel
        .request(&[])
        .and_then(|request| transport.control(code, &request).map_err(PaceError::from))
        .and_then(|response| decode_response(&response));
    if let Err(e) = destroyed {
        warn!(error = %e, "Failed to destroy abandoned PACE channel");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eidlink_apdu_core::StatusWord;

    use super::*;
    use crate::codec::PinId;
    use crate::mock::MockControl;
    use crate::result::PaceResultCode;

    const PACE_CODE: u32 = 0x4233_002A;

    fn pace_with(responses: &[&str]) -> (PaceFeature<MockControl>, Arc<Mutex<MockControl>>) {
        let mut mock = MockControl::new();
        for response in responses {
            mock.push_response(response);
        }
        let transport = Arc::new(Mutex::new(mock));
        (PaceFeature::new(Arc::clone(&transport), PACE_CODE), transport)
    }

    fn sent(transport: &Arc<Mutex<MockControl>>) -> Vec<String> {
        transport
            .lock()
            .calls
            .iter()
            .map(|(code, payload)| {
                assert_eq!(*code, PACE_CODE);
                hex::encode_upper(payload)
            })
            .collect()
    }

    #[test]
    fn test_get_pace_capabilities() {
        let (pace, transport) = pace_with(&["00000000020001E0"]);
        let caps = pace.get_pace_capabilities().unwrap();
        assert_eq!(caps.bits(), 0xE0);
        assert_eq!(sent(&transport), vec!["010000"]);
    }

    #[test]
    fn test_establish_channel() {
        let (pace, transport) = pace_with(&[
            "00000000010040",
            // status 9000, EF.CardAccess 3100, no CARs, IDicc AB
            concat!("000000000B00", "0090", "0200", "3100", "00", "00", "0100", "AB"),
        ]);

        let (token, _handle) = CancellationToken::new();
        let request = EstablishChannelRequest::new(PinId::Can).with_pin("123456");
        let response = pace.establish_channel(&request, &token).unwrap();

        assert_eq!(response.status, StatusWord::new(0x90, 0x00));
        assert_eq!(response.ef_card_access.as_ref(), &[0x31, 0x00]);
        assert_eq!(response.car_current, None);
        assert_eq!(response.car_previous, None);
        assert_eq!(response.id_icc.as_deref(), Some(&[0xAB][..]));

        // generic PACE only, so no certificate description
        assert_eq!(sent(&transport), vec!["010000", "020900020006313233343536"]);
    }

    #[test]
    fn test_establish_channel_includes_cert_for_eid() {
        let (pace, transport) = pace_with(&["00000000010020", "0000000002000090"]);
        let (token, _handle) = CancellationToken::new();
        let request = EstablishChannelRequest::new(PinId::Pin);
        let response = pace.establish_channel(&request, &token).unwrap();
        assert_eq!(response.ef_card_access.len(), 0);
        assert_eq!(sent(&transport), vec!["010000", "0205000300000000"]);
    }

    #[test]
    fn test_establish_channel_card_error() {
        let (pace, _transport) = pace_with(&["00000000010040", "130002F00000"]);
        let (token, _handle) = CancellationToken::new();
        let err = pace
            .establish_channel(&EstablishChannelRequest::new(PinId::Can), &token)
            .unwrap_err();
        assert_eq!(
            err,
            PaceError::Result(PaceResultCode::MseSetAt(StatusWord::from_u16(0x0013)))
        );
    }

    #[test]
    fn test_establish_channel_cancelled() {
        let (pace, transport) = pace_with(&["00000000010040", "0000000002000090"]);
        transport.lock().establish_delay = Some(Duration::from_millis(500));
        let (token, handle) = CancellationToken::new();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.cancel();
        });
        let err = pace
            .establish_channel(&EstablishChannelRequest::new(PinId::Can), &token)
            .unwrap_err();
        canceller.join().unwrap();
        assert_eq!(err, PaceError::Cancelled);
    }

    fn wait_for_calls(transport: &Arc<Mutex<MockControl>>, count: usize) -> Vec<String> {
        for _ in 0..100 {
            if transport.lock().calls.len() >= count {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        sent(transport)
    }

    #[test]
    fn test_cancelled_establish_destroys_late_channel() {
        let (pace, transport) = pace_with(&["00000000010040", "0000000002000090", "000000000000"]);
        transport.lock().establish_delay = Some(Duration::from_millis(200));
        let (token, handle) = CancellationToken::new();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.cancel();
        });
        let err = pace
            .establish_channel(&EstablishChannelRequest::new(PinId::Can), &token)
            .unwrap_err();
        canceller.join().unwrap();
        assert_eq!(err, PaceError::Cancelled);

        assert_eq!(
            wait_for_calls(&transport, 3),
            vec!["010000", "020300020000", "030000"]
        );
        assert!(transport.lock().responses.is_empty());
    }

    #[test]
    fn test_timed_out_failed_establish_sends_no_destroy() {
        let mut mock = MockControl::new();
        mock.push_response("00000000010040");
        mock.push_response("130002F00000");
        mock.establish_delay = Some(Duration::from_millis(200));
        let transport = Arc::new(Mutex::new(mock));
        let pace = PaceFeature::with_config(
            Arc::clone(&transport),
            PACE_CODE,
            PaceConfig::default().with_timeout(Duration::from_millis(50)),
        );

        let (token, _handle) = CancellationToken::new();
        let err = pace
            .establish_channel(&EstablishChannelRequest::new(PinId::Can), &token)
            .unwrap_err();
        assert_eq!(err, PaceError::Timeout);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(sent(&transport), vec!["010000", "020300020000"]);
    }

    #[test]
    fn test_establish_channel_cancelled_before_start() {
        let (pace, transport) = pace_with(&[]);
        let (token, handle) = CancellationToken::new();
        handle.cancel();
        let err = pace
            .establish_channel(&EstablishChannelRequest::new(PinId::Can), &token)
            .unwrap_err();
        assert_eq!(err, PaceError::Cancelled);
        assert!(transport.lock().calls.is_empty());
    }

    #[test]
    fn test_establish_channel_timeout() {
        let mut mock = MockControl::new();
        mock.push_response("00000000010040");
        mock.push_response("0000000002000090");
        mock.establish_delay = Some(Duration::from_millis(500));
        let transport = Arc::new(Mutex::new(mock));
        let pace = PaceFeature::with_config(
            transport,
            PACE_CODE,
            PaceConfig::default().with_timeout(Duration::from_millis(50)),
        );

        let (token, _handle) = CancellationToken::new();
        let err = pace
            .establish_channel(&EstablishChannelRequest::new(PinId::Can), &token)
            .unwrap_err();
        assert_eq!(err, PaceError::Timeout);
    }

    #[test]
    fn test_establish_channel_transport_error() {
        let (pace, transport) = pace_with(&["00000000010040"]);
        transport.lock().push_error(TransportError::CardRemoved);
        let (token, _handle) = CancellationToken::new();
        let err = pace
            .establish_channel(&EstablishChannelRequest::new(PinId::Can), &token)
            .unwrap_err();
        assert_eq!(err, PaceError::Transport(TransportError::CardRemoved));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_destroy_channel() {
        let (pace, transport) = pace_with(&["000000000000", "010020F00000"]);
        pace.destroy_channel().unwrap();
        assert_eq!(
            pace.destroy_channel(),
            Err(PaceError::Result(PaceResultCode::Abort))
        );
        assert_eq!(sent(&transport), vec!["030000", "030000"]);
    }
}
