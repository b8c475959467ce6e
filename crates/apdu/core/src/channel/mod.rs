//! Card channel: command chaining, GET RESPONSE and wrong-Le handling
//!
//! A [`CardChannel`] sits between application code and a [`CardTransport`].
//! It applies the secure messaging stack, splits payloads the card cannot take
//! in one APDU, resends on `6Cxx` and collects `61xx` continuations so callers
//! only ever see a single complete [`Response`].

pub mod config;

use std::borrow::Cow;
use std::cell::OnceCell;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{Level, debug, info, warn};

pub use config::ChannelConfig;

use crate::atr::{CardCapabilities, CardInfo};
use crate::command::{ApduError, Command, SHORT_MAX};
use crate::error::Error;
use crate::response::Response;
use crate::response::status::StatusWord;
use crate::response::utils::extract_status_and_payload;
use crate::secure::{SecureMessaging, SecureMessagingStack};
use crate::transport::CardTransport;

/// APDU channel to a card
#[derive(Debug)]
pub struct CardChannel<T: CardTransport> {
    transport: T,
    capabilities: OnceCell<Option<CardCapabilities>>,
    config: ChannelConfig,
    secure: SecureMessagingStack,
}

impl<T: CardTransport> CardChannel<T> {
    /// Create a channel with the default configuration
    ///
    /// Card capabilities are derived from the transport's ATR on first use.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ChannelConfig::default())
    }

    /// Create a channel with a custom configuration
    pub fn with_config(transport: T, config: ChannelConfig) -> Self {
        Self {
            transport,
            capabilities: OnceCell::new(),
            config,
            secure: SecureMessagingStack::new(),
        }
    }

    /// Channel configuration
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Card capabilities, derived from the ATR once per session
    pub fn capabilities(&self) -> Option<&CardCapabilities> {
        self.capabilities
            .get_or_init(|| {
                let atr = self.transport.atr()?;
                match CardInfo::from_atr_bytes(&atr) {
                    Ok(info) => info.capabilities().copied(),
                    Err(e) => {
                        warn!(error = %e, atr = %hex::encode(&atr), "Failed to parse ATR");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Replace the card capabilities, e.g. with ones read from EF.ATR
    pub fn set_capabilities(&mut self, capabilities: Option<CardCapabilities>) {
        self.capabilities = OnceCell::from(capabilities);
    }

    /// Get a reference to the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take the transport, dropping the channel state
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Push a secure messaging layer
    pub fn push_secure_messaging(&mut self, layer: Box<dyn SecureMessaging>) {
        self.secure.push(layer);
    }

    /// Remove the most recently pushed secure messaging layer
    pub fn pop_secure_messaging(&mut self) -> Option<Box<dyn SecureMessaging>> {
        self.secure.pop()
    }

    /// Remove all secure messaging layers
    pub fn clear_secure_messaging(&mut self) {
        self.secure.clear();
    }

    /// Number of active secure messaging layers
    pub fn secure_messaging_depth(&self) -> usize {
        self.secure.len()
    }

    /// Reset the transport
    ///
    /// Secure messaging does not survive a reset, the stack is cleared and the
    /// capabilities are derived again from the new ATR.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.secure.clear();
        self.capabilities = OnceCell::new();
        self.transport.reset()?;
        Ok(())
    }

    /// Send raw bytes without any processing
    pub fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        Ok(self.transport.transmit_raw(command)?)
    }

    /// Transmit a command and return the complete response
    pub fn transmit(&mut self, command: &Command) -> Result<Response, Error> {
        let command = if self.secure.is_empty() {
            Cow::Borrowed(command)
        } else {
            let wrapped = self.secure.wrap_request(command.try_to_bytes()?)?;
            Cow::Owned(Command::from_bytes(&wrapped)?)
        };

        let raw = self.send(&command)?;

        let raw = if self.secure.is_empty() {
            raw
        } else {
            self.secure.unwrap_response(raw)?
        };

        let response = Response::from_bytes(&raw)?;
        log_status(command.ins, response.status());
        Ok(response)
    }

    fn send(&mut self, command: &Command) -> Result<Bytes, Error> {
        let lc = command.lc();
        let (chaining, extended) = self.capabilities().map_or((false, false), |caps| {
            (caps.supports_command_chaining(), caps.supports_extended_length())
        });

        let response = if lc > SHORT_MAX && !extended {
            if !chaining {
                debug!(lc, "Card supports neither extended length nor chaining");
                return Err(ApduError::PayloadTooLarge(lc).into());
            }
            match self.send_chain(command)? {
                Chained::Aborted(response) => return Ok(response),
                Chained::Last(last) => self.exchange(&last)?,
            }
        } else {
            self.exchange(command)?
        };

        self.collect_remaining(response)
    }

    /// Send all but the last chunk of a chained command
    fn send_chain(&mut self, command: &Command) -> Result<Chained, Error> {
        let data = command.data();
        let count = data.len().div_ceil(SHORT_MAX);
        debug!(lc = data.len(), chunks = count, "Splitting command into a chain");

        let mut chunks = data.chunks(SHORT_MAX);
        let last = chunks.next_back().unwrap_or_default();
        for chunk in chunks {
            let part = Command::new(command.cla, command.ins, command.p1, command.p2)
                .with_data(Bytes::copy_from_slice(chunk))
                .with_chaining();
            let response = self.transmit_raw(&part.try_to_bytes()?)?;
            let (status, _) = extract_status_and_payload(&response)?;
            if !status.is_success() {
                debug!(%status, "Card aborted command chain");
                return Ok(Chained::Aborted(response));
            }
        }

        let mut last_command = Command::new(command.cla, command.ins, command.p1, command.p2)
            .with_data(Bytes::copy_from_slice(last));
        last_command.le = command.le;
        Ok(Chained::Last(last_command))
    }

    /// Send a single command, resending once on a wrong Le
    fn exchange(&mut self, command: &Command) -> Result<Bytes, Error> {
        let response = self.transmit_raw(&command.try_to_bytes()?)?;
        let (status, _) = extract_status_and_payload(&response)?;

        match status.exact_length() {
            Some(le) if self.config.wrong_length_retry => {
                debug!(le, "Wrong Le, resending with the length announced by the card");
                let retry = command.clone().with_le(u16::from(le));
                self.transmit_raw(&retry.try_to_bytes()?)
            }
            _ => Ok(response),
        }
    }

    /// Fetch outstanding response bytes while the card answers 61xx
    fn collect_remaining(&mut self, response: Bytes) -> Result<Bytes, Error> {
        let (mut status, payload) = extract_status_and_payload(&response)?;
        if !status.is_more_data_available() {
            return Ok(response);
        }

        let mut data = BytesMut::from(payload);
        let mut rounds = 0;
        while let Some(remaining) = status.remaining_bytes() {
            if rounds >= self.config.max_get_response {
                warn!(rounds, "GET RESPONSE limit reached");
                return Err(Error::ChainLimitExceeded);
            }
            rounds += 1;

            debug!(remaining, round = rounds, "Fetching response continuation");
            let get_response = Command::get_response(self.config.get_response_cla, remaining);
            let next = self.transmit_raw(&get_response.try_to_bytes()?)?;
            let (next_status, next_payload) = extract_status_and_payload(&next)?;

            if data.len() + next_payload.len() > self.config.max_response_size {
                warn!(
                    size = data.len() + next_payload.len(),
                    "Accumulated response exceeds the size limit"
                );
                return Err(Error::ChainLimitExceeded);
            }
            data.extend_from_slice(next_payload);
            status = next_status;
        }

        data.put_u8(status.sw1);
        data.put_u8(status.sw2);
        Ok(data.freeze())
    }
}

enum Chained {
    Aborted(Bytes),
    Last(Command),
}

fn log_status(ins: u8, status: StatusWord) {
    let level = status.tracing_level();
    if level == Level::DEBUG {
        debug!(ins = format_args!("{ins:#04x}"), %status, "Command completed");
    } else if level == Level::INFO {
        info!(
            ins = format_args!("{ins:#04x}"),
            %status,
            description = status.description(),
            "Command completed with warning"
        );
    } else {
        warn!(
            ins = format_args!("{ins:#04x}"),
            %status,
            description = status.description(),
            "Command failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::secure::SecureMessagingError;
    use crate::secure::tests::MarkerLayer;
    use crate::transport::{MockTransport, TransportError};

    // Historical bytes declaring chaining without extended length
    const CHAINING_ATR: &str = "3B8880018073000080829000";
    // nPA style ATR declaring chaining and extended length
    const EXTENDED_ATR: &str = "3B8A80018031B8738401E082900006";

    fn chaining_atr() -> String {
        let mut atr = hex::decode(CHAINING_ATR).unwrap();
        let tck = atr[1..].iter().fold(0, |acc, b| acc ^ b);
        atr.push(tck);
        hex::encode(atr)
    }

    fn mock_channel(responses: &[&str]) -> CardChannel<MockTransport> {
        CardChannel::new(MockTransport::from_hex(responses))
    }

    #[test]
    fn test_simple_exchange() {
        let mut channel = mock_channel(&["01029000"]);
        let response = channel
            .transmit(&Command::new_with_le(0x00, 0xB0, 0x00, 0x00, 0x02))
            .unwrap();
        assert_eq!(response.data().as_ref(), &[0x01, 0x02]);
        assert!(response.is_normal_processed());
        assert_eq!(channel.transport().sent_hex(), vec!["00B0000002"]);
    }

    #[test]
    fn test_chaining_split() {
        let mut channel =
            CardChannel::new(MockTransport::from_hex(&["9000", "AABB9000"]).with_atr(&chaining_atr()));
        assert!(channel.capabilities().unwrap().supports_command_chaining());

        let command = Command::new_with_data_and_le(0x00, 0x2A, 0x9E, 0x9A, vec![0x11; 300], 0x00);
        let response = channel.transmit(&command).unwrap();
        assert_eq!(response.data().as_ref(), &[0xAA, 0xBB]);

        let sent = &channel.transport().commands;
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[0][..5], &[0x10, 0x2A, 0x9E, 0x9A, 0xFF]);
        assert_eq!(sent[0].len(), 5 + 255);
        assert_eq!(&sent[1][..5], &[0x00, 0x2A, 0x9E, 0x9A, 0x2D]);
        assert_eq!(sent[1].len(), 5 + 45 + 1);
        assert_eq!(sent[1].last(), Some(&0x00));
    }

    #[test]
    fn test_chaining_abort() {
        let mut channel =
            CardChannel::new(MockTransport::from_hex(&["6985"]).with_atr(&chaining_atr()));
        let command = Command::new_with_data(0x00, 0xDA, 0x00, 0x00, vec![0x22; 300]);
        let response = channel.transmit(&command).unwrap();
        assert_eq!(response.sw(), 0x6985);
        assert_eq!(channel.transport().commands.len(), 1);
    }

    #[test]
    fn test_payload_too_large_without_capabilities() {
        let mut channel = mock_channel(&["9000"]);
        let command = Command::new_with_data(0x00, 0xDA, 0x00, 0x00, vec![0x22; 300]);
        assert_eq!(
            channel.transmit(&command),
            Err(Error::Apdu(ApduError::PayloadTooLarge(300)))
        );
        assert!(channel.transport().commands.is_empty());
    }

    #[test]
    fn test_extended_length_sent_whole() {
        let mut channel =
            CardChannel::new(MockTransport::from_hex(&["9000"]).with_atr(EXTENDED_ATR));
        let command = Command::new_with_data(0x00, 0xDA, 0x00, 0x00, vec![0x22; 300]);
        channel.transmit(&command).unwrap();

        let sent = &channel.transport().commands;
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..7], &[0x00, 0xDA, 0x00, 0x00, 0x00, 0x01, 0x2C]);
    }

    #[test]
    fn test_wrong_le_single_retry() {
        let mut channel = mock_channel(&["6C05", "01020304059000"]);
        let response = channel
            .transmit(&Command::new_with_le(0x00, 0xCA, 0x01, 0x00, 0x00))
            .unwrap();
        assert_eq!(response.data().as_ref(), &[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(
            channel.transport().sent_hex(),
            vec!["00CA010000", "00CA010005"]
        );

        // a second 6Cxx is returned as is
        let mut channel = mock_channel(&["6C05", "6C04"]);
        let response = channel
            .transmit(&Command::new_with_le(0x00, 0xCA, 0x01, 0x00, 0x00))
            .unwrap();
        assert_eq!(response.sw(), 0x6C04);
        assert_eq!(channel.transport().commands.len(), 2);
    }

    #[test]
    fn test_wrong_le_retry_disabled() {
        let mut channel = CardChannel::with_config(
            MockTransport::from_hex(&["6C05"]),
            ChannelConfig::default().with_wrong_length_retry(false),
        );
        let response = channel
            .transmit(&Command::new_with_le(0x00, 0xCA, 0x01, 0x00, 0x00))
            .unwrap();
        assert_eq!(response.sw(), 0x6C05);
    }

    #[test]
    fn test_get_response_concatenation() {
        let first = format!("{}61FF", "AA".repeat(256));
        let second = format!("{}6105", "BB".repeat(255));
        let third = format!("{}9000", "CC".repeat(5));
        let mut channel = mock_channel(&[&first, &second, &third]);

        let response = channel
            .transmit(&Command::new_with_le(0x00, 0xB0, 0x00, 0x00, 0x00))
            .unwrap();
        assert_eq!(response.data().len(), 256 + 255 + 5);
        assert_eq!(response.data()[256], 0xBB);
        assert_eq!(response.data()[256 + 255], 0xCC);
        assert!(response.is_normal_processed());
        assert_eq!(
            channel.transport().sent_hex(),
            vec!["00B0000000", "00C00000FF", "00C0000005"]
        );
    }

    #[test]
    fn test_get_response_many_rounds_default_config() {
        let mut responses = vec![format!("{}6100", "AA".repeat(256)); 40];
        responses.push(format!("{}9000", "BB".repeat(256)));
        let responses = responses.iter().map(String::as_str).collect::<Vec<_>>();
        let mut channel = mock_channel(&responses);

        let response = channel
            .transmit(&Command::new_with_le(0x00, 0xB0, 0x00, 0x00, 0x00))
            .unwrap();
        assert!(response.is_normal_processed());
        assert_eq!(response.data().len(), 41 * 256);
        assert_eq!(response.data()[40 * 256], 0xBB);

        let sent = channel.transport().sent_hex();
        assert_eq!(sent.len(), 41);
        assert!(sent[1..].iter().all(|command| command == "00C0000000"));
    }

    #[test]
    fn test_default_bounds_agree() {
        let config = ChannelConfig::default();
        assert!(config.max_get_response * 256 >= config.max_response_size);
    }

    #[test]
    fn test_get_response_limit() {
        let mut channel = CardChannel::with_config(
            MockTransport::from_hex(&["6110", "AA6110", "BB6110"]),
            ChannelConfig::default().with_max_get_response(2),
        );
        assert_eq!(
            channel.transmit(&Command::new(0x00, 0xB0, 0x00, 0x00)),
            Err(Error::ChainLimitExceeded)
        );

        let mut channel = CardChannel::with_config(
            MockTransport::from_hex(&["AAAA6102", "BBBB9000"]),
            ChannelConfig::default().with_max_response_size(3),
        );
        assert_eq!(
            channel.transmit(&Command::new(0x00, 0xB0, 0x00, 0x00)),
            Err(Error::ChainLimitExceeded)
        );
    }

    #[test]
    fn test_get_response_cla() {
        let mut channel = CardChannel::with_config(
            MockTransport::from_hex(&["6102", "01029000"]),
            ChannelConfig::default().with_get_response_cla(0x80),
        );
        channel.transmit(&Command::new(0x80, 0xCA, 0x00, 0x00)).unwrap();
        assert_eq!(channel.transport().sent_hex()[1], "80C0000002");
    }

    #[test]
    fn test_secure_messaging_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        // the mock answers with both markers in front of the plain response
        let mut channel = mock_channel(&["A1B2019000"]);
        channel.push_secure_messaging(MarkerLayer::boxed(0xA1, &log));
        channel.push_secure_messaging(MarkerLayer::boxed(0xB2, &log));

        let response = channel
            .transmit(&Command::new_with_data(0x00, 0x22, 0x41, 0xA4, vec![0x80]))
            .unwrap();
        assert_eq!(response.data().as_ref(), &[0x01]);
        assert!(response.is_normal_processed());

        // B2 wraps first, then A1
        assert_eq!(channel.transport().sent_hex(), vec!["002241A40380B2A1"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["wrap B2", "wrap A1", "unwrap A1", "unwrap B2"]
        );
    }

    #[test]
    fn test_secure_messaging_error_keeps_stack() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut channel = mock_channel(&["FF9000"]);
        channel.push_secure_messaging(MarkerLayer::boxed(0xA1, &log));

        assert_eq!(
            channel.transmit(&Command::new(0x00, 0xB0, 0x00, 0x00)),
            Err(Error::SecureMessaging(SecureMessagingError::Mac))
        );
        assert_eq!(channel.secure_messaging_depth(), 1);
    }

    #[test]
    fn test_reset_clears_secure_messaging() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut channel = mock_channel(&[]);
        channel.push_secure_messaging(MarkerLayer::boxed(0xA1, &log));
        channel.reset().unwrap();
        assert_eq!(channel.secure_messaging_depth(), 0);
        assert!(channel.pop_secure_messaging().is_none());
    }

    #[test]
    fn test_transport_errors_propagate() {
        let mut channel = mock_channel(&[]);
        assert_eq!(
            channel.transmit(&Command::new(0x00, 0xB0, 0x00, 0x00)),
            Err(Error::Transport(TransportError::Communication))
        );

        let mut channel = mock_channel(&["90"]);
        assert_eq!(
            channel.transmit(&Command::new(0x00, 0xB0, 0x00, 0x00)),
            Err(Error::Apdu(ApduError::TruncatedApdu(1)))
        );
    }

    #[test]
    fn test_explicit_capabilities() {
        let mut channel = mock_channel(&["9000"]);
        assert!(channel.capabilities().is_none());
        channel.set_capabilities(CardCapabilities::from_function_table(&[0x00, 0x00, 0x40]));
        assert!(channel.capabilities().unwrap().supports_extended_length());

        let command = Command::new_with_data(0x00, 0xDA, 0x00, 0x00, vec![0x22; 300]);
        assert!(channel.transmit(&command).is_ok());
    }
}
