//! Transport traits for APDU communication with cards
//!
//! This module provides abstractions for communicating with smart cards through
//! different transport mechanisms.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

/// Trait for basic card transports
///
/// A transport is responsible for sending and receiving raw APDU bytes.
/// It has no knowledge of command structure, secure messaging, or protocol details.
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes
    ///
    /// This method should handle the low-level communication with the card
    /// but should not interpret the contents or handle protocol-specific
    /// operations like GET RESPONSE.
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Answer-to-reset of the connected card, if the transport knows it
    fn atr(&self) -> Option<Bytes> {
        None
    }
}

/// Trait for transports that can send reader control commands
///
/// Control commands address the reader itself (PC/SC part 10 features such
/// as PIN pads or PACE) rather than the card.
pub trait ControlTransport: Send + fmt::Debug {
    /// Send a control command and return the reader's answer
    fn control(&mut self, code: u32, payload: &[u8]) -> Result<Bytes, TransportError> {
        trace!(
            code = format_args!("{code:#010x}"),
            payload = %hex::encode(payload),
            "Sending control command"
        );
        let result = self.do_control(code, payload);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received control response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during control command");
            }
        }
        result
    }

    /// Internal implementation of control
    fn do_control(&mut self, code: u32, payload: &[u8]) -> Result<Bytes, TransportError>;

    /// Map a PC/SC part 10 function number to the platform control code
    fn control_code(&self, function: u32) -> u32;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }

    fn atr(&self) -> Option<Bytes> {
        (**self).atr()
    }
}

#[cfg(test)]
#[derive(Debug, Clone)]
#[allow(missing_docs, unreachable_pub)]
pub struct MockTransport {
    /// Mock responses to return, in order
    pub responses: std::collections::VecDeque<Bytes>,
    /// Commands that were sent
    pub commands: Vec<Bytes>,
    /// Whether the transport is connected
    pub connected: bool,
    /// ATR reported by the mock card
    pub atr: Option<Bytes>,
}

#[cfg(test)]
#[allow(unreachable_pub)]
impl MockTransport {
    /// Create a new mock transport returning the given responses in order
    pub fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses: responses.into(),
            commands: Vec::new(),
            connected: true,
            atr: None,
        }
    }

    /// Create a new mock transport from hex encoded responses
    pub fn from_hex(responses: &[&str]) -> Self {
        Self::new(
            responses
                .iter()
                .map(|r| Bytes::from(hex::decode(r).unwrap()))
                .collect(),
        )
    }

    /// Create a new mock transport that returns success (90 00) once
    pub fn with_success() -> Self {
        Self::new(vec![Bytes::from_static(&[0x90, 0x00])])
    }

    /// Set the ATR reported by the mock card
    pub fn with_atr(mut self, atr: &str) -> Self {
        self.atr = Some(Bytes::from(hex::decode(atr).unwrap()));
        self
    }

    /// Commands sent so far, hex encoded
    pub fn sent_hex(&self) -> Vec<String> {
        self.commands.iter().map(hex::encode_upper).collect()
    }
}

#[cfg(test)]
impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::CardRemoved);
        }

        self.commands.push(Bytes::copy_from_slice(command));

        self.responses
            .pop_front()
            .ok_or(TransportError::Communication)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        self.commands.clear();
        Ok(())
    }

    fn atr(&self) -> Option<Bytes> {
        self.atr.clone()
    }
}
