//! PC/SC transport implementation

use std::ffi::CString;
use std::fmt;

use eidlink_apdu_core::prelude::*;
use pcsc::{Attribute, Card, Context, Disposition};
use tracing::{debug, warn};

use crate::config::PcscConfig;
use crate::error::PcscError;

/// Transport implementation using PC/SC
pub struct PcscTransport {
    /// PC/SC context
    context: Context,
    /// Card connection, if established
    card: Option<Card>,
    /// Reader name
    reader_name: String,
    /// Configuration
    config: PcscConfig,
    /// Receive buffer shared by transmit and control
    buffer: Vec<u8>,
}

impl fmt::Debug for PcscTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscTransport")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PcscTransport {
    /// Create a new PC/SC transport for the specified reader
    ///
    /// A missing card is not an error, the transport connects on first use.
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<Self, PcscError> {
        let mut transport = Self {
            context,
            card: None,
            reader_name: reader_name.to_string(),
            config,
            buffer: vec![0; config.response_buffer_size],
        };

        match transport.connect_card() {
            Ok(()) | Err(PcscError::NoCard(_)) => Ok(transport),
            Err(e) => Err(e),
        }
    }

    /// Try to connect to the card
    fn connect_card(&mut self) -> Result<(), PcscError> {
        if self.card.is_some() {
            return Ok(());
        }

        let reader = CString::new(self.reader_name.as_str())
            .map_err(|_| PcscError::ReaderNotFound(self.reader_name.clone()))?;

        match self
            .context
            .connect(&reader, self.config.share_mode.into(), self.config.protocols)
        {
            Ok(card) => {
                debug!(reader = %self.reader_name, "Connected to card");
                self.card = Some(card);
                Ok(())
            }
            Err(pcsc::Error::NoSmartcard) => Err(PcscError::NoCard(self.reader_name.clone())),
            Err(pcsc::Error::UnknownReader) => {
                Err(PcscError::ReaderNotFound(self.reader_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reconnect after another application reset the card
    fn reconnect(&mut self) -> Result<(), PcscError> {
        let card = self
            .card
            .as_mut()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.clone()))?;
        card.reconnect(
            self.config.share_mode.into(),
            self.config.protocols,
            Disposition::LeaveCard,
        )?;
        debug!(reader = %self.reader_name, "Reconnected after card reset");
        Ok(())
    }

    /// Get the reader name
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Check if the transport is connected to a card
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }

    /// Active configuration
    pub const fn config(&self) -> &PcscConfig {
        &self.config
    }

    /// Run one card operation, reconnecting once if the card was reset
    fn with_card<F>(&mut self, mut op: F) -> Result<Bytes, PcscError>
    where
        F: FnMut(&Card, &mut [u8]) -> Result<Bytes, pcsc::Error>,
    {
        self.connect_card()?;

        let mut result = self.run(&mut op);
        if result == Err(pcsc::Error::ResetCard) && self.config.auto_reconnect {
            self.reconnect()?;
            result = self.run(&mut op);
        }

        result.map_err(|e| {
            if matches!(
                e,
                pcsc::Error::ResetCard | pcsc::Error::RemovedCard | pcsc::Error::NoSmartcard
            ) {
                warn!(reader = %self.reader_name, error = %e, "Lost card connection");
                self.card = None;
            }
            e.into()
        })
    }

    fn run<F>(&mut self, op: &mut F) -> Result<Bytes, pcsc::Error>
    where
        F: FnMut(&Card, &mut [u8]) -> Result<Bytes, pcsc::Error>,
    {
        let card = self.card.as_ref().ok_or(pcsc::Error::NoSmartcard)?;
        op(card, &mut self.buffer)
    }
}

impl CardTransport for PcscTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.with_card(|card, buffer| {
            card.transmit(command, buffer).map(Bytes::copy_from_slice)
        })
        .map_err(TransportError::from)
    }

    fn is_connected(&self) -> bool {
        self.card.is_some()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::ResetCard) {
                debug!(error = %e, "Failed to reset card on disconnect");
            }
        }

        self.connect_card().map_err(Into::into)
    }

    fn atr(&self) -> Option<Bytes> {
        let card = self.card.as_ref()?;
        match card.get_attribute_owned(Attribute::AtrString) {
            Ok(atr) => Some(Bytes::from(atr)),
            Err(e) => {
                debug!(error = %e, "Failed to read ATR attribute");
                None
            }
        }
    }
}

impl ControlTransport for PcscTransport {
    fn do_control(&mut self, code: u32, payload: &[u8]) -> Result<Bytes, TransportError> {
        self.with_card(|card, buffer| {
            card.control(code.into(), payload, buffer)
                .map(Bytes::copy_from_slice)
        })
        .map_err(TransportError::from)
    }

    #[allow(clippy::unnecessary_cast)]
    fn control_code(&self, function: u32) -> u32 {
        pcsc::ctl_code(function.into()) as u32
    }
}

impl Drop for PcscTransport {
    fn drop(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}
