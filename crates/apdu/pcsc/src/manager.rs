//! Device manager for PC/SC operations

use pcsc::{Context, ReaderState, Scope, State};
use tracing::debug;

use crate::config::{ConnectStrategy, PcscConfig};
use crate::error::PcscError;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;
use crate::util::match_atr;

/// Manager for PC/SC device operations
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
}

impl std::fmt::Debug for PcscDeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscDeviceManager").finish_non_exhaustive()
    }
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = match self.context.list_readers_owned() {
            Ok(readers) if !readers.is_empty() => readers,
            Ok(_) | Err(pcsc::Error::NoReadersAvailable) => {
                return Err(PcscError::NoReadersAvailable);
            }
            Err(e) => return Err(e.into()),
        };

        let mut states: Vec<_> = readers
            .into_iter()
            .map(|name| ReaderState::new(name, State::UNAWARE))
            .collect();

        match self.context.get_status_change(None, &mut states) {
            Ok(()) => Ok(states.iter().map(PcscReader::from_reader_state).collect()),
            Err(e) => {
                // no status, report every reader as empty
                debug!(error = %e, "Failed to query reader states");
                Ok(states
                    .iter()
                    .map(|state| {
                        PcscReader::new(state.name().to_string_lossy().into_owned(), None)
                    })
                    .collect())
            }
        }
    }

    /// Open a connection to a specific reader
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTransport, PcscError> {
        self.open_reader_with_config(reader_name, PcscConfig::default())
    }

    /// Open a connection to a specific reader with custom configuration
    pub fn open_reader_with_config(
        &self,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        PcscTransport::new(self.context.clone(), reader_name, config)
    }

    /// Connect to a reader using the specified strategy
    pub fn connect_strategy(
        &self,
        strategy: ConnectStrategy,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        let reader = match strategy {
            ConnectStrategy::Reader(name) => return self.open_reader_with_config(&name, config),
            ConnectStrategy::AnyCard => self
                .list_readers()?
                .into_iter()
                .find(PcscReader::has_card)
                .ok_or_else(|| PcscError::NoCard("no reader with a card".to_string()))?,
            ConnectStrategy::CardWithAtr { atr, mask } => self
                .list_readers()?
                .into_iter()
                .find(|reader| {
                    reader
                        .atr()
                        .is_some_and(|card_atr| match_atr(card_atr, &atr, mask.as_deref()))
                })
                .ok_or_else(|| PcscError::NoCard("no card with a matching ATR".to_string()))?,
            ConnectStrategy::FirstAvailable => self
                .list_readers()?
                .into_iter()
                .next()
                .ok_or(PcscError::NoReadersAvailable)?,
        };

        debug!(reader = reader.name(), "Selected reader");
        self.open_reader_with_config(reader.name(), config)
    }
}
