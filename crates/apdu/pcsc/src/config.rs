//! Configuration options for PC/SC transport

use pcsc::{Protocols as PcscProtocols, ShareMode as PcscShareMode};

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card (default)
    Shared,
    /// Direct connection to the reader, works without a card
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// Strategy for connecting to a card/reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// Connect to a specific reader by name
    Reader(String),

    /// Connect to any reader with a card
    AnyCard,

    /// Connect to the reader whose card ATR matches `atr` under the optional `mask`
    CardWithAtr {
        /// ATR prefix to look for
        atr: Vec<u8>,
        /// Bits of the ATR to compare
        mask: Option<Vec<u8>>,
    },

    /// Connect to the first available reader
    FirstAvailable,
}

/// Configuration options for PC/SC transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcscConfig {
    /// Sharing mode for card connections
    pub share_mode: ShareMode,

    /// Preferred protocols for card communication
    pub protocols: PcscProtocols,

    /// Reconnect once and resend when the card was reset by another application
    pub auto_reconnect: bool,

    /// Receive buffer size for responses and control answers
    pub response_buffer_size: usize,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            protocols: PcscProtocols::ANY,
            auto_reconnect: true,
            response_buffer_size: pcsc::MAX_BUFFER_SIZE_EXTENDED,
        }
    }
}

impl PcscConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for talking to the reader itself, card or not
    pub fn direct() -> Self {
        Self::default()
            .with_share_mode(ShareMode::Direct)
            .with_protocols(PcscProtocols::UNDEFINED)
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: PcscProtocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set whether to automatically reconnect
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Set the receive buffer size
    pub const fn with_response_buffer_size(mut self, size: usize) -> Self {
        self.response_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PcscConfig::new();
        assert_eq!(config.share_mode, ShareMode::Shared);
        assert_eq!(config.protocols, PcscProtocols::ANY);
        assert!(config.auto_reconnect);
        assert_eq!(config.response_buffer_size, pcsc::MAX_BUFFER_SIZE_EXTENDED);
    }

    #[test]
    fn test_direct() {
        let config = PcscConfig::direct().with_auto_reconnect(false);
        assert_eq!(config.share_mode, ShareMode::Direct);
        assert_eq!(config.protocols, PcscProtocols::UNDEFINED);
        assert!(!config.auto_reconnect);
    }
}
