//! Configuration for card channels

/// Configuration for a [`CardChannel`](super::CardChannel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Maximum number of GET RESPONSE commands for one exchange
    pub max_get_response: usize,
    /// Maximum number of response bytes accumulated through GET RESPONSE
    pub max_response_size: usize,
    /// Class byte for GET RESPONSE commands
    pub get_response_cla: u8,
    /// Resend once with the card's Le on 6Cxx
    pub wrong_length_retry: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            // 256-byte rounds covering the size bound
            max_get_response: 257,
            // extended Ne plus the status word
            max_response_size: 65_538,
            get_response_cla: 0x00,
            wrong_length_retry: true,
        }
    }
}

impl ChannelConfig {
    /// Set the GET RESPONSE iteration bound
    pub const fn with_max_get_response(mut self, max: usize) -> Self {
        self.max_get_response = max;
        self
    }

    /// Set the accumulated response size bound
    pub const fn with_max_response_size(mut self, max: usize) -> Self {
        self.max_response_size = max;
        self
    }

    /// Set the class byte for GET RESPONSE
    pub const fn with_get_response_cla(mut self, cla: u8) -> Self {
        self.get_response_cla = cla;
        self
    }

    /// Enable or disable the wrong-Le retry
    pub const fn with_wrong_length_retry(mut self, retry: bool) -> Self {
        self.wrong_length_retry = retry;
        self
    }
}
