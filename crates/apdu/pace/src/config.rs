//! Configuration for PACE operations

use std::time::Duration;

/// Configuration for a [`PaceFeature`](crate::PaceFeature)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceConfig {
    /// How long to wait for EstablishPaceChannel, including user PIN entry
    pub timeout: Duration,
}

impl Default for PaceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }
}

impl PaceConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the establishment timeout
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
