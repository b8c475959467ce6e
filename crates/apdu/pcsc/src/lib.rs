//! PC/SC transport implementation for APDU operations
//!
//! This crate provides an implementation of the `CardTransport` and
//! `ControlTransport` traits from `eidlink-apdu-core` using the PC/SC API for
//! communication with smart cards and their readers.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use eidlink_apdu_core::{CardChannel, Command};
//! use eidlink_apdu_transport_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//!
//! let manager = PcscDeviceManager::new()?;
//! for reader in manager.list_readers()? {
//!     println!("{} (card: {})", reader.name(), reader.has_card());
//! }
//!
//! let transport = manager.connect_strategy(ConnectStrategy::AnyCard, PcscConfig::default())?;
//! let mut channel = CardChannel::new(transport);
//!
//! // SELECT the master file
//! let response = channel.transmit(&Command::new_with_data(0x00, 0xA4, 0x00, 0x0C, vec![0x3F, 0x00]))?;
//! println!("Status: {}", response.status());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod reader;
mod transport;
mod util;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};
