//! Reader features and PACE for PC/SC readers
//!
//! Readers with a secure PIN pad implement PACE themselves and expose it as a
//! control command (PC/SC part 10 amendment 1). This crate discovers the
//! features a reader offers and drives the PACE control command:
//!
//! - [`ReaderFeatures`]: feature discovery through `GET_FEATURE_REQUEST`
//! - [`PaceFeature`]: capability query, cancellable channel establishment and teardown
//! - [`PaceResultCode`]: decoding of the reader's result codes
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use eidlink_apdu_core::ControlTransport;
//! # use eidlink_apdu_pace::{CancellationToken, EstablishChannelRequest, PaceError, PinId, ReaderFeatures};
//! # fn run<C: ControlTransport + 'static>(transport: C) -> Result<(), PaceError> {
//! let transport = Arc::new(parking_lot::Mutex::new(transport));
//! let features = ReaderFeatures::discover(&mut *transport.lock())?;
//! let pace = features.pace(transport).ok_or(PaceError::NotSupported)?;
//!
//! let (token, _handle) = CancellationToken::new();
//! let request = EstablishChannelRequest::new(PinId::Can).with_pin("123456");
//! let response = pace.establish_channel(&request, &token)?;
//! println!("MSE: Set AT answered {}", response.status);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod cancel;
pub mod codec;
mod config;
mod error;
mod feature;
pub mod features;
#[cfg(test)]
mod mock;
mod result;

pub use cancel::{CancelHandle, CancellationToken};
pub use codec::{
    EstablishChannelRequest, EstablishChannelResponse, PaceCapabilities, PaceCapability,
    PaceFunction, PinId,
};
pub use config::PaceConfig;
pub use error::PaceError;
pub use feature::PaceFeature;
pub use features::{FeatureTag, GET_FEATURE_REQUEST, ReaderFeatures};
pub use result::PaceResultCode;
