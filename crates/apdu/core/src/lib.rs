//! Core traits and types for smart card communication
//!
//! This crate provides the foundational types and traits for working with smart card
//! APDU commands and responses according to ISO/IEC 7816-3 and 7816-4.
//!
//! ## Overview
//!
//! - [`tlv`]: BER-TLV, compact-TLV and simple-TLV codecs over one tree model
//! - [`command`] and [`response`]: APDU values with short and extended length encodings
//! - [`atr`]: answer-to-reset parsing and the card capabilities it declares
//! - [`transport`]: raw transmit and reader control primitives
//! - [`channel`]: command chaining, GET RESPONSE and wrong-Le handling on top of a transport
//! - [`secure`]: the secure messaging layer stack applied by the channel
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod atr;
pub mod channel;
pub mod command;
pub mod error;
pub mod response;
pub mod secure;
pub mod tlv;
pub mod transport;

pub use atr::{Atr, CardCapabilities, CardInfo, HistoricalBytes};
pub use channel::{CardChannel, ChannelConfig};
pub use command::{ApduError, Command};
pub use error::{Error, ResultExt};
pub use response::Response;
pub use response::status::StatusWord;
pub use secure::{SecureMessaging, SecureMessagingError, SecureMessagingStack};
pub use tlv::{Tag, TagClass, Tlv, TlvDecode, TlvError, TlvForest, TlvSliceExt};
pub use transport::{CardTransport, ControlTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    // Core types
    pub use crate::{Bytes, BytesMut, Error, ResultExt};

    // APDU
    pub use crate::Command;
    pub use crate::Response;
    pub use crate::response::status::{StatusWord, common as status};

    // TLV
    pub use crate::tlv::{Tag, TagClass, Tlv, TlvDecode, TlvSliceExt};

    // Card description
    pub use crate::atr::{Atr, CardCapabilities, CardInfo};

    // Transport layer
    pub use crate::transport::{CardTransport, ControlTransport, TransportError};

    // Channel and secure messaging
    pub use crate::channel::{CardChannel, ChannelConfig};
    pub use crate::secure::{SecureMessaging, SecureMessagingError};
}
