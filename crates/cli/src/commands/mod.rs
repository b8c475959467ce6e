//! Command handlers

mod apdu;
mod pace;
mod reader;

pub use apdu::*;
pub use pace::*;
pub use reader::*;
