//! Utility functions and types for the CLI

pub mod display;
pub mod reader;

use std::error::Error;

/// Decode a hex argument, ignoring whitespace
pub fn parse_hex(input: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|e| format!("Invalid hex '{input}': {e}").into())
}
