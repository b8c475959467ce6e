//! Display utilities for the CLI

use colored::Colorize;
use eidlink_apdu_core::StatusWord;

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format a key-value section
pub fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}

/// Format a status word with its meaning, colored by outcome
pub fn status(status: StatusWord) -> String {
    let text = format!("{status} ({})", status.description());
    if status.is_success() {
        text.green().to_string()
    } else if status.is_warning() {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

/// Format a yes/no flag
pub fn flag(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

/// Format bytes as upper case hex, `-` when empty
pub fn bytes(data: &[u8]) -> String {
    if data.is_empty() {
        "-".to_string()
    } else {
        hex::encode_upper(data)
    }
}
