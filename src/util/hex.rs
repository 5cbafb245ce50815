//! # Hex Helpers
//!
//! Hex formatting for raw frame dumps in the logs and hex parsing for offline captures
//! fed to the CLI decoder.
//!
//! ```rust
//! use joseta_rs::util::hex::{decode_hex, format_hex_compact};
//!
//! let bytes = decode_hex("FF 03 FD 08").unwrap();
//! assert_eq!(format_hex_compact(&bytes), "ff 03 fd 08");
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Lowercase hex without separators.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decodes hex, ignoring whitespace.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    decode_cleaned(&cleaned)
}

/// Decodes a capture that may use `:`, `-` or `,` between bytes, as serial terminal
/// logs often do.
pub fn decode_capture(input: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ':' | '-' | ','))
        .collect();
    decode_cleaned(&cleaned)
}

fn decode_cleaned(cleaned: &str) -> Result<Vec<u8>, HexError> {
    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }
    hex::decode(cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Hex dump with offsets, one `bytes_per_line` chunk per line.
pub fn pretty_hex(data: &[u8], bytes_per_line: usize) -> String {
    let width = bytes_per_line.max(1);
    data.chunks(width)
        .enumerate()
        .map(|(i, chunk)| format!("{:04x}: {}", i * width, format_hex_compact(chunk)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats data as "ff 03 fd" for log lines.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
