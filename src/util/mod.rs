//! # Utility Modules
//!
//! Hex helpers for frame dumps and captures, and rate-limited logging.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact, pretty_hex, HexError};
pub use logging::{log_frame_hex, LogThrottle};
