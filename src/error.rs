//! # Joseta Error Handling
//!
//! This module defines the JosetaError enum, which represents the different error
//! types that can occur in the joseta-rs crate.

use crate::protocol::link::LinkState;
use thiserror::Error;

/// Represents the different error types that can occur in the Joseta driver.
#[derive(Debug, Error)]
pub enum JosetaError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// A byte slice did not have the length of a raw frame.
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    /// Indicates a CRC mismatch on a raw frame.
    #[error("Invalid checksum: expected {expected:#06x}, calculated {calculated:#06x}")]
    InvalidChecksum { expected: u16, calculated: u16 },

    /// A frame completed while the link machine was in a state that accepts no frames.
    #[error("Driver in bad link state: {0:?}")]
    BadLinkState(LinkState),

    /// An event code that the dispatcher does not know.
    #[error("Unknown event type {0:#04x}")]
    UnknownEvent(u8),

    /// A bounded queue rejected an item.
    #[error("Queue full: {0}")]
    QueueFull(&'static str),

    /// Stream rate outside the 7-bit payload range.
    #[error("Invalid stream rate: {0} (max 127 seconds)")]
    InvalidStreamRate(u8),

    /// Time sync offset outside the 7-bit payload range.
    #[error("Invalid sync offset: {0} (max 127)")]
    InvalidSyncOffset(u8),

    /// Data request address outside the 4-bit address range.
    #[error("Invalid device address: {0:#04x}")]
    InvalidAddress(u8),

    /// Rejected configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Indicates a nom parsing error.
    #[error("Nom error: {0}")]
    NomError(String),

    /// The driver workers have been shut down.
    #[error("Driver is not running")]
    NotRunning,
}
