//! # joseta-rs - A Rust Crate for the Joseta Energy Sensor Serial Link
//!
//! The joseta-rs crate drives a Joseta energy-monitoring board over a UART. The board
//! streams escape-coded, CRC-protected 15-byte measurement frames (occupancy, relay
//! state, voltage, current, phase, temperature, timestamp, error code) and accepts
//! 3-byte commands.
//!
//! ## Features
//!
//! - Byte-at-a-time de-framing with escape handling and resynchronisation on every start byte
//! - CRC-16 validation and decoding of raw frames into timestamped records
//! - The reset handshake: reset, epoch capture, time sync and enable-streaming
//! - Bounded byte, record and event queues with configurable overflow policy
//! - A tick-driven scheduler with clock-drift compensation and a daily reset request
//! - Record delivery through a single callback filtered by a capability mask
//! - Serial port glue built on `tokio-serial` and a command-line monitor
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! joseta-rs = "0.1.0"
//! ```
//!
//! ```rust
//! use joseta_rs::{
//!     Driver, DriverConfig, DriverHandle, CallbackMask, CallbackKind, ParsedRecord,
//!     RawFrame, JosetaError, init_logger,
//! };
//! ```

pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod logging;
pub mod mock;
pub mod protocol;
pub mod serial;
pub mod util;

pub use crate::config::DriverConfig;
pub use crate::error::JosetaError;
pub use crate::logging::{init_logger, log_debug, log_error, log_info, log_warn};

pub use driver::{CallbackKind, CallbackMask, Driver, DriverHandle, DriverSnapshot, DriverStats};
pub use protocol::{Command, Deframer, LinkState, ParsedRecord, RawFrame};
pub use serial::{SerialConfig, SerialLink};
