//! # Outbound Commands
//!
//! Commands to the board are three bytes, unescaped:
//!
//! ```text
//! byte0 = type << 4
//! byte1 = payload
//! byte2 = 0xFF - ((byte0 + byte1) & 0xFF)
//! ```
//!
//! Bytes go out one at a time through a blocking [`ByteSink`].

use crate::constants::{
    JOSETA_BROADCAST_ADDRESS, JOSETA_CMD_CONTROL, JOSETA_CMD_DATA_REQUEST, JOSETA_CMD_STREAM,
    JOSETA_COMMAND_SIZE, JOSETA_MAX_STREAM_RATE, JOSETA_MAX_SYNC_OFFSET, JOSETA_STREAM_ENABLE,
    JOSETA_SYNC_FLAG,
};
use crate::error::JosetaError;

/// Blocking single-byte transmit primitive.
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8) -> Result<(), JosetaError>;
}

impl ByteSink for Box<dyn ByteSink + Send> {
    fn write_byte(&mut self, byte: u8) -> Result<(), JosetaError> {
        (**self).write_byte(byte)
    }
}

/// Every command the board understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset the board; it answers with a handshake frame.
    Reset,
    /// Sync the board clock to `offset` seconds past the epoch.
    SyncTime(u8),
    /// Ask the board at `address` (4 bits) for buffered frames.
    DataRequest(u8),
    /// Start streaming at the current rate.
    EnableStreaming,
    DisableStreaming,
    /// Start streaming with one frame every `seconds` (<= 127).
    StreamRate(u8),
}

impl Command {
    /// Broadcast request for one minute of frames.
    pub fn request_minute() -> Self {
        Command::DataRequest(JOSETA_BROADCAST_ADDRESS)
    }

    pub fn validate(&self) -> Result<(), JosetaError> {
        match *self {
            Command::SyncTime(offset) if offset > JOSETA_MAX_SYNC_OFFSET => {
                Err(JosetaError::InvalidSyncOffset(offset))
            }
            Command::DataRequest(address) if address > 0x0F => {
                Err(JosetaError::InvalidAddress(address))
            }
            Command::StreamRate(seconds) if seconds > JOSETA_MAX_STREAM_RATE => {
                Err(JosetaError::InvalidStreamRate(seconds))
            }
            _ => Ok(()),
        }
    }

    /// (type, payload) pair before framing.
    pub fn type_and_payload(&self) -> (u8, u8) {
        match *self {
            Command::Reset => (JOSETA_CMD_CONTROL, 0),
            Command::SyncTime(offset) => (JOSETA_CMD_CONTROL, JOSETA_SYNC_FLAG | offset),
            Command::DataRequest(address) => (JOSETA_CMD_DATA_REQUEST, address << 4),
            Command::EnableStreaming => (JOSETA_CMD_STREAM, JOSETA_STREAM_ENABLE),
            Command::DisableStreaming => (JOSETA_CMD_STREAM, 0),
            Command::StreamRate(seconds) => (JOSETA_CMD_STREAM, JOSETA_STREAM_ENABLE | seconds),
        }
    }

    /// Validates and frames the command.
    pub fn encode(&self) -> Result<[u8; JOSETA_COMMAND_SIZE], JosetaError> {
        self.validate()?;
        let (kind, payload) = self.type_and_payload();
        Ok(encode_frame(kind, payload))
    }
}

/// Frames a raw (type, payload) pair.
pub fn encode_frame(kind: u8, payload: u8) -> [u8; JOSETA_COMMAND_SIZE] {
    let head = kind << 4;
    [head, payload, checksum(head, payload)]
}

pub fn checksum(head: u8, payload: u8) -> u8 {
    0xFF - head.wrapping_add(payload)
}

/// Writes commands to a sink.
pub struct CommandEncoder<S: ByteSink> {
    sink: S,
    sent: u64,
}

impl<S: ByteSink> CommandEncoder<S> {
    pub fn new(sink: S) -> Self {
        CommandEncoder { sink, sent: 0 }
    }

    /// Sends a raw (type, payload) pair.
    pub fn send_frame(&mut self, kind: u8, payload: u8) -> Result<(), JosetaError> {
        for byte in encode_frame(kind, payload) {
            self.sink.write_byte(byte)?;
        }
        self.sent += 1;
        Ok(())
    }

    pub fn send(&mut self, command: Command) -> Result<(), JosetaError> {
        command.validate()?;
        log::debug!("sending {command:?}");
        let (kind, payload) = command.type_and_payload();
        self.send_frame(kind, payload)
    }

    pub fn reset(&mut self) -> Result<(), JosetaError> {
        self.send(Command::Reset)
    }

    pub fn sync_time(&mut self, offset: u8) -> Result<(), JosetaError> {
        self.send(Command::SyncTime(offset))
    }

    pub fn data_request(&mut self, address: u8) -> Result<(), JosetaError> {
        self.send(Command::DataRequest(address))
    }

    pub fn request_minute(&mut self) -> Result<(), JosetaError> {
        self.send(Command::request_minute())
    }

    pub fn enable_streaming(&mut self) -> Result<(), JosetaError> {
        self.send(Command::EnableStreaming)
    }

    pub fn disable_streaming(&mut self) -> Result<(), JosetaError> {
        self.send(Command::DisableStreaming)
    }

    pub fn set_stream_rate(&mut self, seconds: u8) -> Result<(), JosetaError> {
        self.send(Command::StreamRate(seconds))
    }

    /// Commands written since construction.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
