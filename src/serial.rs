//! # Joseta Serial Communication
//!
//! Host glue between a real serial port and the driver: opening the port with the
//! board's line settings, a blocking reader that feeds received bytes into
//! [`DriverHandle::on_byte`], and a blocking [`ByteSink`] for outbound commands.

use crate::constants::JOSETA_DEFAULT_BAUDRATE;
use crate::driver::DriverHandle;
use crate::error::JosetaError;
use crate::protocol::command::ByteSink;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Configuration for the serial connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baudrate: u32,
    /// Read timeout; bounds how long the reader takes to notice a stop request.
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: String::from("/dev/ttyUSB0"),
            baudrate: JOSETA_DEFAULT_BAUDRATE,
            timeout_ms: 100,
        }
    }
}

/// Blocking transmit half of the port.
pub struct SerialSink {
    port: Box<dyn tokio_serial::SerialPort>,
}

impl ByteSink for SerialSink {
    fn write_byte(&mut self, byte: u8) -> Result<(), JosetaError> {
        self.port
            .write_all(&[byte])
            .map_err(|e| JosetaError::SerialPortError(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| JosetaError::SerialPortError(e.to_string()))
    }
}

/// An open port, split into a command sink and a receive half.
pub struct SerialLink {
    pub sink: SerialSink,
    reader: Box<dyn tokio_serial::SerialPort>,
}

impl SerialLink {
    /// Opens the port at the configured baud rate, 8N1, no flow control.
    pub fn open(config: &SerialConfig) -> Result<SerialLink, JosetaError> {
        let port = tokio_serial::new(&config.port, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()
            .map_err(|e| JosetaError::SerialPortError(e.to_string()))?;
        let reader = port
            .try_clone()
            .map_err(|e| JosetaError::SerialPortError(e.to_string()))?;
        log::info!("opened {} at {} baud", config.port, config.baudrate);
        Ok(SerialLink {
            sink: SerialSink { port },
            reader,
        })
    }

    /// Splits the port into its transmit and receive halves.
    pub fn split(self) -> (SerialSink, SerialReceiver) {
        (self.sink, SerialReceiver { port: self.reader })
    }
}

/// Receive half of an open port, not yet feeding a driver.
pub struct SerialReceiver {
    port: Box<dyn tokio_serial::SerialPort>,
}

impl SerialReceiver {
    /// Starts feeding `handle` from a blocking task.
    pub fn spawn(self, handle: DriverHandle) -> SerialReader {
        SerialReader::spawn(self.port, handle)
    }
}

/// Background receive loop. Stop it with [`SerialReader::stop`].
pub struct SerialReader {
    stop: Arc<AtomicBool>,
    task: JoinHandle<Result<(), JosetaError>>,
}

impl SerialReader {
    fn spawn(mut port: Box<dyn tokio_serial::SerialPort>, handle: DriverHandle) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let task = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 64];
            while !flag.load(Ordering::Relaxed) {
                match port.read(&mut buf) {
                    Ok(0) => continue,
                    Ok(n) => handle.on_bytes(&buf[..n]),
                    Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::error!("serial read failed: {e}");
                        return Err(JosetaError::SerialPortError(e.to_string()));
                    }
                }
            }
            Ok(())
        });
        SerialReader { stop, task }
    }

    pub async fn stop(self) -> Result<(), JosetaError> {
        self.stop.store(true, Ordering::Relaxed);
        self.task
            .await
            .map_err(|e| JosetaError::SerialPortError(e.to_string()))?
    }
}
