//! Mock transmit sink for testing
//!
//! Records every byte the driver transmits so command sequences can be asserted
//! without a board attached. Clones share the same buffer, so a test keeps one clone
//! and hands the other to the driver.

use crate::constants::JOSETA_COMMAND_SIZE;
use crate::error::JosetaError;
use crate::protocol::command::ByteSink;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct MockSink {
    /// Data written to the sink
    pub tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Number of upcoming writes that fail
    pub failures: Arc<Mutex<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get data that was written to the sink
    pub fn tx_data(&self) -> Vec<u8> {
        lock(&self.tx_buffer).clone()
    }

    /// Transmitted bytes grouped into 3-byte command frames. A trailing partial frame
    /// is left out.
    pub fn commands(&self) -> Vec<[u8; JOSETA_COMMAND_SIZE]> {
        lock(&self.tx_buffer)
            .chunks_exact(JOSETA_COMMAND_SIZE)
            .map(|c| [c[0], c[1], c[2]])
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.tx_buffer).clear();
    }

    /// Make the next `count` byte writes fail with a serial error.
    pub fn fail_next(&self, count: usize) {
        *lock(&self.failures) = count;
    }
}

impl ByteSink for MockSink {
    fn write_byte(&mut self, byte: u8) -> Result<(), JosetaError> {
        {
            let mut failures = lock(&self.failures);
            if *failures > 0 {
                *failures -= 1;
                return Err(JosetaError::SerialPortError("simulated write failure".into()));
            }
        }
        lock(&self.tx_buffer).push(byte);
        Ok(())
    }
}
