//! # Driver Configuration
//!
//! Everything tunable about a driver instance. Every field has a default, so a JSON
//! file only needs the keys it changes:
//!
//! ```json
//! { "purge_threshold": 30, "serial": { "port": "/dev/ttyAMA0" } }
//! ```

use crate::constants::*;
use crate::driver::queue::OverflowPolicy;
use crate::driver::scheduler::SchedulerConfig;
use crate::error::JosetaError;
use crate::serial::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Records accumulated before a purge is raised.
    pub purge_threshold: usize,
    /// Stream interval in seconds sent after the handshake. `None` sends plain
    /// enable-streaming.
    pub stream_rate: Option<u8>,
    /// Period of the internal tick source; 0 leaves ticking to the host.
    pub tick_period_ms: u64,
    /// Raw ticks per logical second.
    pub tick_interval: u32,
    pub drift_period: u64,
    /// Logical seconds between periodic data requests; 0 disables them.
    pub request_period: u64,
    /// Delay between time sync and enable-streaming after a handshake.
    pub settle_delay_ms: u64,
    pub byte_queue_capacity: usize,
    pub record_queue_capacity: usize,
    pub event_queue_capacity: usize,
    pub byte_overflow: OverflowPolicy,
    pub record_overflow: OverflowPolicy,
    pub serial: SerialConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            purge_threshold: JOSETA_DEFAULT_PURGETHRESH,
            stream_rate: None,
            tick_period_ms: JOSETA_TIMER_PERIOD_MS,
            tick_interval: JOSETA_TIMER_INTERVAL,
            drift_period: JOSETA_TIMER_DRIFT,
            request_period: JOSETA_REQUEST_PERIOD,
            settle_delay_ms: JOSETA_SETTLE_DELAY_MS,
            byte_queue_capacity: JOSETA_UART_BUF,
            record_queue_capacity: JOSETA_BUFFER_COUNT,
            event_queue_capacity: JOSETA_EVENT_QUEUE_DEPTH,
            byte_overflow: OverflowPolicy::DropNewest,
            record_overflow: OverflowPolicy::DropOldest,
            serial: SerialConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Loads a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, JosetaError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: DriverConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, JosetaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.tick_interval,
            drift_period: self.drift_period,
            request_period: self.request_period,
        }
    }

    /// Rejects combinations the driver cannot run with.
    pub fn validate(&self) -> Result<(), JosetaError> {
        if self.purge_threshold == 0 {
            return Err(JosetaError::Config("purge_threshold must be at least 1".into()));
        }
        if self.record_queue_capacity == 0
            || self.byte_queue_capacity == 0
            || self.event_queue_capacity == 0
        {
            return Err(JosetaError::Config("queue capacities must be non-zero".into()));
        }
        if self.purge_threshold > self.record_queue_capacity {
            return Err(JosetaError::Config(format!(
                "purge_threshold {} exceeds record_queue_capacity {}",
                self.purge_threshold, self.record_queue_capacity
            )));
        }
        if let Some(rate) = self.stream_rate {
            if rate > JOSETA_MAX_STREAM_RATE {
                return Err(JosetaError::InvalidStreamRate(rate));
            }
        }
        if self.tick_interval == 0 {
            return Err(JosetaError::Config("tick_interval must be at least 1".into()));
        }
        // a period of 1 would take back every second
        if self.drift_period < 2 {
            return Err(JosetaError::Config(format!(
                "drift_period {} is below 2",
                self.drift_period
            )));
        }
        Ok(())
    }
}
