//! Driver context shared by the workers, the tick handler and the host handle.

use crate::driver::scheduler::Scheduler;
use crate::protocol::link::{Clock, LinkState};
use serde::Serialize;

/// Diagnostic counters. Nothing here feeds back into protocol behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub bytes_received: u64,
    pub bytes_dropped: u64,
    pub resyncs: u64,
    pub frames_completed: u64,
    pub crc_failures: u64,
    pub bad_state_frames: u64,
    pub handshakes: u64,
    pub records_parsed: u64,
    pub records_dropped: u64,
    pub purges: u64,
    pub events_dropped: u64,
    pub unknown_events: u64,
    pub callbacks_delivered: u64,
    pub commands_failed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DriverState {
    pub clock: Clock,
    pub link: LinkState,
    /// Records accepted since the last purge.
    pub frame_count: usize,
    /// A purge event is in flight.
    pub purge_pending: bool,
    /// Handshake frame seen, time sync not sent yet.
    pub handshake_pending: bool,
    /// Frames the last data request asked for. Stored only.
    pub expected_frames: u32,
    /// Set by a daily reset request. Stored only; nothing acts on it yet.
    pub pending_reset: bool,
    pub scheduler: Scheduler,
    pub stats: DriverStats,
}

impl DriverState {
    pub fn new(rtc: u64) -> Self {
        DriverState {
            clock: Clock::new(rtc),
            ..DriverState::default()
        }
    }
}

/// Consistent copy of the driver state, taken under one masked section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriverSnapshot {
    pub rtc: u64,
    pub epoch: u64,
    pub link: LinkState,
    pub frame_count: usize,
    pub expected_frames: u32,
    pub pending_reset: bool,
    pub byte_queue_len: usize,
    pub record_queue_len: usize,
    /// Deepest either queue has been since start.
    pub byte_queue_high_water: usize,
    pub record_queue_high_water: usize,
    pub stats: DriverStats,
}
