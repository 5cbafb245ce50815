//! # Periodic Scheduler
//!
//! Runs in the tick handler: O(1), never blocks, raises at most one event per tick.
//!
//! Raw ticks are folded into logical seconds (`interval` ticks each). On every logical
//! second the RTC advances by one, except that every `drift_period`-th second is taken
//! back to correct a fast tick source. The `drift` flag makes the correction fire once
//! per occurrence: the next wraparound lands on the same RTC value again and must not
//! be corrected a second time.

use crate::constants::SECONDS_PER_DAY;
use crate::driver::event::Event;
use crate::protocol::link::{Clock, LinkState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Raw ticks per logical second.
    pub interval: u32,
    /// Every this many RTC seconds one second is dropped; 0 disables it.
    pub drift_period: u64,
    /// Logical seconds between periodic data requests; 0 disables them.
    pub request_period: u64,
}

/// Tick counters. Lives for the whole process; never reset by a handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    ticks: u32,
    drift: bool,
    seconds: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one raw tick.
    pub fn on_tick(
        &mut self,
        config: &SchedulerConfig,
        clock: &mut Clock,
        link: LinkState,
    ) -> Option<Event> {
        self.ticks = (self.ticks + 1) % config.interval.max(1);
        if self.ticks != 0 {
            return None;
        }

        clock.rtc += 1;
        self.seconds += 1;

        if self.drift {
            self.drift = false;
            return None;
        }

        // compensation wins over the daily check; a zero period turns it off
        if config.drift_period != 0 && clock.rtc % config.drift_period == 0 {
            clock.rtc -= 1;
            self.drift = true;
            return None;
        }

        if clock.since_epoch() % SECONDS_PER_DAY == 0 {
            return Some(Event::ResetRequested);
        }

        if config.request_period != 0
            && link == LinkState::Read
            && self.seconds % config.request_period == 0
        {
            return Some(Event::Tick);
        }

        None
    }

    /// Raw ticks into the current logical second.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Whether the last wraparound was a compensation.
    pub fn drift(&self) -> bool {
        self.drift
    }

    /// Logical seconds since start, compensated or not.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }
}
