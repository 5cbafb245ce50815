//! # Link State Machine
//!
//! After a reset command the board answers with one handshake frame; its content is
//! meaningless, but its arrival is the moment the driver pins a new epoch. Every frame
//! after that is measurement data.

use crate::error::JosetaError;
use crate::protocol::frame::{parse, ParsedRecord, RawFrame};
use serde::Serialize;

/// Protocol phase of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LinkState {
    /// No reset has been issued yet; frames are not expected.
    #[default]
    Unconfigured,
    /// Reset sent, waiting for the handshake frame.
    Init,
    /// Handshake done, frames are measurement data.
    Read,
}

/// RTC and epoch, both in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Clock {
    pub rtc: u64,
    pub epoch: u64,
}

impl Clock {
    pub fn new(rtc: u64) -> Self {
        Clock { rtc, epoch: 0 }
    }

    /// Seconds since the last handshake.
    pub fn since_epoch(&self) -> u64 {
        self.rtc.wrapping_sub(self.epoch)
    }
}

/// Why a completed frame went nowhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    BadCrc { expected: u16, calculated: u16 },
    BadState(LinkState),
}

impl From<Discard> for JosetaError {
    fn from(discard: Discard) -> Self {
        match discard {
            Discard::BadCrc {
                expected,
                calculated,
            } => JosetaError::InvalidChecksum {
                expected,
                calculated,
            },
            Discard::BadState(state) => JosetaError::BadLinkState(state),
        }
    }
}

/// What the caller has to do with a completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The handshake arrived: the epoch is now `epoch`, the link is `Read`, and the
    /// sync-time and enable-streaming commands are due.
    Handshake { epoch: u64 },
    /// A measurement to enqueue.
    Record(ParsedRecord),
    Discarded(Discard),
}

/// Runs one completed frame through the link machine.
///
/// The CRC is checked first in every state. A valid frame in `Init` finishes the
/// handshake (epoch := RTC, state := `Read`); in `Read` it is parsed against the current
/// epoch; in any other state it is discarded.
pub fn on_complete_frame(raw: &RawFrame, link: &mut LinkState, clock: &mut Clock) -> Action {
    let calculated = raw.computed_crc();
    let expected = raw.crc();
    if calculated != expected {
        return Action::Discarded(Discard::BadCrc {
            expected,
            calculated,
        });
    }

    match *link {
        LinkState::Read => Action::Record(parse(raw, clock.epoch)),
        LinkState::Init => {
            clock.epoch = clock.rtc;
            *link = LinkState::Read;
            Action::Handshake { epoch: clock.epoch }
        }
        other => Action::Discarded(Discard::BadState(other)),
    }
}
