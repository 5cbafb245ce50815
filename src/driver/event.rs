//! # Driver Events
//!
//! Everything the event worker reacts to travels through one bounded channel in
//! raise order. Events are raised from the byte worker, the tick handler and the host;
//! none of those contexts may block, so raising is `try_send` and a full channel drops
//! the event and counts it.

use crate::error::JosetaError;
use crate::protocol::frame::ParsedRecord;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{channel, error::TrySendError, Receiver, Sender};

// Wire-compatible event codes; the deliverable ones double as mask bits.
pub const JOSETA_CB_FRAME: u8 = 0x01;
pub const JOSETA_CB_PURGE: u8 = 0x02;
pub const JOSETA_CB_ERROR: u8 = 0x04;
pub const JOSETA_CB_TIMER: u8 = 0x08;
pub const JOSETA_CB_RESET: u8 = 0x10;

bitflags! {
    /// Which event kinds a registered callback wants.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CallbackMask: u8 {
        const FRAME = JOSETA_CB_FRAME;
        const PURGE = JOSETA_CB_PURGE;
        const ERROR = JOSETA_CB_ERROR;
    }
}

/// Kinds delivered to application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Frame,
    Purge,
    Error,
}

impl CallbackKind {
    pub fn mask(&self) -> CallbackMask {
        match self {
            CallbackKind::Frame => CallbackMask::FRAME,
            CallbackKind::Purge => CallbackMask::PURGE,
            CallbackKind::Error => CallbackMask::ERROR,
        }
    }
}

/// Application record callback. The slice is a copy owned by the driver for the
/// duration of the call.
pub type RecordCallback = Arc<dyn Fn(CallbackKind, &[ParsedRecord]) + Send + Sync>;

/// A callback together with its capability mask.
#[derive(Clone)]
pub struct Registration {
    pub callback: RecordCallback,
    pub mask: CallbackMask,
}

impl Registration {
    pub fn wants(&self, kind: CallbackKind) -> bool {
        self.mask.contains(kind.mask())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Periodic request timer expired.
    Tick,
    /// One sensor-day has passed since the last handshake.
    ResetRequested,
    /// A record was appended to the record queue.
    FrameReady,
    PurgeThresholdReached,
    ErrorReported,
    /// An event code nobody knows.
    Unknown(u8),
}

impl Event {
    pub fn from_code(code: u8) -> Self {
        match code {
            JOSETA_CB_FRAME => Event::FrameReady,
            JOSETA_CB_PURGE => Event::PurgeThresholdReached,
            JOSETA_CB_ERROR => Event::ErrorReported,
            JOSETA_CB_TIMER => Event::Tick,
            JOSETA_CB_RESET => Event::ResetRequested,
            other => Event::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Tick => "Tick",
            Event::ResetRequested => "ResetRequested",
            Event::FrameReady => "FrameReady",
            Event::PurgeThresholdReached => "PurgeThresholdReached",
            Event::ErrorReported => "ErrorReported",
            Event::Unknown(_) => "Unknown",
        }
    }
}

/// Producer side of the event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Queues `event` without blocking.
    pub fn raise(&self, event: Event) -> Result<(), JosetaError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                log::warn!("event queue full, dropping {}", event.name());
                Err(JosetaError::QueueFull("event"))
            }
            Err(TrySendError::Closed(event)) => {
                log::debug!("event worker gone, dropping {}", event.name());
                Err(JosetaError::NotRunning)
            }
        }
    }
}

/// Creates the bounded event channel.
pub fn event_channel(capacity: usize) -> (EventSender, Receiver<Event>) {
    let (tx, rx) = channel(capacity.max(1));
    (EventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_to_events() {
        assert_eq!(Event::from_code(JOSETA_CB_FRAME), Event::FrameReady);
        assert_eq!(Event::from_code(JOSETA_CB_RESET), Event::ResetRequested);
        assert_eq!(Event::from_code(0x40), Event::Unknown(0x40));
    }

    #[test]
    fn test_registration_mask() {
        let registration = Registration {
            callback: Arc::new(|_, _| {}),
            mask: CallbackMask::PURGE,
        };
        assert!(registration.wants(CallbackKind::Purge));
        assert!(!registration.wants(CallbackKind::Frame));
        assert!(!registration.wants(CallbackKind::Error));
    }

    #[test]
    fn test_full_channel_drops() {
        let (tx, mut rx) = event_channel(1);
        assert!(tx.raise(Event::Tick).is_ok());
        assert!(matches!(
            tx.raise(Event::FrameReady),
            Err(JosetaError::QueueFull("event"))
        ));
        assert_eq!(rx.try_recv().unwrap(), Event::Tick);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_reports_not_running() {
        let (tx, rx) = event_channel(4);
        drop(rx);
        assert!(matches!(tx.raise(Event::Tick), Err(JosetaError::NotRunning)));
    }
}
