//! # Byte Stage and Event Dispatch
//!
//! The synchronous halves of the two workers. [`ByteStage`] turns dequeued bytes into
//! link actions and records; [`handle_event`] reacts to one event and
//! [`begin_handshake`] picks up a handshake the byte stage flagged. The async loops in
//! `worker.rs` only wait and call into here, so everything below is testable without a
//! runtime.

use crate::driver::event::{CallbackKind, Event};
use crate::driver::queue::PushOutcome;
use crate::driver::Shared;
use crate::error::JosetaError;
use crate::protocol::command::Command;
use crate::protocol::deframer::Deframer;
use crate::protocol::frame::ParsedRecord;
use crate::protocol::link::{on_complete_frame, Action, Discard};
use crate::util::logging::{log_frame_hex, span_frame_processing, LogThrottle};
use log::{debug, error, info, warn};

/// What the event worker has to schedule after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Start the settle delay that ends in enable-streaming.
    ArmSettle,
}

/// De-framer plus link machine, owned by the byte worker.
pub struct ByteStage {
    deframer: Deframer,
    reported_resyncs: u64,
    crc_throttle: LogThrottle,
}

impl Default for ByteStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStage {
    pub fn new() -> Self {
        ByteStage {
            deframer: Deframer::new(),
            reported_resyncs: 0,
            crc_throttle: LogThrottle::new(1000, 5),
        }
    }

    /// Drains every byte currently queued, one masked dequeue per byte. Returns the
    /// number of bytes processed.
    pub fn drain(&mut self, shared: &Shared) -> usize {
        let mut processed = 0;
        while let Some(byte) = shared.bytes.with(|q| q.pop()) {
            self.process(shared, byte);
            processed += 1;
        }
        processed
    }

    /// Feeds one dequeued byte through the de-framer and, on a complete frame, the
    /// link machine.
    pub fn process(&mut self, shared: &Shared, byte: u8) {
        let completed = self.deframer.feed(byte);

        let resyncs = self.deframer.resyncs();
        if resyncs != self.reported_resyncs {
            self.reported_resyncs = resyncs;
            shared.state.with(|s| s.stats.resyncs = resyncs);
        }

        let Some(frame) = completed else {
            return;
        };

        let _span = span_frame_processing("joseta");
        log_frame_hex("raw frame", frame.as_bytes());

        let action = shared.state.with(|s| {
            s.stats.frames_completed += 1;
            on_complete_frame(&frame, &mut s.link, &mut s.clock)
        });

        match action {
            Action::Record(record) => self.accept(shared, record),
            Action::Handshake { epoch } => {
                info!("board has reset, new epoch {epoch}");
                shared.state.with(|s| {
                    s.stats.handshakes += 1;
                    s.handshake_pending = true;
                });
                shared.handshake_signal.notify_one();
            }
            Action::Discarded(discard @ Discard::BadCrc { .. }) => {
                shared.state.with(|s| s.stats.crc_failures += 1);
                if self.crc_throttle.allow() {
                    warn!("frame discarded: {}", JosetaError::from(discard));
                }
            }
            Action::Discarded(discard @ Discard::BadState(_)) => {
                shared.state.with(|s| s.stats.bad_state_frames += 1);
                error!("frame dropped: {}", JosetaError::from(discard));
            }
        }
    }

    fn accept(&mut self, shared: &Shared, record: ParsedRecord) {
        debug!(
            "record: occupancy={}, relay={}, voltage={}, current={}, phase={}, temp={}, time={}, err={}",
            record.occupancy,
            record.relay,
            record.voltage,
            record.current,
            record.phase,
            record.temp,
            record.time,
            record.error
        );

        let threshold = shared.config.purge_threshold;
        let outcome = shared.records.with(|q| q.push(record));
        let purge_due = shared.state.with(|s| {
            s.stats.records_parsed += 1;
            if outcome != PushOutcome::Stored {
                s.stats.records_dropped += 1;
            }
            if outcome == PushOutcome::Rejected {
                return false;
            }
            s.frame_count += 1;
            if s.frame_count >= threshold && !s.purge_pending {
                s.purge_pending = true;
                true
            } else {
                false
            }
        });

        match outcome {
            PushOutcome::Stored => {}
            PushOutcome::Evicted => warn!("record queue full, oldest record dropped"),
            PushOutcome::Rejected => {
                warn!("record queue full, record dropped");
                return;
            }
        }

        let _ = shared.raise(Event::FrameReady);
        if purge_due && shared.raise(Event::PurgeThresholdReached).is_err() {
            // let the next record retry
            shared.state.with(|s| s.purge_pending = false);
        }
    }
}

/// Handles one event on the event worker.
pub fn handle_event(shared: &Shared, event: Event) {
    match event {
        Event::Tick => {
            debug!("event: request timer expired");
            run_command(shared, "minute request", |s| s.request_minute());
        }
        Event::ResetRequested => {
            info!("event: daily reset requested");
            shared.state.with(|s| s.pending_reset = true);
            run_command(shared, "minute request", |s| s.request_minute());
        }
        Event::FrameReady => {
            if shared.wants(CallbackKind::Frame) {
                let last = shared.records.with(|q| q.peek_last().copied());
                if let Some(record) = last {
                    shared.deliver(CallbackKind::Frame, &[record]);
                }
            }
        }
        Event::PurgeThresholdReached => {
            let batch = shared.records.with(|q| {
                let capacity = q.capacity();
                let batch = q.drain_up_to(capacity);
                shared.state.with(|s| {
                    s.frame_count = 0;
                    s.purge_pending = false;
                    s.stats.purges += 1;
                });
                batch
            });
            info!("event: purge of {} records", batch.len());
            if shared.wants(CallbackKind::Purge) {
                shared.deliver(CallbackKind::Purge, &batch);
            }
        }
        Event::ErrorReported => {
            let slot = shared.records.with(|q| q.pop());
            info!("event: error reported");
            match slot {
                Some(record) if shared.wants(CallbackKind::Error) => {
                    shared.deliver(CallbackKind::Error, &[record]);
                }
                Some(_) => {}
                None => debug!("error reported with empty record queue"),
            }
        }
        Event::Unknown(code) => {
            shared.state.with(|s| s.stats.unknown_events += 1);
            error!("{}", JosetaError::UnknownEvent(code));
        }
    }
}

/// First half of the handshake: time sync, then the settle delay. Returns `None` when
/// no handshake is pending. Handshakes flagged before this runs collapse into one.
pub fn begin_handshake(shared: &Shared) -> Option<FollowUp> {
    let pending = shared
        .state
        .with(|s| std::mem::take(&mut s.handshake_pending));
    if !pending {
        return None;
    }
    run_command(shared, "time sync", |s| s.send(Command::SyncTime(0)));
    Some(FollowUp::ArmSettle)
}

/// Second half of the handshake, run once the settle delay has elapsed.
pub fn finish_handshake(shared: &Shared) {
    let command = match shared.config.stream_rate {
        Some(seconds) => Command::StreamRate(seconds),
        None => Command::EnableStreaming,
    };
    run_command(shared, "enable streaming", |s| s.send(command));
    info!("sent enable stream command");
}

fn run_command<F>(shared: &Shared, what: &str, f: F)
where
    F: FnOnce(&Shared) -> Result<(), JosetaError>,
{
    if let Err(e) = f(shared) {
        shared.state.with(|s| s.stats.commands_failed += 1);
        error!("{what} failed: {e}");
    }
}
