//! Tests for the byte stage and event handlers in `driver/dispatch.rs`, driven
//! synchronously without the worker tasks.

use joseta_rs::driver::dispatch::{
    begin_handshake, finish_handshake, handle_event, ByteStage, FollowUp,
};
use joseta_rs::driver::{CallbackKind, CallbackMask, DriverHandle, Event, OverflowPolicy, Shared};
use joseta_rs::mock::MockSink;
use joseta_rs::protocol::deframer::stuff_frame;
use joseta_rs::protocol::frame::{RawFields, RawFrame};
use joseta_rs::protocol::LinkState;
use joseta_rs::{DriverConfig, ParsedRecord};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::Receiver;

const RTC: u64 = 1_700_000_000;

const RESET: [u8; 3] = [0x40, 0x00, 0xBF];
const SYNC: [u8; 3] = [0x40, 0x80, 0x3F];
const ENABLE: [u8; 3] = [0x50, 0x80, 0x2F];
const REQUEST_MINUTE: [u8; 3] = [0x10, 0xF0, 0xFF];

type Delivered = Arc<Mutex<Vec<(CallbackKind, Vec<ParsedRecord>)>>>;

struct Rig {
    shared: Arc<Shared>,
    handle: DriverHandle,
    events: Receiver<Event>,
    stage: ByteStage,
    sink: MockSink,
}

impl Rig {
    fn new(config: DriverConfig) -> Self {
        let sink = MockSink::new();
        let (shared, events) = Shared::new(config, Box::new(sink.clone()), RTC);
        let shared = Arc::new(shared);
        Rig {
            handle: DriverHandle::new(Arc::clone(&shared)),
            shared,
            events,
            stage: ByteStage::new(),
            sink,
        }
    }

    fn with_threshold(threshold: usize) -> Self {
        Self::new(DriverConfig {
            purge_threshold: threshold,
            record_queue_capacity: 8,
            ..DriverConfig::default()
        })
    }

    fn feed(&mut self, frame: &RawFrame) {
        self.handle.on_bytes(&stuff_frame(frame));
        self.stage.drain(&self.shared);
    }

    fn pending_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Handles queued events, then any flagged handshake, as the event worker would.
    fn dispatch_all(&mut self) -> Option<FollowUp> {
        for event in self.pending_events() {
            handle_event(&self.shared, event);
        }
        begin_handshake(&self.shared)
    }

    /// Resets, answers the handshake and finishes it, leaving the link reading.
    fn ready(&mut self) {
        self.handle.reset_board().unwrap();
        self.feed(&measurement(0));
        self.dispatch_all();
        finish_handshake(&self.shared);
        self.sink.clear();
    }

    fn record_everything(&self, mask: CallbackMask) -> Delivered {
        let delivered: Delivered = Arc::default();
        let sink = Arc::clone(&delivered);
        self.handle.set_callback(mask, move |kind, records| {
            sink.lock().unwrap().push((kind, records.to_vec()));
        });
        delivered
    }
}

fn measurement(timestamp: u32) -> RawFrame {
    RawFrame::build(&RawFields {
        flags: 0x01,
        voltage: 2300,
        current: 120,
        phase: 5,
        temperature: 21,
        timestamp,
        ..RawFields::default()
    })
}

/// Tests the full handshake: reset, epoch capture, time sync, then enable-streaming.
#[test]
fn test_handshake_sequence() {
    let mut rig = Rig::with_threshold(4);
    rig.handle.reset_board().unwrap();
    assert_eq!(rig.handle.link_state(), LinkState::Init);

    rig.feed(&measurement(0));
    assert_eq!(rig.handle.link_state(), LinkState::Read);
    assert_eq!(rig.handle.epoch(), RTC);

    assert!(rig.pending_events().is_empty());
    assert_eq!(begin_handshake(&rig.shared), Some(FollowUp::ArmSettle));
    assert_eq!(begin_handshake(&rig.shared), None);
    assert_eq!(rig.sink.commands(), vec![RESET, SYNC]);

    finish_handshake(&rig.shared);
    assert_eq!(rig.sink.commands(), vec![RESET, SYNC, ENABLE]);
    assert_eq!(rig.handle.stats().handshakes, 1);
    assert_eq!(rig.handle.snapshot().record_queue_len, 0);
}

/// Tests that the handshake completes while the event queue is full.
#[test]
fn test_handshake_with_full_event_queue() {
    let mut rig = Rig::new(DriverConfig {
        event_queue_capacity: 1,
        ..DriverConfig::default()
    });
    rig.handle.reset_board().unwrap();
    rig.handle.post_event_code(0x40).unwrap();
    assert!(rig.handle.post_event_code(0x40).is_err());

    rig.feed(&measurement(0));
    assert_eq!(rig.handle.link_state(), LinkState::Read);
    assert_eq!(rig.dispatch_all(), Some(FollowUp::ArmSettle));
    assert_eq!(rig.sink.commands(), vec![RESET, SYNC]);

    finish_handshake(&rig.shared);
    assert_eq!(rig.sink.commands(), vec![RESET, SYNC, ENABLE]);
    let stats = rig.handle.stats();
    assert_eq!(stats.handshakes, 1);
    assert_eq!(stats.unknown_events, 1);
}

/// Tests that a configured stream rate replaces plain enable-streaming.
#[test]
fn test_handshake_with_stream_rate() {
    let mut rig = Rig::new(DriverConfig {
        stream_rate: Some(10),
        ..DriverConfig::default()
    });
    rig.handle.reset_board().unwrap();
    rig.feed(&measurement(0));
    rig.dispatch_all();
    finish_handshake(&rig.shared);
    assert_eq!(rig.sink.commands(), vec![RESET, SYNC, [0x50, 0x8A, 0x25]]);
}

/// Tests that records carry the epoch captured at the handshake.
#[test]
fn test_records_use_epoch() {
    let mut rig = Rig::with_threshold(4);
    rig.ready();
    let delivered = rig.record_everything(CallbackMask::FRAME);

    rig.feed(&measurement(60));
    rig.dispatch_all();

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    let (kind, records) = &delivered[0];
    assert_eq!(*kind, CallbackKind::Frame);
    assert_eq!(records[0].time, RTC + 60);
    assert_eq!(records[0].voltage, 2300);
    assert!(records[0].occupancy);
}

/// Tests that one record short of the threshold raises no purge.
#[test]
fn test_no_purge_below_threshold() {
    let mut rig = Rig::with_threshold(3);
    rig.ready();
    rig.feed(&measurement(1));
    rig.feed(&measurement(2));
    assert_eq!(rig.pending_events(), vec![Event::FrameReady; 2]);
    assert_eq!(rig.handle.frame_count(), 2);
}

/// Tests that reaching the threshold raises exactly one purge and the handler
/// delivers and clears the batch.
#[test]
fn test_purge_at_threshold() {
    let mut rig = Rig::with_threshold(3);
    rig.ready();
    let delivered = rig.record_everything(CallbackMask::PURGE);

    for t in 1..=3 {
        rig.feed(&measurement(t));
    }
    let events = rig.pending_events();
    assert_eq!(
        events,
        vec![
            Event::FrameReady,
            Event::FrameReady,
            Event::FrameReady,
            Event::PurgeThresholdReached
        ]
    );
    for event in events {
        handle_event(&rig.shared, event);
    }

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    let times: Vec<u64> = delivered[0].1.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![RTC + 1, RTC + 2, RTC + 3]);
    assert_eq!(rig.handle.frame_count(), 0);
    assert_eq!(rig.handle.snapshot().record_queue_len, 0);
    assert_eq!(rig.handle.stats().purges, 1);
}

/// Tests that records arriving before the purge is handled do not raise a second one.
#[test]
fn test_single_purge_while_pending() {
    let mut rig = Rig::with_threshold(3);
    rig.ready();
    for t in 1..=5 {
        rig.feed(&measurement(t));
    }
    let purges = rig
        .pending_events()
        .into_iter()
        .filter(|e| *e == Event::PurgeThresholdReached)
        .count();
    assert_eq!(purges, 1);

    handle_event(&rig.shared, Event::PurgeThresholdReached);
    for t in 6..=8 {
        rig.feed(&measurement(t));
    }
    assert!(rig
        .pending_events()
        .contains(&Event::PurgeThresholdReached));
}

/// Tests that kinds outside the mask are never delivered.
#[test]
fn test_mask_filters_delivery() {
    let mut rig = Rig::with_threshold(2);
    rig.ready();
    let delivered = rig.record_everything(CallbackMask::ERROR);

    rig.feed(&measurement(1));
    rig.feed(&measurement(2));
    rig.dispatch_all();

    assert!(delivered.lock().unwrap().is_empty());
    assert_eq!(rig.handle.stats().callbacks_delivered, 0);
    assert_eq!(rig.handle.stats().purges, 1);
}

/// Tests that a purge-only callback sees the purge but not a reported error.
#[test]
fn test_purge_mask_skips_error() {
    let mut rig = Rig::with_threshold(2);
    rig.ready();
    let delivered = rig.record_everything(CallbackMask::PURGE);

    rig.feed(&measurement(1));
    rig.feed(&measurement(2));
    rig.dispatch_all();
    rig.feed(&measurement(3));
    rig.handle.report_error().unwrap();
    rig.dispatch_all();

    let delivered = delivered.lock().unwrap();
    let kinds: Vec<CallbackKind> = delivered.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(kinds, vec![CallbackKind::Purge]);
    assert_eq!(delivered[0].1.len(), 2);
    // the error report still consumed record 3
    assert_eq!(rig.handle.snapshot().record_queue_len, 0);
    assert_eq!(rig.handle.stats().purges, 1);
}

/// Tests that an error report hands over the oldest record.
#[test]
fn test_error_report_delivers_oldest() {
    let mut rig = Rig::with_threshold(8);
    rig.ready();
    let delivered = rig.record_everything(CallbackMask::ERROR);
    rig.feed(&measurement(1));
    rig.feed(&measurement(2));
    rig.pending_events();

    rig.handle.report_error().unwrap();
    rig.dispatch_all();

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, CallbackKind::Error);
    assert_eq!(delivered[0].1[0].time, RTC + 1);
    assert_eq!(rig.handle.snapshot().record_queue_len, 1);
}

/// Tests that an error report without the ERROR mask still consumes the record.
#[test]
fn test_error_report_unmasked_consumes() {
    let mut rig = Rig::with_threshold(8);
    rig.ready();
    rig.feed(&measurement(1));
    rig.pending_events();

    rig.handle.post_event_code(0x04).unwrap();
    rig.dispatch_all();
    assert_eq!(rig.handle.snapshot().record_queue_len, 0);
}

/// Tests the fault path for unknown event codes.
#[test]
fn test_unknown_event_code() {
    let mut rig = Rig::with_threshold(4);
    rig.handle.post_event_code(0x40).unwrap();
    assert_eq!(rig.pending_events(), vec![Event::Unknown(0x40)]);
    handle_event(&rig.shared, Event::Unknown(0x40));
    assert_eq!(rig.handle.stats().unknown_events, 1);
}

/// Tests that the timer and daily reset events request a minute of data.
#[test]
fn test_timer_and_reset_events_request_data() {
    let mut rig = Rig::with_threshold(4);
    rig.ready();
    handle_event(&rig.shared, Event::Tick);
    handle_event(&rig.shared, Event::ResetRequested);
    assert_eq!(rig.sink.commands(), vec![REQUEST_MINUTE, REQUEST_MINUTE]);
    let snapshot = rig.handle.snapshot();
    assert!(snapshot.pending_reset);
    assert_eq!(snapshot.expected_frames, 60);
}

/// Tests that a corrupted frame is counted and produces nothing else.
#[test]
fn test_bad_crc_discarded() {
    let mut rig = Rig::with_threshold(4);
    rig.ready();
    let mut bytes = *measurement(1).as_bytes();
    bytes[3] ^= 0x10;
    rig.feed(&RawFrame::from_bytes(bytes));

    assert!(rig.pending_events().is_empty());
    assert_eq!(rig.handle.stats().crc_failures, 1);
    assert_eq!(rig.handle.frame_count(), 0);
}

/// Tests that a frame before any reset takes the bad-state path.
#[test]
fn test_frame_in_bad_state() {
    let mut rig = Rig::with_threshold(4);
    rig.feed(&measurement(1));
    assert!(rig.pending_events().is_empty());
    assert_eq!(rig.handle.stats().bad_state_frames, 1);
    assert_eq!(rig.handle.link_state(), LinkState::Unconfigured);
}

/// Tests that a full record queue evicts the oldest record.
#[test]
fn test_record_overflow_drops_oldest() {
    let mut rig = Rig::new(DriverConfig {
        purge_threshold: 2,
        record_queue_capacity: 2,
        ..DriverConfig::default()
    });
    rig.ready();
    let delivered = rig.record_everything(CallbackMask::PURGE);
    for t in 1..=3 {
        rig.feed(&measurement(t));
    }
    rig.dispatch_all();

    let delivered = delivered.lock().unwrap();
    let times: Vec<u64> = delivered[0].1.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![RTC + 2, RTC + 3]);
    assert_eq!(rig.handle.stats().records_dropped, 1);
    assert_eq!(rig.handle.snapshot().record_queue_high_water, 2);
}

/// Tests that a full byte queue refuses new bytes and counts them.
#[test]
fn test_byte_overflow_drop_newest() {
    let rig = Rig::new(DriverConfig {
        byte_queue_capacity: 4,
        byte_overflow: OverflowPolicy::DropNewest,
        ..DriverConfig::default()
    });
    rig.handle.on_bytes(&[1, 2, 3, 4, 5, 6]);
    let snapshot = rig.handle.snapshot();
    assert_eq!(snapshot.byte_queue_len, 4);
    assert_eq!(snapshot.byte_queue_high_water, 4);
    assert_eq!(snapshot.stats.bytes_received, 6);
    assert_eq!(snapshot.stats.bytes_dropped, 2);
}

/// Tests that the tick handler raises the periodic request once the link reads.
#[test]
fn test_tick_raises_timer_event() {
    let mut rig = Rig::new(DriverConfig {
        tick_interval: 1,
        request_period: 2,
        drift_period: 1_000_003,
        ..DriverConfig::default()
    });
    rig.ready();
    rig.handle.tick();
    rig.handle.tick();
    assert_eq!(rig.pending_events(), vec![Event::Tick]);
    assert_eq!(rig.handle.rtc(), RTC + 2);
}
