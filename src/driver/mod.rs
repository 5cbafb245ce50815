//! # Joseta Driver
//!
//! Buffering, dispatch and scheduling around the protocol engine. The driver runs two
//! workers that talk through ordered queues:
//!
//! - the **byte worker** drains the UART byte queue into the de-framer and link machine,
//!   pushing parsed records into the record queue and raising events;
//! - the **event worker** reacts to those events: delivering records to the registered
//!   callback, purging the record queue, issuing data requests and finishing the reset
//!   handshake.
//!
//! Bytes enter through [`DriverHandle::on_byte`], which is safe to call from a reader
//! thread or interrupt-like context; ticks enter through [`DriverHandle::tick`] (or the
//! internal tick source when `tick_period_ms` is non-zero).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use joseta_rs::config::DriverConfig;
//! use joseta_rs::driver::{CallbackMask, Driver};
//! use joseta_rs::mock::MockSink;
//!
//! # async fn run() -> Result<(), joseta_rs::JosetaError> {
//! let driver = Driver::start(DriverConfig::default(), MockSink::new(), 1_700_000_000)?;
//! let handle = driver.handle();
//! handle.set_callback(CallbackMask::PURGE, |kind, records| {
//!     println!("{kind:?}: {} records", records.len());
//! });
//! handle.on_bytes(&[0xFF, 0x01, 0x02]);
//! driver.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod event;
pub mod masked;
pub mod queue;
pub mod scheduler;
pub mod state;
mod worker;

pub use event::{CallbackKind, CallbackMask, Event, RecordCallback, Registration};
pub use masked::Masked;
pub use queue::{OverflowPolicy, PushOutcome, RingBuffer};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use state::{DriverSnapshot, DriverState, DriverStats};

use crate::config::DriverConfig;
use crate::constants::{JOSETA_BROADCAST_ADDRESS, JOSETA_MINUTE_FRAMES};
use crate::error::JosetaError;
use crate::protocol::command::{ByteSink, Command, CommandEncoder};
use crate::protocol::frame::ParsedRecord;
use crate::protocol::link::LinkState;
use event::{event_channel, EventSender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Context shared by the workers, the tick handler and every [`DriverHandle`].
pub struct Shared {
    pub(crate) config: DriverConfig,
    pub(crate) scheduler: SchedulerConfig,
    pub(crate) state: Masked<DriverState>,
    pub(crate) bytes: Masked<RingBuffer<u8>>,
    pub(crate) records: Masked<RingBuffer<ParsedRecord>>,
    pub(crate) byte_signal: Notify,
    /// Wakes the event worker for a handshake. Kept off the event queue so a full
    /// queue cannot lose it.
    pub(crate) handshake_signal: Notify,
    pub(crate) events: EventSender,
    encoder: Mutex<CommandEncoder<Box<dyn ByteSink + Send>>>,
    registration: Masked<Option<Registration>>,
}

impl Shared {
    /// Builds the context and the receiving end of its event queue.
    pub fn new(
        config: DriverConfig,
        sink: Box<dyn ByteSink + Send>,
        rtc: u64,
    ) -> (Shared, Receiver<Event>) {
        let (events, event_rx) = event_channel(config.event_queue_capacity);
        let shared = Shared {
            scheduler: config.scheduler(),
            state: Masked::new(DriverState::new(rtc)),
            bytes: Masked::new(RingBuffer::new(
                config.byte_queue_capacity,
                config.byte_overflow,
            )),
            records: Masked::new(RingBuffer::new(
                config.record_queue_capacity,
                config.record_overflow,
            )),
            byte_signal: Notify::new(),
            handshake_signal: Notify::new(),
            events,
            encoder: Mutex::new(CommandEncoder::new(sink)),
            registration: Masked::new(None),
            config,
        };
        (shared, event_rx)
    }

    /// Queues an event, counting it if it could not be queued.
    pub(crate) fn raise(&self, event: Event) -> Result<(), JosetaError> {
        let result = self.events.raise(event);
        if result.is_err() {
            self.state.with(|s| s.stats.events_dropped += 1);
        }
        result
    }

    /// Transmits one command. The transmit lock is the only lock held while blocking.
    pub(crate) fn send(&self, command: Command) -> Result<(), JosetaError> {
        let mut encoder = self
            .encoder
            .lock()
            .map_err(|e| JosetaError::SerialPortError(e.to_string()))?;
        encoder.send(command)
    }

    /// Data request; tells the link to expect data next.
    pub(crate) fn data_request(&self, address: u8) -> Result<(), JosetaError> {
        let command = Command::DataRequest(address);
        command.validate()?;
        self.state.with(|s| s.link = LinkState::Read);
        self.send(command)
    }

    pub(crate) fn request_minute(&self) -> Result<(), JosetaError> {
        self.state
            .with(|s| s.expected_frames = JOSETA_MINUTE_FRAMES);
        self.data_request(JOSETA_BROADCAST_ADDRESS)
    }

    /// Puts the link into `Init` and resets the board.
    pub(crate) fn reset_board(&self) -> Result<(), JosetaError> {
        self.state.with(|s| s.link = LinkState::Init);
        self.send(Command::Reset)?;
        log::info!("sent reset command");
        Ok(())
    }

    pub(crate) fn wants(&self, kind: CallbackKind) -> bool {
        self.registration
            .with(|r| r.as_ref().is_some_and(|r| r.wants(kind)))
    }

    /// Calls the registered callback outside any masked section.
    pub(crate) fn deliver(&self, kind: CallbackKind, records: &[ParsedRecord]) {
        let Some(registration) = self.registration.with(|r| r.clone()) else {
            return;
        };
        if !registration.wants(kind) {
            return;
        }
        (registration.callback)(kind, records);
        self.state.with(|s| s.stats.callbacks_delivered += 1);
    }
}

/// Cheap, cloneable handle for producers and host code.
#[derive(Clone)]
pub struct DriverHandle {
    shared: Arc<Shared>,
}

impl DriverHandle {
    pub fn new(shared: Arc<Shared>) -> Self {
        DriverHandle { shared }
    }

    /// Byte-arrival producer: one masked push, then a wake-up for the byte worker.
    pub fn on_byte(&self, byte: u8) {
        let shared = &self.shared;
        let outcome = shared.bytes.with(|q| {
            let outcome = q.push(byte);
            shared.state.with(|s| {
                s.stats.bytes_received += 1;
                if outcome != PushOutcome::Stored {
                    s.stats.bytes_dropped += 1;
                }
            });
            outcome
        });
        if outcome != PushOutcome::Stored {
            log::trace!("byte queue full ({outcome:?})");
        }
        shared.byte_signal.notify_one();
    }

    pub fn on_bytes(&self, data: &[u8]) {
        for &byte in data {
            self.on_byte(byte);
        }
    }

    /// Periodic tick callback. O(1); raises at most one event.
    pub fn tick(&self) {
        let shared = &self.shared;
        let event = shared.state.with(|s| {
            let DriverState {
                scheduler,
                clock,
                link,
                ..
            } = s;
            scheduler.on_tick(&shared.scheduler, clock, *link)
        });
        if let Some(event) = event {
            let _ = shared.raise(event);
        }
    }

    /// Registers the record callback and its capability mask, replacing any previous one.
    pub fn set_callback<F>(&self, mask: CallbackMask, callback: F)
    where
        F: Fn(CallbackKind, &[ParsedRecord]) + Send + Sync + 'static,
    {
        let registration = Registration {
            callback: Arc::new(callback),
            mask,
        };
        self.shared
            .registration
            .with(|r| *r = Some(registration));
    }

    pub fn clear_callback(&self) {
        self.shared.registration.with(|r| *r = None);
    }

    /// Injects a raw event code; unknown codes take the fault path.
    pub fn post_event_code(&self, code: u8) -> Result<(), JosetaError> {
        self.shared.raise(Event::from_code(code))
    }

    /// Raises `ErrorReported`.
    pub fn report_error(&self) -> Result<(), JosetaError> {
        self.shared.raise(Event::ErrorReported)
    }

    pub fn reset_board(&self) -> Result<(), JosetaError> {
        self.shared.reset_board()
    }

    pub fn data_request(&self, address: u8) -> Result<(), JosetaError> {
        self.shared.data_request(address)
    }

    pub fn request_minute(&self) -> Result<(), JosetaError> {
        self.shared.request_minute()
    }

    pub fn sync_time(&self, offset: u8) -> Result<(), JosetaError> {
        self.shared.send(Command::SyncTime(offset))
    }

    pub fn enable_streaming(&self) -> Result<(), JosetaError> {
        self.shared.send(Command::EnableStreaming)
    }

    pub fn disable_streaming(&self) -> Result<(), JosetaError> {
        self.shared.send(Command::DisableStreaming)
    }

    pub fn set_stream_rate(&self, seconds: u8) -> Result<(), JosetaError> {
        self.shared.send(Command::StreamRate(seconds))
    }

    pub fn rtc(&self) -> u64 {
        self.shared.state.with(|s| s.clock.rtc)
    }

    pub fn epoch(&self) -> u64 {
        self.shared.state.with(|s| s.clock.epoch)
    }

    pub fn link_state(&self) -> LinkState {
        self.shared.state.with(|s| s.link)
    }

    pub fn pending_reset(&self) -> bool {
        self.shared.state.with(|s| s.pending_reset)
    }

    pub fn frame_count(&self) -> usize {
        self.shared.state.with(|s| s.frame_count)
    }

    pub fn stats(&self) -> DriverStats {
        self.shared.state.with(|s| s.stats)
    }

    /// Reads all state in one masked section.
    pub fn snapshot(&self) -> DriverSnapshot {
        let shared = &self.shared;
        shared.bytes.with(|bytes| {
            shared.records.with(|records| {
                shared.state.with(|s| DriverSnapshot {
                    rtc: s.clock.rtc,
                    epoch: s.clock.epoch,
                    link: s.link,
                    frame_count: s.frame_count,
                    expected_frames: s.expected_frames,
                    pending_reset: s.pending_reset,
                    byte_queue_len: bytes.len(),
                    record_queue_len: records.len(),
                    byte_queue_high_water: bytes.stats().high_water,
                    record_queue_high_water: records.stats().high_water,
                    stats: s.stats,
                })
            })
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.shared.config
    }
}

/// A running driver: its two workers, the optional tick source, and the shutdown signal.
///
/// Dropping the driver without calling [`Driver::shutdown`] also stops the workers.
pub struct Driver {
    handle: DriverHandle,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Driver {
    /// Validates `config`, spawns the workers on the current tokio runtime and resets
    /// the board.
    pub fn start<S>(config: DriverConfig, sink: S, rtc: u64) -> Result<Driver, JosetaError>
    where
        S: ByteSink + Send + 'static,
    {
        config.validate()?;

        let tick_period = Duration::from_millis(config.tick_period_ms);
        let (shared, event_rx) = Shared::new(config, Box::new(sink), rtc);
        let shared = Arc::new(shared);
        let handle = DriverHandle::new(Arc::clone(&shared));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut tasks = Vec::with_capacity(3);
        if !tick_period.is_zero() {
            tasks.push(tokio::spawn(worker::tick_source(
                handle.clone(),
                tick_period,
                shutdown_rx.clone(),
            )));
        }
        tasks.push(tokio::spawn(worker::byte_worker(
            Arc::clone(&shared),
            shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(worker::event_worker(
            shared,
            event_rx,
            shutdown_rx,
        )));

        let driver = Driver {
            handle,
            shutdown,
            tasks,
        };
        driver.handle.reset_board()?;
        Ok(driver)
    }

    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// Stops the workers, cancelling any pending settle delay, and waits for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                log::error!("driver task failed: {e}");
            }
        }
    }
}
