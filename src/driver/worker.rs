//! Async worker loops.
//!
//! Each loop waits for its signal (or shutdown) and hands the work to the synchronous
//! code in `dispatch.rs`.

use crate::driver::dispatch::{
    begin_handshake, finish_handshake, handle_event, ByteStage, FollowUp,
};
use crate::driver::event::Event;
use crate::driver::{DriverHandle, Shared};
use log::debug;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::Receiver, watch};
use tokio::time::{interval, sleep, Sleep};

/// Drains the byte queue into the byte stage every time the producer signals.
pub(crate) async fn byte_worker(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut stage = ByteStage::new();
    debug!("byte worker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = shared.byte_signal.notified() => {
                stage.drain(&shared);
            }
        }
    }

    debug!("byte worker stopped");
}

/// Handles events in raise order, picks up handshakes and owns the settle timer.
pub(crate) async fn event_worker(
    shared: Arc<Shared>,
    mut events: Receiver<Event>,
    mut shutdown: watch::Receiver<bool>,
) {
    let delay = Duration::from_millis(shared.config.settle_delay_ms);
    let mut settle: Option<Pin<Box<Sleep>>> = None;
    debug!("event worker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_event(&shared, event);
            }
            _ = shared.handshake_signal.notified() => {
                if let Some(FollowUp::ArmSettle) = begin_handshake(&shared) {
                    // a second handshake restarts the delay
                    settle = Some(Box::pin(sleep(delay)));
                }
            }
            _ = settle_elapsed(&mut settle) => {
                settle = None;
                finish_handshake(&shared);
            }
        }
    }

    if settle.is_some() {
        debug!("settle delay cancelled by shutdown");
    }
    debug!("event worker stopped");
}

async fn settle_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(delay) => delay.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Internal tick source for hosts without their own timer interrupt.
pub(crate) async fn tick_source(
    handle: DriverHandle,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    debug!("tick source started, period {period:?}");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => handle.tick(),
        }
    }

    debug!("tick source stopped");
}
