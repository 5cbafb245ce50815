//! # Log Helpers
//!
//! Rate limiting for messages that a noisy line can produce hundreds of times a
//! second, compact frame dumps, and an optional `tracing` span around frame
//! processing.
//!
//! ```rust
//! use joseta_rs::util::logging::{log_frame_hex, LogThrottle};
//!
//! let mut throttle = LogThrottle::new(1000, 5); // 5 messages per second
//! if throttle.allow() {
//!     log::warn!("bad crc");
//! }
//! log_frame_hex("raw frame", &[0x03, 0xFD, 0x08]);
//! ```

use std::time::Instant;

/// Allows at most `cap` messages per `window_ms`.
#[derive(Debug)]
pub struct LogThrottle {
    window_ms: u64,
    cap: u32,
    count: u32,
    t0: Instant,
    suppressed: u64,
}

impl LogThrottle {
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
            suppressed: 0,
        }
    }

    /// Returns `true` if the message should be logged. A new window starts once the
    /// current one has expired.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            if self.suppressed > 0 {
                log::debug!("{} messages suppressed in last window", self.suppressed);
            }
            self.t0 = now;
            self.count = 0;
            self.suppressed = 0;
        }

        self.count = self.count.saturating_add(1);
        let allowed = self.count <= self.cap;
        if !allowed {
            self.suppressed += 1;
        }
        allowed
    }

    /// Starts a new window immediately.
    pub fn reset(&mut self) {
        self.t0 = Instant::now();
        self.count = 0;
        self.suppressed = 0;
    }
}

/// Logs `data` in compact hex at debug level.
pub fn log_frame_hex(prefix: &str, data: &[u8]) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("{prefix}: {}", crate::util::hex::format_hex_compact(data));
    }
}

/// Span around the handling of one completed frame.
#[cfg(feature = "tracing")]
pub fn span_frame_processing(source: &str) -> tracing::span::EnteredSpan {
    tracing::debug_span!("frame_processing", source = source).entered()
}

#[cfg(not(feature = "tracing"))]
pub fn span_frame_processing(_source: &str) {}
