//! # Escape/Resync De-framer
//!
//! The board prefixes each frame with `0xFF` and escapes any payload byte equal to
//! `0xFF` or `0xFE` by sending `0xFE` before it. The decoder is byte-at-a-time so it
//! can sit directly behind the UART byte queue:
//!
//! - an escaped byte is always payload, even if it equals a sentinel
//! - an unescaped `0xFE` arms the escape and is dropped
//! - an unescaped `0xFF` restarts the frame, silently discarding any partial bytes
//! - anything else is payload
//!
//! A frame is yielded the moment its 15th payload byte lands; partial frames are never
//! yielded.

use crate::constants::{JOSETA_ESCAPE_BYTE, JOSETA_RAW_FRAME_SIZE, JOSETA_START_BYTE};
use crate::protocol::frame::RawFrame;
use bytes::{BufMut, BytesMut};

/// Stateful stream decoder. One per link.
#[derive(Debug, Clone)]
pub struct Deframer {
    buffer: [u8; JOSETA_RAW_FRAME_SIZE],
    index: usize,
    inside_escape: bool,
    resyncs: u64,
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer {
    pub fn new() -> Self {
        Deframer {
            buffer: [0u8; JOSETA_RAW_FRAME_SIZE],
            index: 0,
            inside_escape: false,
            resyncs: 0,
        }
    }

    /// Feeds one received byte; returns a frame when this byte completed one.
    pub fn feed(&mut self, byte: u8) -> Option<RawFrame> {
        if self.inside_escape {
            self.inside_escape = false;
            self.push(byte)
        } else if byte == JOSETA_ESCAPE_BYTE {
            self.inside_escape = true;
            None
        } else if byte == JOSETA_START_BYTE {
            if self.index != 0 {
                log::trace!("resync: discarding {} buffered bytes", self.index);
                self.resyncs += 1;
            }
            self.index = 0;
            None
        } else {
            self.push(byte)
        }
    }

    /// Feeds a whole slice, collecting every completed frame in order.
    pub fn feed_all(&mut self, data: &[u8]) -> Vec<RawFrame> {
        data.iter().filter_map(|&b| self.feed(b)).collect()
    }

    fn push(&mut self, byte: u8) -> Option<RawFrame> {
        self.buffer[self.index] = byte;
        self.index += 1;
        if self.index == JOSETA_RAW_FRAME_SIZE {
            self.index = 0;
            Some(RawFrame::from_bytes(self.buffer))
        } else {
            None
        }
    }

    /// Payload bytes buffered towards the next frame.
    pub fn buffered(&self) -> usize {
        self.index
    }

    pub fn is_inside_escape(&self) -> bool {
        self.inside_escape
    }

    /// Number of start sentinels that threw away a partial frame.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Drops any partial frame and pending escape.
    pub fn reset(&mut self) {
        self.index = 0;
        self.inside_escape = false;
    }
}

/// Encodes a frame the way the board puts it on the wire: start sentinel followed by
/// the escaped frame bytes.
pub fn stuff_frame(frame: &RawFrame) -> BytesMut {
    let mut out = BytesMut::with_capacity(1 + 2 * JOSETA_RAW_FRAME_SIZE);
    out.put_u8(JOSETA_START_BYTE);
    for &byte in frame.as_bytes() {
        if byte == JOSETA_START_BYTE || byte == JOSETA_ESCAPE_BYTE {
            out.put_u8(JOSETA_ESCAPE_BYTE);
        }
        out.put_u8(byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::RawFields;

    fn frame_with_sentinels() -> RawFrame {
        RawFrame::build(&RawFields {
            flags: 0x01,
            voltage: 0xFEFF,
            current: 0x00FF,
            timestamp: 0xFFFE_FEFF,
            ..RawFields::default()
        })
    }

    #[test]
    fn test_stuffed_frame_round_trips() {
        let frame = frame_with_sentinels();
        let mut deframer = Deframer::new();
        let frames = deframer.feed_all(&stuff_frame(&frame));
        assert_eq!(frames, vec![frame]);
        assert_eq!(deframer.buffered(), 0);
        assert!(!deframer.is_inside_escape());
    }

    #[test]
    fn test_start_byte_discards_partial() {
        let frame = frame_with_sentinels();
        let mut deframer = Deframer::new();
        assert!(deframer.feed_all(&[0x01, 0x02, 0x03]).is_empty());
        assert_eq!(deframer.buffered(), 3);

        let frames = deframer.feed_all(&stuff_frame(&frame));
        assert_eq!(frames, vec![frame]);
        assert_eq!(deframer.resyncs(), 1);
    }

    #[test]
    fn test_escaped_start_byte_is_payload() {
        let mut deframer = Deframer::new();
        deframer.feed(0x10);
        deframer.feed(JOSETA_ESCAPE_BYTE);
        assert!(deframer.is_inside_escape());
        deframer.feed(JOSETA_START_BYTE);
        assert_eq!(deframer.buffered(), 2);
        assert_eq!(deframer.resyncs(), 0);
    }

    #[test]
    fn test_frame_without_start_byte_still_completes() {
        let frame = frame_with_sentinels();
        let stuffed = stuff_frame(&frame);
        let mut deframer = Deframer::new();
        assert_eq!(deframer.feed_all(&stuffed[1..]), vec![frame]);
    }

    #[test]
    fn test_reset_clears_escape() {
        let mut deframer = Deframer::new();
        deframer.feed(0x22);
        deframer.feed(JOSETA_ESCAPE_BYTE);
        deframer.reset();
        assert_eq!(deframer.buffered(), 0);
        assert!(!deframer.is_inside_escape());
    }
}
