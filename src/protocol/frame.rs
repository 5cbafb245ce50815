//! # Joseta Raw Frames and Parsed Records
//!
//! The sensor board sends fixed 15-byte measurement frames, little-endian and packed:
//!
//! ```text
//! +-------+---------+---------+-------+------+-----------+----------+-------+-------+
//! | flags | voltage | current | phase | temp | timestamp | reserved | error |  crc  |
//! |  u8   |   u16   |   u16   |  i8   |  u8  |    u32    |    u8    |  u8   |  u16  |
//! +-------+---------+---------+-------+------+-----------+----------+-------+-------+
//! ```
//!
//! The CRC covers the 13 bytes before it. Timestamps are seconds since the epoch the
//! driver established at the last reset handshake; [`parse`] turns them into absolute
//! RTC seconds.
//!
//! ## Usage
//!
//! ```rust
//! use joseta_rs::protocol::frame::{parse, RawFields, RawFrame};
//!
//! let raw = RawFrame::build(&RawFields {
//!     flags: 0x01,
//!     voltage: 2301,
//!     timestamp: 30,
//!     ..RawFields::default()
//! });
//! assert!(raw.verify());
//!
//! let record = parse(&raw, 1_000);
//! assert!(record.occupancy);
//! assert_eq!(record.time, 1_030);
//! ```

use crate::constants::{
    JOSETA_CRC_OFFSET, JOSETA_FLAG_OCCUPANCY, JOSETA_FLAG_RELAY, JOSETA_RAW_FRAME_SIZE,
};
use crate::error::JosetaError;
use crate::protocol::crc;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use nom::combinator::consumed;
use nom::number::complete::{le_i8, le_u16, le_u32, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use serde::Serialize;

bitflags! {
    /// Status bits in the first byte of a raw frame.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        /// Occupancy sensor tripped during the sample
        const OCCUPANCY = JOSETA_FLAG_OCCUPANCY;
        /// Load relay closed
        const RELAY     = JOSETA_FLAG_RELAY;
    }
}

/// Decoded view of every field in a raw frame, CRC included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFields {
    pub flags: u8,
    pub voltage: u16,
    pub current: u16,
    pub phase: i8,
    pub temperature: u8,
    pub timestamp: u32,
    pub reserved: u8,
    pub error: u8,
    pub crc: u16,
}

/// One complete raw frame as it came off the wire, after de-escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    bytes: [u8; JOSETA_RAW_FRAME_SIZE],
}

impl RawFrame {
    /// Wraps bytes without checking the CRC.
    pub fn from_bytes(bytes: [u8; JOSETA_RAW_FRAME_SIZE]) -> Self {
        RawFrame { bytes }
    }

    /// Encodes `fields` and stores a freshly computed CRC; `fields.crc` is ignored.
    pub fn build(fields: &RawFields) -> Self {
        let mut bytes = [0u8; JOSETA_RAW_FRAME_SIZE];
        bytes[0] = fields.flags;
        bytes[1..3].copy_from_slice(&fields.voltage.to_le_bytes());
        bytes[3..5].copy_from_slice(&fields.current.to_le_bytes());
        bytes[5] = fields.phase as u8;
        bytes[6] = fields.temperature;
        bytes[7..11].copy_from_slice(&fields.timestamp.to_le_bytes());
        bytes[11] = fields.reserved;
        bytes[12] = fields.error;
        let crc = crc::crc16(&bytes[..JOSETA_CRC_OFFSET]);
        bytes[JOSETA_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        RawFrame { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; JOSETA_RAW_FRAME_SIZE] {
        &self.bytes
    }

    pub fn flags(&self) -> FrameFlags {
        FrameFlags::from_bits_retain(self.bytes[0])
    }

    pub fn voltage(&self) -> u16 {
        u16::from_le_bytes([self.bytes[1], self.bytes[2]])
    }

    pub fn current(&self) -> u16 {
        u16::from_le_bytes([self.bytes[3], self.bytes[4]])
    }

    pub fn phase(&self) -> i8 {
        self.bytes[5] as i8
    }

    pub fn temperature(&self) -> u8 {
        self.bytes[6]
    }

    /// Device-relative seconds since the last handshake.
    pub fn timestamp(&self) -> u32 {
        u32::from_le_bytes([self.bytes[7], self.bytes[8], self.bytes[9], self.bytes[10]])
    }

    pub fn reserved(&self) -> u8 {
        self.bytes[11]
    }

    pub fn error(&self) -> u8 {
        self.bytes[12]
    }

    pub fn crc(&self) -> u16 {
        crc::stored_crc(&self.bytes)
    }

    pub fn computed_crc(&self) -> u16 {
        crc::computed_crc(&self.bytes)
    }

    pub fn verify(&self) -> bool {
        crc::verify(&self.bytes)
    }

    /// Checks the CRC, reporting both values on mismatch.
    pub fn verify_crc(&self) -> Result<(), JosetaError> {
        let expected = self.crc();
        let calculated = self.computed_crc();
        if expected == calculated {
            Ok(())
        } else {
            Err(JosetaError::InvalidChecksum {
                expected,
                calculated,
            })
        }
    }

    pub fn fields(&self) -> RawFields {
        RawFields {
            flags: self.bytes[0],
            voltage: self.voltage(),
            current: self.current(),
            phase: self.phase(),
            temperature: self.temperature(),
            timestamp: self.timestamp(),
            reserved: self.reserved(),
            error: self.error(),
            crc: self.crc(),
        }
    }
}

impl TryFrom<&[u8]> for RawFrame {
    type Error = JosetaError;

    /// Decodes exactly one raw frame; the CRC is not checked here.
    fn try_from(input: &[u8]) -> Result<Self, Self::Error> {
        if input.len() != JOSETA_RAW_FRAME_SIZE {
            return Err(JosetaError::FrameLength {
                expected: JOSETA_RAW_FRAME_SIZE,
                actual: input.len(),
            });
        }
        let (_, frame) = parse_frame(input).map_err(|e| JosetaError::NomError(format!("{e:?}")))?;
        Ok(frame)
    }
}

/// Field layout parser for one raw frame.
pub fn parse_fields(input: &[u8]) -> IResult<&[u8], RawFields> {
    let (rest, (flags, voltage, current, phase, temperature, timestamp, reserved, error, crc)) =
        tuple((
            le_u8, le_u16, le_u16, le_i8, le_u8, le_u32, le_u8, le_u8, le_u16,
        ))(input)?;
    Ok((
        rest,
        RawFields {
            flags,
            voltage,
            current,
            phase,
            temperature,
            timestamp,
            reserved,
            error,
            crc,
        },
    ))
}

/// Uses `nom` to take one raw frame off the front of an unescaped byte slice.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], RawFrame> {
    let (rest, (taken, _fields)) = consumed(parse_fields)(input)?;
    let mut bytes = [0u8; JOSETA_RAW_FRAME_SIZE];
    bytes.copy_from_slice(taken);
    Ok((rest, RawFrame { bytes }))
}

/// A measurement record with the epoch applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParsedRecord {
    pub occupancy: bool,
    pub relay: bool,
    pub voltage: u16,
    pub current: u16,
    pub phase: i8,
    pub temp: u8,
    /// Absolute RTC seconds.
    pub time: u64,
    pub error: u8,
}

impl ParsedRecord {
    /// Renders the record time as UTC, treating the RTC as Unix seconds.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.time)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

/// Converts a CRC-checked raw frame into a record. Never fails.
pub fn parse(raw: &RawFrame, epoch: u64) -> ParsedRecord {
    let flags = raw.flags();
    ParsedRecord {
        occupancy: flags.contains(FrameFlags::OCCUPANCY),
        relay: flags.contains(FrameFlags::RELAY),
        voltage: raw.voltage(),
        current: raw.current(),
        phase: raw.phase(),
        temp: raw.temperature(),
        time: epoch.wrapping_add(u64::from(raw.timestamp())),
        error: raw.error(),
    }
}
