//! Tests for the raw frame layout and record conversion in `protocol/frame.rs`.

use joseta_rs::protocol::frame::{parse, parse_frame, FrameFlags, RawFields, RawFrame};
use joseta_rs::JosetaError;

const SAMPLE: [u8; 15] = [
    0x03, 0xFD, 0x08, 0x96, 0x00, 0xF4, 0x19, 0x10, 0x0E, 0x00, 0x00, 0x00, 0x00, 0x55, 0xDE,
];

/// Tests that every field of the sample frame decodes at its offset.
#[test]
fn test_sample_fields() {
    let frame = RawFrame::from_bytes(SAMPLE);
    assert_eq!(frame.flags(), FrameFlags::OCCUPANCY | FrameFlags::RELAY);
    assert_eq!(frame.voltage(), 2301);
    assert_eq!(frame.current(), 150);
    assert_eq!(frame.phase(), -12);
    assert_eq!(frame.temperature(), 25);
    assert_eq!(frame.timestamp(), 3600);
    assert_eq!(frame.reserved(), 0);
    assert_eq!(frame.error(), 0);
    assert_eq!(frame.crc(), 0xDE55);
    assert!(frame.verify());
}

/// Tests that the record adds the epoch to the frame timestamp.
#[test]
fn test_parse_applies_epoch() {
    let record = parse(&RawFrame::from_bytes(SAMPLE), 1_700_000_000);
    assert!(record.occupancy);
    assert!(record.relay);
    assert_eq!(record.voltage, 2301);
    assert_eq!(record.current, 150);
    assert_eq!(record.phase, -12);
    assert_eq!(record.temp, 25);
    assert_eq!(record.time, 1_700_003_600);
    assert_eq!(record.error, 0);
}

/// Tests that the record time renders as a UTC date.
#[test]
fn test_record_datetime() {
    let record = parse(&RawFrame::from_bytes(SAMPLE), 0);
    let when = record.datetime().unwrap();
    assert_eq!(when.to_rfc3339(), "1970-01-01T01:00:00+00:00");
}

/// Tests that building from fields reproduces the sample bytes, CRC included.
#[test]
fn test_build_matches_sample() {
    let fields = RawFields {
        flags: 0x03,
        voltage: 2301,
        current: 150,
        phase: -12,
        temperature: 25,
        timestamp: 3600,
        ..RawFields::default()
    };
    let frame = RawFrame::build(&fields);
    assert_eq!(frame.as_bytes(), &SAMPLE);
    assert_eq!(frame.fields().crc, 0xDE55);
}

/// Tests the nom parser on a longer input.
#[test]
fn test_parse_frame_leaves_remainder() {
    let mut input = SAMPLE.to_vec();
    input.extend_from_slice(&[0xAA, 0xBB]);
    let (rest, frame) = parse_frame(&input).unwrap();
    assert_eq!(rest, &[0xAA, 0xBB]);
    assert_eq!(frame.as_bytes(), &SAMPLE);
}

/// Tests that slices of the wrong length are refused.
#[test]
fn test_try_from_wrong_length() {
    let err = RawFrame::try_from(&SAMPLE[..14]).unwrap_err();
    assert!(matches!(
        err,
        JosetaError::FrameLength {
            expected: 15,
            actual: 14
        }
    ));
    assert!(RawFrame::try_from(&SAMPLE[..]).is_ok());
}

/// Tests that a corrupted frame reports both CRC values.
#[test]
fn test_verify_crc_error() {
    let mut bytes = SAMPLE;
    bytes[1] ^= 0x01;
    let frame = RawFrame::from_bytes(bytes);
    match frame.verify_crc() {
        Err(JosetaError::InvalidChecksum {
            expected,
            calculated,
        }) => {
            assert_eq!(expected, 0xDE55);
            assert_ne!(calculated, expected);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

/// Tests that unknown flag bits do not leak into the record booleans.
#[test]
fn test_flags_ignore_unknown_bits() {
    let frame = RawFrame::build(&RawFields {
        flags: 0xF0,
        ..RawFields::default()
    });
    let record = parse(&frame, 0);
    assert!(!record.occupancy);
    assert!(!record.relay);
}
