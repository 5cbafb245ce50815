//! # Frame CRC-16
//!
//! The sensor board protects every raw frame with a nibble-folding CRC-16. The
//! folded form below is arithmetically CRC-16/XMODEM (polynomial 0x1021, initial
//! value 0, no reflection, no final xor) but needs no lookup table, which is what
//! the board firmware runs.

use crate::constants::{JOSETA_CRC_OFFSET, JOSETA_RAW_FRAME_SIZE};

/// Computes the CRC over `data`.
///
/// # Examples
/// ```rust
/// use joseta_rs::protocol::crc::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x31C3);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        let mut x = ((crc >> 8) as u8) ^ byte;
        x ^= x >> 4;
        let x = x as u16;
        crc = (crc << 8) ^ (x << 12) ^ (x << 5) ^ x;
    }
    crc
}

/// Reads the CRC stored in the trailing two bytes of a raw frame (little-endian).
pub fn stored_crc(frame: &[u8; JOSETA_RAW_FRAME_SIZE]) -> u16 {
    u16::from_le_bytes([frame[JOSETA_CRC_OFFSET], frame[JOSETA_CRC_OFFSET + 1]])
}

/// Computes the CRC over everything but the trailing CRC field.
pub fn computed_crc(frame: &[u8; JOSETA_RAW_FRAME_SIZE]) -> u16 {
    crc16(&frame[..JOSETA_CRC_OFFSET])
}

/// Returns `true` if the stored CRC matches the computed one exactly.
pub fn verify(frame: &[u8; JOSETA_RAW_FRAME_SIZE]) -> bool {
    computed_crc(frame) == stored_crc(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_empty_is_zero() {
        assert_eq!(crc16(&[]), 0);
    }

    #[test]
    fn test_crc_single_bytes() {
        assert_eq!(crc16(&[0x00]), 0x0000);
        assert_eq!(crc16(&[0x01]), 0x1021);
    }

    #[test]
    fn test_crc_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_verify_reads_little_endian_crc() {
        let mut frame = [0u8; JOSETA_RAW_FRAME_SIZE];
        frame[0] = 0x01;
        let crc = computed_crc(&frame);
        frame[JOSETA_CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        assert!(verify(&frame));

        frame[JOSETA_CRC_OFFSET..].copy_from_slice(&crc.to_be_bytes());
        assert!(!verify(&frame));
    }
}
