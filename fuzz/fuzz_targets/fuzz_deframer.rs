#![no_main]

use joseta_rs::protocol::deframer::{stuff_frame, Deframer};
use joseta_rs::protocol::frame::{parse, RawFrame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // arbitrary line noise must never panic
    let mut deframer = Deframer::new();
    for frame in deframer.feed_all(data) {
        let _ = frame.verify_crc();
        let _ = parse(&frame, u64::MAX);
    }

    // any 15 bytes must survive stuffing
    if let Ok(frame) = RawFrame::try_from(data.get(..15).unwrap_or(&[])) {
        let mut clean = Deframer::new();
        let decoded = clean.feed_all(&stuff_frame(&frame));
        assert_eq!(decoded, vec![frame]);
    }
});
