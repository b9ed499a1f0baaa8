//! Fuzz target for Frame::decode
//!
//! Arbitrary bytes as a frame, then the header alone. Invalid input must
//! come back as an error, never a panic or an over-read.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scanrig_proto::{Frame, FrameHeader};

fuzz_target!(|data: &[u8]| {
    let _ = Frame::decode(data);

    if data.len() >= FrameHeader::SIZE {
        if let Ok(header) = FrameHeader::from_bytes(&data[..FrameHeader::SIZE]) {
            assert!(header.payload_size() <= FrameHeader::MAX_PAYLOAD_SIZE);
        }
    }
});
