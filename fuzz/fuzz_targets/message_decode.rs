//! Fuzz target for CBOR message decoding
//!
//! # Strategy
//!
//! - Random bytes: arbitrary payloads under every message kind
//! - Deeply nested: arrays/maps nested to arbitrary depth
//! - Huge lengths: CBOR claiming massive string/array lengths
//!
//! # Invariants
//!
//! - NEVER panic on malformed CBOR
//! - Huge claimed lengths are rejected, not allocated

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use scanrig_proto::{ClientMessage, Frame, FrameHeader, MessageKind, ServerMessage};

#[derive(Debug, Clone, Arbitrary)]
enum CborAttack {
    RandomBytes { bytes: Vec<u8> },
    DeeplyNested { depth: u8, map: bool },
    HugeLength { claimed_len_exponent: u8 },
}

const KINDS: [MessageKind; 3] = [MessageKind::Command, MessageKind::Reply, MessageKind::Notification];

fn decode_all(payload: &[u8]) {
    for kind in KINDS {
        let frame = Frame::new(FrameHeader::new(kind), payload.to_vec());
        let _ = ClientMessage::from_frame(&frame);
        let _ = ServerMessage::from_frame(&frame);
    }
}

fuzz_target!(|attack: CborAttack| {
    match attack {
        CborAttack::RandomBytes { bytes } => decode_all(&bytes),

        CborAttack::DeeplyNested { depth, map } => {
            let mut bytes = Vec::new();
            for _ in 0..(depth % 64) {
                if map {
                    bytes.extend_from_slice(&[0xA1, 0x61, b'a']);
                } else {
                    bytes.push(0x81);
                }
            }
            bytes.push(0x01);
            decode_all(&bytes);
        }

        CborAttack::HugeLength { claimed_len_exponent } => {
            let exponent = u32::from(claimed_len_exponent % 32);
            let claimed = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);

            for major in [0x7A, 0x9A, 0xBA] {
                let mut bytes = vec![major];
                bytes.extend_from_slice(&claimed.to_be_bytes());
                bytes.extend(std::iter::repeat(b'x').take((claimed as usize).min(8)));
                decode_all(&bytes);
            }
        }
    }
});
