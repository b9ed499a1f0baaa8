//! Property-based tests for frame parsing
//!
//! Headers and frames are parsed from untrusted network bytes, so these
//! properties cover arbitrary input rather than just well-formed examples.

use scanrig_proto::{
    ClientMessage, Command, Frame, FrameHeader, MessageKind, ProtocolError, SliderValue,
};
use proptest::prelude::*;

fn arbitrary_kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![
        Just(MessageKind::Command),
        Just(MessageKind::Reply),
        Just(MessageKind::Notification),
    ]
}

fn arbitrary_frame() -> impl Strategy<Value = Frame> {
    (arbitrary_kind(), any::<u32>(), prop::collection::vec(any::<u8>(), 0..512)).prop_map(
        |(kind, request_id, payload)| {
            let mut header = FrameHeader::new(kind);
            header.set_request_id(request_id);
            Frame::new(header, payload)
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: parsing arbitrary bytes never panics, and anything accepted
    /// serializes back to the same 16 bytes.
    #[test]
    fn prop_header_parse_is_total(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(header) = FrameHeader::from_bytes(&bytes) {
            prop_assert_eq!(&header.to_bytes()[..], &bytes[..FrameHeader::SIZE]);
            prop_assert!(header.kind().is_some());
        }
    }

    /// Property: cutting an encoded frame anywhere short of its full length
    /// is always rejected.
    #[test]
    fn prop_truncated_frames_are_rejected(frame in arbitrary_frame(), cut in any::<prop::sample::Index>()) {
        let wire = frame.to_vec()?;
        let cut = cut.index(wire.len());

        let result = Frame::decode(&wire[..cut]);
        prop_assert!(matches!(
            result,
            Err(ProtocolError::FrameTooShort { .. } | ProtocolError::FrameTruncated { .. })
        ), "unexpected result: {:?}", result);
    }

    /// Property: a whole encoded frame decodes to itself.
    #[test]
    fn prop_encoded_frame_decodes(frame in arbitrary_frame()) {
        let wire = frame.to_vec()?;
        prop_assert_eq!(Frame::decode(&wire)?, frame);
    }

    /// Property: slider commands survive the wire for any finite value and
    /// any control name, including names the gateway does not know.
    #[test]
    fn prop_slider_commands_survive_the_wire(
        request_id in any::<u32>(),
        name in "[a-zA-Z]{0,24}",
        value in -1.0e6f64..1.0e6,
        slide in any::<bool>(),
    ) {
        let interaction = if slide { "slide" } else { "commit" };
        let message = ClientMessage::new(request_id, Command::Slider {
            interaction: interaction.into(),
            name,
            value: SliderValue::Single(value),
        });

        let frame = message.clone().into_frame()?;
        prop_assert_eq!(ClientMessage::from_frame(&frame)?, message);
    }
}
