//! CBOR-encoded protocol messages.
//!
//! The frame header's [`MessageKind`] tells the decoder which top-level type
//! the payload holds; the payload itself is a serde-tagged CBOR value, so new
//! variants can be added without touching the header.
//!
//! # Invariants
//!
//! - Command frames carry a client-chosen request id. The matching reply
//!   frame echoes it; notifications always carry request id 0.
//! - Every command is answered by exactly one reply.

mod command;
mod notification;
mod reply;

pub use command::Command;
pub use notification::Notification;
pub use reply::{CommandFailure, Reply, Response};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, MessageKind,
    errors::{ProtocolError, Result},
};

/// Command sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    /// Correlation id echoed in the reply
    pub request_id: u32,
    /// Requested operation
    pub command: Command,
}

impl ClientMessage {
    /// Build a command message.
    #[must_use]
    pub fn new(request_id: u32, command: Command) -> Self {
        Self { request_id, command }
    }

    /// Encode into a command frame.
    pub fn into_frame(self) -> Result<Frame> {
        let mut header = FrameHeader::new(MessageKind::Command);
        header.set_request_id(self.request_id);
        Ok(Frame::new(header, encode_cbor(&self.command)?))
    }

    /// Decode a command frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnexpectedKind` if the frame is not a command
    /// - `ProtocolError::CborDecode` if the payload is not a valid command
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let kind = frame_kind(frame)?;
        if kind != MessageKind::Command {
            return Err(ProtocolError::UnexpectedKind {
                expected: MessageKind::Command,
                actual: kind,
            });
        }

        Ok(Self { request_id: frame.header.request_id(), command: decode_cbor(&frame.payload)? })
    }
}

/// Message sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Answer to one command
    Reply {
        /// Request id of the command being answered
        request_id: u32,
        /// Outcome
        response: Response,
    },
    /// State-change notification
    Notify(Notification),
}

impl ServerMessage {
    /// Successful reply.
    #[must_use]
    pub fn ok(request_id: u32, reply: Reply) -> Self {
        Self::Reply { request_id, response: Ok(reply) }
    }

    /// Failed reply.
    #[must_use]
    pub fn failed(request_id: u32, failure: CommandFailure) -> Self {
        Self::Reply { request_id, response: Err(failure) }
    }

    /// Encode into a reply or notification frame.
    pub fn into_frame(self) -> Result<Frame> {
        match self {
            Self::Reply { request_id, response } => {
                let mut header = FrameHeader::new(MessageKind::Reply);
                header.set_request_id(request_id);
                Ok(Frame::new(header, encode_cbor(&response)?))
            },
            Self::Notify(notification) => Ok(Frame::new(
                FrameHeader::new(MessageKind::Notification),
                encode_cbor(&notification)?,
            )),
        }
    }

    /// Decode a reply or notification frame.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        match frame_kind(frame)? {
            MessageKind::Reply => Ok(Self::Reply {
                request_id: frame.header.request_id(),
                response: decode_cbor(&frame.payload)?,
            }),
            MessageKind::Notification => Ok(Self::Notify(decode_cbor(&frame.payload)?)),
            actual @ MessageKind::Command => {
                Err(ProtocolError::UnexpectedKind { expected: MessageKind::Reply, actual })
            },
        }
    }
}

impl From<Notification> for ServerMessage {
    fn from(notification: Notification) -> Self {
        Self::Notify(notification)
    }
}

fn frame_kind(frame: &Frame) -> Result<MessageKind> {
    let raw = frame.header.to_bytes()[5];
    frame.header.kind().ok_or(ProtocolError::UnknownKind(raw))
}

fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
        return Err(ProtocolError::PayloadTooLarge {
            size: bytes.len(),
            max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
        });
    }

    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InteractionType, ProjectId, ProjectRecord, SliderValue};

    #[test]
    fn command_frame_carries_request_id() {
        let message = ClientMessage::new(7, Command::Delete { project_id: "42".to_string() });
        let frame = message.clone().into_frame().unwrap();

        assert_eq!(frame.header.kind(), Some(MessageKind::Command));
        assert_eq!(frame.header.request_id(), 7);
        assert_eq!(ClientMessage::from_frame(&frame).unwrap(), message);
    }

    #[test]
    fn slider_command_accepts_integer_values() {
        // Browsers send whole numbers as integers.
        #[derive(Serialize)]
        struct RawSlider<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
            interaction: &'a str,
            name: &'a str,
            value: i64,
        }

        let raw = RawSlider { kind: "slider", interaction: "slide", name: "rotor", value: 120 };
        let frame = Frame::new(FrameHeader::new(MessageKind::Command), encode_cbor(&raw).unwrap());

        let message = ClientMessage::from_frame(&frame).unwrap();
        assert_eq!(message.command, Command::Slider {
            interaction: InteractionType::Slide,
            name: "rotor".to_string(),
            value: SliderValue::Single(120.0),
        });
    }

    #[test]
    fn command_name_matches_wire_tag() {
        #[derive(serde::Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: String,
        }

        let commands = [
            Command::ImgArea { rect: crate::CropArea::default() },
            Command::GetProjects { page: 0, per_page: 10 },
            Command::RotorCalibrateSetHome,
            Command::Slider {
                interaction: InteractionType::Commit,
                name: "light".to_string(),
                value: SliderValue::Single(1.0),
            },
        ];

        for command in commands {
            let tagged: Tagged = decode_cbor(&encode_cbor(&command).unwrap()).unwrap();
            assert_eq!(tagged.kind, command.name());
        }
    }

    #[test]
    fn reply_frame_decodes_as_server_message() {
        let records = vec![ProjectRecord::new(ProjectId::new(3)).with_field("name", "vase")];
        let message = ServerMessage::ok(11, Reply::Projects { records });

        let frame = message.clone().into_frame().unwrap();
        assert_eq!(frame.header.kind(), Some(MessageKind::Reply));
        assert_eq!(ServerMessage::from_frame(&frame).unwrap(), message);
    }

    #[test]
    fn failure_reply_keeps_its_kind() {
        let message = ServerMessage::failed(2, CommandFailure::Validation("NOPE".to_string()));
        let frame = message.clone().into_frame().unwrap();
        assert_eq!(ServerMessage::from_frame(&frame).unwrap(), message);
    }

    #[test]
    fn client_decoder_rejects_notifications() {
        let frame = ServerMessage::Notify(Notification::DisableControls).into_frame().unwrap();
        assert!(matches!(
            ClientMessage::from_frame(&frame),
            Err(ProtocolError::UnexpectedKind { expected: MessageKind::Command, .. })
        ));
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let frame = Frame::new(FrameHeader::new(MessageKind::Command), vec![0xFF, 0x00, 0x13]);
        assert!(matches!(ClientMessage::from_frame(&frame), Err(ProtocolError::CborDecode(_))));
    }
}
