//! Frame header with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 16-byte structure serialized as raw binary
//! (Big Endian). The runtime reads exactly one header from the stream, learns
//! the payload length and message kind, and only then reads the payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Kind of message carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Client to server command
    Command,
    /// Server reply to a single command
    Reply,
    /// Server to client notification (unicast or broadcast)
    Notification,
}

impl MessageKind {
    /// Wire representation.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Command => 0x01,
            Self::Reply => 0x02,
            Self::Notification => 0x03,
        }
    }

    /// Parse a wire byte. `None` if unrecognized.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::Reply),
            0x03 => Some(Self::Notification),
            _ => None,
        }
    }
}

/// Fixed 16-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so every 16-byte pattern is a valid
/// value and the struct can be cast directly from untrusted network bytes.
/// Semantic validation (magic, version, kind, size) happens in
/// [`FrameHeader::from_bytes`].
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],      // 0x53434E52 ("SCNR" in ASCII)
    version: u8,         // 0x01
    kind: u8,            // MessageKind
    reserved: [u8; 2],   // zero
    request_id: [u8; 4], // u32 client nonce, echoed in replies
    pub(crate) payload_size: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header.
    pub const SIZE: usize = 16;

    /// Magic number: "SCNR" in ASCII.
    pub const MAGIC: u32 = 0x5343_4E52;

    /// Current protocol version.
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (1 MiB). Preview frames travel as references, so
    /// no message comes close to this.
    pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

    /// Create a new header for the given message kind.
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            kind: kind.to_u8(),
            reserved: [0; 2],
            request_id: [0; 4],
            payload_size: [0; 4],
        }
    }

    /// Parse header from network bytes (zero-copy).
    ///
    /// Trailing bytes after the header are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than 16 bytes are given
    /// - `ProtocolError::InvalidMagic` if the magic number is wrong
    /// - `ProtocolError::UnsupportedVersion` for any version but 0x01
    /// - `ProtocolError::UnknownKind` if the kind byte is unrecognized
    /// - `ProtocolError::PayloadTooLarge` if the announced payload exceeds
    ///   the maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        if MessageKind::from_u8(header.kind).is_none() {
            return Err(ProtocolError::UnknownKind(header.kind));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Message kind. Headers obtained through [`FrameHeader::from_bytes`] or
    /// [`FrameHeader::new`] always carry a known kind.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_u8(self.kind)
    }

    /// Client-assigned nonce for request/response correlation.
    #[must_use]
    pub fn request_id(&self) -> u32 {
        u32::from_be_bytes(self.request_id)
    }

    /// Set the request id.
    pub fn set_request_id(&mut self, request_id: u32) {
        self.request_id = request_id.to_be_bytes();
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
    }

    #[test]
    fn new_header_parses_back() {
        let mut header = FrameHeader::new(MessageKind::Reply);
        header.set_request_id(0xDEAD_BEEF);

        let bytes = header.to_bytes();
        let parsed = FrameHeader::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.kind(), Some(MessageKind::Reply));
        assert_eq!(parsed.request_id(), 0xDEAD_BEEF);
        assert_eq!(parsed.payload_size(), 0);
        assert_eq!(parsed.version(), FrameHeader::VERSION);
    }

    #[test]
    fn reject_short_buffer() {
        let result = FrameHeader::from_bytes(&[0u8; 10]);
        assert!(matches!(result, Err(ProtocolError::FrameTooShort { expected: 16, actual: 10 })));
    }

    #[test]
    fn reject_bad_magic() {
        let mut bytes = FrameHeader::new(MessageKind::Command).to_bytes();
        bytes[0] = b'X';
        assert_eq!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::InvalidMagic));
    }

    #[test]
    fn reject_unknown_version() {
        let mut bytes = FrameHeader::new(MessageKind::Command).to_bytes();
        bytes[4] = 0x02;
        assert_eq!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::UnsupportedVersion(2)));
    }

    #[test]
    fn reject_unknown_kind() {
        let mut bytes = FrameHeader::new(MessageKind::Command).to_bytes();
        bytes[5] = 0x7F;
        assert_eq!(FrameHeader::from_bytes(&bytes), Err(ProtocolError::UnknownKind(0x7F)));
    }

    #[test]
    fn reject_oversized_payload_claim() {
        let mut bytes = FrameHeader::new(MessageKind::Command).to_bytes();
        bytes[12..16].copy_from_slice(&(FrameHeader::MAX_PAYLOAD_SIZE + 1).to_be_bytes());
        assert!(matches!(
            FrameHeader::from_bytes(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }
}
