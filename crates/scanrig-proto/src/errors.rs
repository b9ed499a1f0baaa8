//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or building frames and payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than the fixed header.
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Required length
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Payload is shorter than the header claims.
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload size announced by the header
        expected: usize,
        /// Payload bytes available
        actual: usize,
    },

    /// Magic bytes do not identify a scan rig frame.
    #[error("invalid magic number")]
    InvalidMagic,

    /// Header version is not supported by this build.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Header kind byte is not a known [`crate::MessageKind`].
    #[error("unknown message kind: {0:#04x}")]
    UnknownKind(u8),

    /// Payload exceeds [`crate::FrameHeader::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual size
        size: usize,
        /// Allowed size
        max: usize,
    },

    /// Frame kind does not match the payload being decoded.
    #[error("unexpected message kind: expected {expected:?}, got {actual:?}")]
    UnexpectedKind {
        /// Kind the decoder expected
        expected: crate::MessageKind,
        /// Kind found in the header
        actual: crate::MessageKind,
    },

    /// CBOR serialization failed.
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed.
    #[error("CBOR decode error: {0}")]
    CborDecode(String),
}
