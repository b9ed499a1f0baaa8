//! Scan rig wire protocol.
//!
//! Every message between a UI client and the gateway is a [`Frame`]: a fixed
//! 16-byte binary [`FrameHeader`] followed by a CBOR payload. The header
//! carries the message kind and the request id used to correlate replies with
//! commands, so the server can route a frame without decoding its payload.
//!
//! # Components
//!
//! - [`FrameHeader`] / [`Frame`]: transport envelope
//! - [`ClientMessage`] / [`ServerMessage`]: typed payloads
//! - [`Command`], [`Notification`], [`Reply`], [`CommandFailure`]: the
//!   request/response and broadcast vocabulary
//! - [`types`]: domain values shared by both ends (project ids, sliders, crop
//!   area)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod frame;
mod header;
pub mod messages;
pub mod types;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::{FrameHeader, MessageKind};
pub use messages::{
    ClientMessage, Command, CommandFailure, Notification, Reply, Response, ServerMessage,
};
pub use types::{
    CropArea, InteractionType, ProjectId, ProjectIdError, ProjectRecord, SliderControl,
    SliderOptions, SliderValue, TransferHandle,
};

/// ALPN protocol identifier negotiated during the QUIC handshake.
pub const ALPN_PROTOCOL: &[u8] = b"scanrig/1";
