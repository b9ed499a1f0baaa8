//! Driver and executor error types.
//!
//! Provides strongly-typed errors for:
//! - Session management (registration, lookup)
//! - Outbound delivery (encoding, stream writes)

use std::fmt;

/// Errors from [`crate::ServerDriver::process_event`].
///
/// Command-level failures never show up here; they are answered to the
/// client as a [`scanrig_proto::CommandFailure`]. These are runtime bugs or
/// races between a connection closing and its traffic being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Session not found in registry.
    ///
    /// A command arrived for a session that was never accepted or already
    /// closed. Transient if the connection is being torn down.
    SessionNotFound(u64),

    /// Session already registered.
    ///
    /// Session ids are drawn at random; a collision means the runtime reused
    /// an id. Fatal for the new connection.
    SessionAlreadyExists(u64),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionAlreadyExists(id) => write!(f, "session already exists: {id}"),
        }
    }
}

impl std::error::Error for ServerError {}

/// Errors from writing a session's outbound queue to its stream.
#[derive(Debug)]
pub enum ExecutorError {
    /// Message could not be framed.
    ///
    /// A notification or reply exceeded the frame limit. The message is
    /// dropped; the session stays up.
    Encode {
        /// Session the message was for
        session_id: u64,
        /// Error message
        reason: String,
    },

    /// Send to session failed.
    ///
    /// The stream is closed or broken. Fatal for that session; the client
    /// can reconnect.
    SendFailed {
        /// Session that failed
        session_id: u64,
        /// Error message
        reason: String,
    },
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { session_id, reason } => {
                write!(f, "encode failed for session {session_id}: {reason}")
            },
            Self::SendFailed { session_id, reason } => {
                write!(f, "send failed for session {session_id}: {reason}")
            },
        }
    }
}

impl std::error::Error for ExecutorError {}
