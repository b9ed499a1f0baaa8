//! Command replies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProjectRecord, TransferHandle};

/// Outcome of a command.
pub type Response = Result<Reply, CommandFailure>;

/// Successful command outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Reply {
    /// Command accepted; nothing to return.
    Ack,
    /// Answer to `start`.
    ScanStarted {
        /// `false` when a session was already running and the call was a
        /// no-op
        accepted: bool,
    },
    /// Archive transfer opened.
    Transfer {
        /// Opaque descriptor from the transfer service
        handle: TransferHandle,
    },
    /// One page of projects.
    Projects {
        /// Hydrated records in catalog order
        records: Vec<ProjectRecord>,
    },
    /// Project removed.
    Deleted,
}

/// Failed command outcome. Messages are summaries meant for the user; they
/// never embed internal error values, except filesystem detail on delete.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum CommandFailure {
    /// Malformed input; nothing was changed.
    #[error("{0}")]
    Validation(String),
    /// Filesystem operation failed.
    #[error("{0}")]
    Filesystem(String),
    /// Archive transfer could not be opened.
    #[error("{0}")]
    Transfer(String),
    /// Catalog read or write failed.
    #[error("{0}")]
    Catalog(String),
}
