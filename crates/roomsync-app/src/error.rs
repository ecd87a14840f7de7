//! Runtime error types.

use roomsync_client::ClientError;
use roomsync_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the room runtime and its handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Channel transport failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Channel connection went away
    #[error("connection lost")]
    ConnectionLost,

    /// Client state machine rejected an event
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Outbound command could not be encoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Runtime loop is no longer running
    #[error("room runtime stopped")]
    Stopped,
}

impl RuntimeError {
    /// Returns true if the session is over and the room must be joined again.
    ///
    /// Rejected intents and encode failures leave the session running.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_) | Self::ConnectionLost | Self::Stopped => true,
            Self::Client(e) => !e.is_recoverable() || matches!(e, ClientError::Bootstrap(_)),
            Self::Protocol(_) => false,
        }
    }
}
