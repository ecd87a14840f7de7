//! Client error types.

use std::time::Duration;

use roomsync_core::ActionError;
use thiserror::Error;

use crate::bootstrap::Phase;

/// Failures while bringing the replica up to date after a join.
///
/// Both are recoverable by leaving and joining again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// No snapshot arrived in time
    #[error("bootstrap timed out after {elapsed:?}")]
    Timeout {
        /// Time since join
        elapsed: Duration,
    },

    /// The roster could not be resolved
    #[error("profile lookup failed: {reason}")]
    ProfileLookup {
        /// Error reported by the lookup
        reason: String,
    },
}

/// Errors returned by [`crate::Client::handle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Replica is not ready for local intents
    #[error("room not ready (phase {phase:?})")]
    NotReady {
        /// Current phase
        phase: Phase,
    },

    /// Client was closed
    #[error("client closed")]
    Closed,

    /// Bootstrap failed
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// Local intent rejected
    #[error(transparent)]
    Action(#[from] ActionError),

    /// Event does not fit the current phase
    #[error("unexpected {event} in phase {phase:?}")]
    UnexpectedEvent {
        /// Event kind
        event: &'static str,
        /// Current phase
        phase: Phase,
    },
}

impl ClientError {
    /// Returns true if the session can continue or be retried.
    ///
    /// A closed client and protocol-order violations are final for this
    /// session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotReady { .. } | Self::Bootstrap(_) | Self::Action(_))
    }
}
