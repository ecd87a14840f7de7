//! Error types for local intents.

use roomsync_proto::{RoomStatus, UserId};
use thiserror::Error;

/// Reasons a local intent is rejected.
///
/// A rejected intent emits nothing and leaves the replica untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Intent is reserved for the room owner
    #[error("only the room owner may {action}")]
    NotOwner {
        /// Intent that was attempted
        action: &'static str,
    },

    /// Target user is not in the roster
    #[error("unknown user: {user_id}")]
    UnknownUser {
        /// Requested target
        user_id: UserId,
    },

    /// Owners may turn remote devices off, never on
    #[error("cannot enable a device of remote user {user_id}")]
    CannotEnableRemoteDevice {
        /// Remote user
        user_id: UserId,
    },

    /// User is already on stage
    #[error("{user_id} is already speaking")]
    AlreadySpeaking {
        /// User on stage
        user_id: UserId,
    },

    /// The owner has no one to raise a hand to
    #[error("the room owner cannot raise a hand")]
    OwnerCannotRaiseHand,

    /// Stage is at capacity
    #[error("stage is full ({max} speakers)")]
    StageFull {
        /// Configured speaker limit
        max: usize,
    },

    /// Lifecycle does not allow the transition
    #[error("cannot {action} while room is {from:?}")]
    InvalidTransition {
        /// Current lifecycle
        from: RoomStatus,
        /// Intent that was attempted
        action: &'static str,
    },
}

impl ActionError {
    /// Returns true if the user should be told why nothing happened.
    ///
    /// Unknown targets come from a stale UI racing a leave event and are
    /// dropped quietly.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::UnknownUser { .. })
    }
}
