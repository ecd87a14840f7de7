//! Client events and actions.

use roomsync_core::{Intent, Profile, RoomNotice};
use roomsync_proto::{Command, UserId};

use crate::bootstrap::Phase;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Joining the channel and reporting its membership list
/// - Forwarding channel membership changes and messages
/// - Resolving profiles when asked to
/// - Driving time forward via ticks
///
/// Generic over `I` (Instant type) to support both production and simulated
/// clocks.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Channel join completed.
    Joined {
        /// Channel members at join time, possibly including the local user.
        members: Vec<UserId>,
    },

    /// Profile lookup completed. Users the lookup did not know are absent.
    ProfilesResolved {
        /// Resolved profiles
        profiles: Vec<Profile>,
    },

    /// Profile lookup failed.
    ProfileLookupFailed {
        /// Error reported by the lookup
        reason: String,
    },

    /// A user joined the channel.
    MemberJoined {
        /// New member
        user_id: UserId,
    },

    /// A user left the channel.
    MemberLeft {
        /// Departed member
        user_id: UserId,
    },

    /// Raw channel message. Decoded leniently.
    MessageReceived {
        /// Sending user
        sender: UserId,
        /// Message text
        text: String,
    },

    /// Already-decoded channel command.
    CommandReceived {
        /// Sending user
        sender: UserId,
        /// The command
        command: Command,
    },

    /// Local user action.
    Intent(Intent),

    /// Time tick for timeout processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

impl<I> ClientEvent<I> {
    /// Event kind, for logs and errors.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "Joined",
            Self::ProfilesResolved { .. } => "ProfilesResolved",
            Self::ProfileLookupFailed { .. } => "ProfileLookupFailed",
            Self::MemberJoined { .. } => "MemberJoined",
            Self::MemberLeft { .. } => "MemberLeft",
            Self::MessageReceived { .. } => "MessageReceived",
            Self::CommandReceived { .. } => "CommandReceived",
            Self::Intent(_) => "Intent",
            Self::Tick { .. } => "Tick",
        }
    }
}

/// Actions returned by the client for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Encode and broadcast to the room channel.
    Broadcast(Command),

    /// Encode and send to one member.
    SendDirect {
        /// Recipient
        target: UserId,
        /// Command to send
        command: Command,
    },

    /// Resolve these users' profiles and report back with
    /// [`ClientEvent::ProfilesResolved`] or [`ClientEvent::ProfileLookupFailed`].
    FetchProfiles {
        /// Users to resolve
        ids: Vec<UserId>,
    },

    /// Surface a notice to the application.
    Notice(RoomNotice),

    /// The replica became usable. Carries [`Phase::Synced`] or
    /// [`Phase::EmptyRoom`].
    Ready(Phase),

    /// The room was stopped. The caller should leave the channel.
    RoomStopped,
}
