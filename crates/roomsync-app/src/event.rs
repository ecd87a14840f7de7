//! Room events published to subscribers.

use roomsync_client::Phase;
use roomsync_core::RoomNotice;

/// One-shot room occurrence, delivered on the room event stream.
///
/// Current state is delivered separately as a
/// [`RoomState`](roomsync_core::RoomState) watch value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Replica became usable.
    Ready(Phase),

    /// Peer notice or protocol anomaly.
    Notice(RoomNotice),

    /// Bootstrap failed. Join again to retry.
    BootstrapFailed {
        /// Failure description
        reason: String,
    },

    /// An outbound message could not be sent.
    SendFailed {
        /// Failure description
        reason: String,
    },

    /// Channel connection went away.
    ConnectionLost,

    /// The owner stopped the room.
    RoomStopped,

    /// The runtime left the channel.
    Left,
}
