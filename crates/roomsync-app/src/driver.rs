//! I/O seams for the room runtime.
//!
//! The [`ChannelTransport`] and [`ProfileLookup`] traits decouple the runtime
//! from a concrete pub/sub service and user directory. Production wires in a
//! real messaging SDK and REST client; the simulation harness wires in an
//! in-memory hub.

use std::future::Future;

use roomsync_core::Profile;
use roomsync_proto::UserId;

/// Membership change or message on the room channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
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

    /// A message arrived, broadcast or addressed to us.
    MessageReceived {
        /// Sending user
        sender: UserId,
        /// Raw message text
        text: String,
    },
}

/// Ordered pub/sub channel for one room.
///
/// Delivery is best effort: messages may be lost, but those that arrive keep
/// the sender's order.
pub trait ChannelTransport: Send {
    /// Transport-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Join the channel and return its current members.
    fn join(
        &mut self,
        channel: &str,
    ) -> impl Future<Output = Result<Vec<UserId>, Self::Error>> + Send;

    /// Leave the channel.
    fn leave(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send to every member.
    fn broadcast(&mut self, text: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send to one member.
    fn send_direct(
        &mut self,
        target: &str,
        text: String,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next channel event, or `None` once the connection is gone.
    ///
    /// Must be cancel safe: the runtime polls it inside `select!`.
    fn next_event(&mut self) -> impl Future<Output = Option<ChannelEvent>> + Send;
}

/// Batched user directory.
pub trait ProfileLookup: Send + Sync {
    /// Lookup-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolve profiles. Unknown ids are omitted from the result.
    fn fetch_users(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send;
}
