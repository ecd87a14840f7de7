//! Observable replica state for invariant checks.

use std::collections::BTreeMap;

use roomsync_client::{Client, Phase};
use roomsync_core::Environment;
use roomsync_proto::{ClassMode, RoomStatus, UserId, UserStatus};

/// One participant's replica, reduced to what peers must agree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSnapshot {
    /// Whose replica this is.
    pub user_id: UserId,
    /// Owner of the room as this replica sees it.
    pub owner_id: UserId,
    /// Bootstrap phase.
    pub phase: Phase,
    /// Room lifecycle.
    pub lifecycle: RoomStatus,
    /// Class mode.
    pub mode: ClassMode,
    /// Message ban.
    pub message_banned: bool,
    /// Status of every roster user.
    pub statuses: BTreeMap<UserId, UserStatus>,
}

impl ReplicaSnapshot {
    /// Capture a client's replica.
    pub fn from_client<E: Environment>(client: &Client<E>) -> Self {
        let state = client.state();
        Self {
            user_id: state.local_user_id().to_owned(),
            owner_id: state.owner_id().to_owned(),
            phase: client.phase(),
            lifecycle: state.lifecycle(),
            mode: state.mode(),
            message_banned: state.message_banned(),
            statuses: state.users().iter().map(|u| (u.id().to_owned(), u.status)).collect(),
        }
    }

    /// Number of users on stage.
    pub fn speakers(&self) -> usize {
        self.statuses.values().filter(|s| s.is_speaking).count()
    }
}

/// Every replica in the system at one instant.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Replicas in join order.
    pub replicas: Vec<ReplicaSnapshot>,
}

impl SystemSnapshot {
    /// No replicas.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot over the given replicas.
    pub fn new(replicas: Vec<ReplicaSnapshot>) -> Self {
        Self { replicas }
    }

    /// Replicas whose bootstrap finished.
    pub fn ready(&self) -> impl Iterator<Item = &ReplicaSnapshot> {
        self.replicas.iter().filter(|r| r.phase.is_ready())
    }
}
