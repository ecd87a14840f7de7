//! Join bootstrap.
//!
//! Brings a fresh replica up to date by asking one existing peer for a status
//! snapshot.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐ members ┌────────────────┐ profiles ┌──────────────────┐ snapshot ┌────────┐
//! │ Joining │────────>│ AwaitingRoster │─────────>│ AwaitingSnapshot │─────────>│ Synced │
//! └─────────┘         └────────────────┘          └──────────────────┘          └────────┘
//!      │ no peers             │ lookup error/timeout      │ all peers left
//!      ↓                      ↓                           ↓
//! ┌───────────┐          ┌────────┐                 ┌───────────┐
//! │ EmptyRoom │          │ Failed │                 │ EmptyRoom │
//! └───────────┘          └────────┘                 └───────────┘
//! ```
//!
//! A peer that leaves or stays silent past the peer response timeout is
//! replaced by another, untried peers first. So is a peer that turns out to be
//! bootstrapping too and asks us for a snapshot; with nobody else to ask, the
//! empty-room defaults apply. `Closed` is entered from any phase on teardown.

use roomsync_core::Environment;
use roomsync_proto::UserId;

/// Bootstrap phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for the channel membership list.
    Joining,
    /// Waiting for peer profiles.
    AwaitingRoster,
    /// Waiting for a peer's snapshot.
    AwaitingSnapshot,
    /// Replica matches the room.
    Synced,
    /// Nobody else was in the room; defaults applied.
    EmptyRoom,
    /// Bootstrap gave up. Leave and join again.
    Failed,
    /// Client was torn down.
    Closed,
}

impl Phase {
    /// Whether the replica is usable for intents and live commands.
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Synced | Self::EmptyRoom)
    }

    /// Whether the client accepts no further events.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// Whether the bootstrap is in flight.
    pub const fn is_bootstrapping(self) -> bool {
        matches!(self, Self::AwaitingRoster | Self::AwaitingSnapshot)
    }
}

/// Peer bookkeeping for one bootstrap.
#[derive(Debug, Clone)]
pub(crate) struct Bootstrap<I> {
    pub(crate) phase: Phase,
    pub(crate) started_at: Option<I>,
    pub(crate) requested_at: Option<I>,
    pub(crate) target: Option<UserId>,
    peers: Vec<UserId>,
    roster: Vec<UserId>,
    tried: Vec<UserId>,
}

impl<I: Copy> Bootstrap<I> {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Joining,
            started_at: None,
            requested_at: None,
            target: None,
            peers: Vec::new(),
            roster: Vec::new(),
            tried: Vec::new(),
        }
    }

    /// Records the remote members at join time, without duplicates or self.
    pub(crate) fn set_peers(&mut self, members: &[UserId], local: &str) {
        self.peers.clear();
        for member in members {
            if member != local && !self.peers.contains(member) {
                self.peers.push(member.clone());
            }
        }
        self.roster = self.peers.clone();
    }

    /// Peers that arrived after the join-time roster lookup was sent.
    pub(crate) fn late_peers(&self) -> Vec<UserId> {
        self.peers.iter().filter(|p| !self.roster.contains(p)).cloned().collect()
    }

    pub(crate) fn peers(&self) -> &[UserId] {
        &self.peers
    }

    pub(crate) fn add_peer(&mut self, user_id: &str) {
        if !self.peers.iter().any(|p| p == user_id) {
            self.peers.push(user_id.to_owned());
        }
    }

    /// Forgets a peer. Returns true if it was the current target.
    pub(crate) fn remove_peer(&mut self, user_id: &str) -> bool {
        self.peers.retain(|p| p != user_id);
        if self.target.as_deref() == Some(user_id) {
            self.target = None;
            return true;
        }
        false
    }

    /// Picks the next peer to ask, preferring ones not asked yet.
    ///
    /// Once every peer has been asked, the choice starts over among all of
    /// them. `avoid` is never chosen.
    pub(crate) fn choose_peer<E>(
        &mut self,
        env: &E,
        now: I,
        avoid: Option<&str>,
    ) -> Option<UserId>
    where
        E: Environment<Instant = I>,
    {
        let eligible: Vec<&UserId> =
            self.peers.iter().filter(|p| avoid != Some(p.as_str())).collect();
        let mut candidates: Vec<&UserId> =
            eligible.iter().copied().filter(|p| !self.tried.contains(p)).collect();
        if candidates.is_empty() {
            candidates = eligible;
        }
        let idx = env.random_index(candidates.len())?;
        let chosen: UserId = (*candidates.get(idx)?).clone();

        if !self.tried.contains(&chosen) {
            self.tried.push(chosen.clone());
        }
        self.target = Some(chosen.clone());
        self.requested_at = Some(now);
        Some(chosen)
    }
}
