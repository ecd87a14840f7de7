//! Synchronous cluster of room clients.
//!
//! Drives several [`Client`] state machines over a single FIFO delivery queue
//! without any async runtime. Each step delivers one event to one client and
//! routes the resulting actions: broadcasts fan out to every other member,
//! direct sends go to their target, and profile lookups are answered from an
//! in-memory directory. A single queue keeps every sender's messages in order
//! for every receiver.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use roomsync_client::{Client, ClientAction, ClientConfig, ClientError, ClientEvent, RoomInfo};
use roomsync_core::{Environment, Intent, Profile, RoomNotice, RoomState, RoomType};
use roomsync_proto::{ProtocolError, UserId, encode, encode_for_channel};
use thiserror::Error;

use crate::{
    invariants::{InvariantRegistry, ReplicaSnapshot, SystemSnapshot, Violation},
    sim_env::{SimEnv, SimInstant},
};

/// Room id used by every cluster.
pub const ROOM_ID: &str = "room-1";

/// Owner id used by every cluster.
pub const OWNER_ID: &str = "teacher";

/// Steps [`Cluster::settle`] takes before giving up.
pub const MAX_SETTLE_STEPS: usize = 100_000;

/// Cluster errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// No client with this id
    #[error("no client {0}")]
    UnknownClient(UserId),

    /// Client id already in the room
    #[error("{0} already joined")]
    AlreadyJoined(UserId),

    /// A client rejected an event
    #[error("client {user_id}: {source}")]
    Client {
        /// Client that failed
        user_id: UserId,
        /// Underlying error
        source: ClientError,
    },

    /// A command could not be encoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Messages kept flowing past the step limit
    #[error("no quiescence after {steps} steps")]
    NoQuiescence {
        /// Steps taken
        steps: usize,
    },
}

struct Delivery {
    to: UserId,
    event: ClientEvent<SimInstant>,
}

/// Simulated room with several clients.
pub struct Cluster {
    env: SimEnv,
    room_type: RoomType,
    config: ClientConfig,
    clients: Vec<Client<SimEnv>>,
    directory: BTreeMap<UserId, Profile>,
    directory_offline: bool,
    inflight: VecDeque<Delivery>,
    notices: Vec<(UserId, RoomNotice)>,
    stopped: BTreeSet<UserId>,
}

impl Cluster {
    /// Empty room with the default client configuration.
    pub fn new(seed: u64, room_type: RoomType) -> Self {
        Self::with_config(seed, room_type, ClientConfig::default())
    }

    /// Empty room with a specific client configuration.
    pub fn with_config(seed: u64, room_type: RoomType, config: ClientConfig) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            room_type,
            config,
            clients: Vec::new(),
            directory: BTreeMap::new(),
            directory_offline: false,
            inflight: VecDeque::new(),
            notices: Vec::new(),
            stopped: BTreeSet::new(),
        }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Client configuration used for new members.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Make profile lookups fail, or recover.
    pub fn set_directory_offline(&mut self, offline: bool) {
        self.directory_offline = offline;
    }

    /// Join with devices off. Call [`Cluster::settle`] to finish the bootstrap.
    pub fn join(&mut self, user_id: &str) -> Result<(), ClusterError> {
        self.join_with_devices(user_id, false, false)
    }

    /// Join with the given device state.
    pub fn join_with_devices(
        &mut self,
        user_id: &str,
        camera_on: bool,
        mic_on: bool,
    ) -> Result<(), ClusterError> {
        if self.position(user_id).is_some() {
            return Err(ClusterError::AlreadyJoined(user_id.to_owned()));
        }

        let profile = Profile::new(user_id, user_id.to_uppercase());
        self.directory.insert(user_id.to_owned(), profile.clone());

        let mut members = self.ids();
        for member in &members {
            self.inflight.push_back(Delivery {
                to: member.clone(),
                event: ClientEvent::MemberJoined { user_id: user_id.to_owned() },
            });
        }
        members.push(user_id.to_owned());

        let info = RoomInfo::new(ROOM_ID, self.room_type, OWNER_ID, profile)
            .with_devices(camera_on, mic_on);
        self.clients.push(Client::new(self.env.clone(), self.config.clone(), info));
        tracing::debug!(user_id, members = members.len(), "cluster join");
        self.deliver_to(user_id, ClientEvent::Joined { members })
    }

    /// Remove a client. Everyone else sees it leave; messages still in flight
    /// to it are dropped.
    pub fn leave(&mut self, user_id: &str) -> Result<(), ClusterError> {
        let idx = self.position(user_id).ok_or_else(|| ClusterError::UnknownClient(user_id.into()))?;
        let mut client = self.clients.remove(idx);
        client.close();
        self.inflight.retain(|d| d.to != user_id);

        for member in self.ids() {
            self.inflight.push_back(Delivery {
                to: member,
                event: ClientEvent::MemberLeft { user_id: user_id.to_owned() },
            });
        }
        Ok(())
    }

    /// Perform a local intent on one client.
    pub fn perform(&mut self, user_id: &str, intent: Intent) -> Result<(), ClusterError> {
        self.deliver_to(user_id, ClientEvent::Intent(intent))
    }

    /// Queue a raw channel message for one client.
    pub fn inject(&mut self, to: &str, sender: &str, text: impl Into<String>) {
        self.inflight.push_back(Delivery {
            to: to.to_owned(),
            event: ClientEvent::MessageReceived { sender: sender.to_owned(), text: text.into() },
        });
    }

    /// Drop channel messages in flight to one client, as a lossy network
    /// would. Returns how many were lost.
    pub fn lose_messages_to(&mut self, user_id: &str) -> usize {
        let before = self.inflight.len();
        self.inflight.retain(|d| {
            d.to != user_id || !matches!(d.event, ClientEvent::MessageReceived { .. })
        });
        before - self.inflight.len()
    }

    /// Deliver one queued event. Returns false when nothing is in flight.
    pub fn step(&mut self) -> Result<bool, ClusterError> {
        let Some(Delivery { to, event }) = self.inflight.pop_front() else {
            return Ok(false);
        };
        if self.position(&to).is_none() {
            tracing::trace!(to = to.as_str(), kind = event.kind(), "dropped delivery to departed client");
            return Ok(true);
        }
        self.deliver_to(&to, event)?;
        Ok(true)
    }

    /// Deliver until nothing is in flight. Returns the number of deliveries.
    pub fn settle(&mut self) -> Result<usize, ClusterError> {
        for steps in 0..MAX_SETTLE_STEPS {
            if !self.step()? {
                return Ok(steps);
            }
        }
        Err(ClusterError::NoQuiescence { steps: MAX_SETTLE_STEPS })
    }

    /// Move the clock forward and tick every client.
    pub fn advance(&mut self, duration: std::time::Duration) -> Result<(), ClusterError> {
        self.env.advance(duration);
        let now = self.env.now();
        for id in self.ids() {
            self.deliver_to(&id, ClientEvent::Tick { now })?;
        }
        Ok(())
    }

    /// Member ids in join order.
    pub fn ids(&self) -> Vec<UserId> {
        self.clients.iter().map(|c| c.local_user_id().to_owned()).collect()
    }

    /// One client.
    pub fn client(&self, user_id: &str) -> Option<&Client<SimEnv>> {
        self.clients.iter().find(|c| c.local_user_id() == user_id)
    }

    /// One client's replica.
    pub fn state(&self, user_id: &str) -> Option<&RoomState> {
        self.client(user_id).map(Client::state)
    }

    /// Events still in flight.
    pub fn pending(&self) -> usize {
        self.inflight.len()
    }

    /// Notices surfaced so far, with the client that surfaced them.
    pub fn notices(&self) -> &[(UserId, RoomNotice)] {
        &self.notices
    }

    /// Whether a client saw the room stop.
    pub fn saw_stop(&self, user_id: &str) -> bool {
        self.stopped.contains(user_id)
    }

    /// Observable state of every replica.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::new(self.clients.iter().map(ReplicaSnapshot::from_client).collect())
    }

    /// Run invariants against the current state.
    pub fn check(&self, registry: &InvariantRegistry) -> Result<(), Vec<Violation>> {
        registry.check_all(&self.snapshot())
    }

    fn position(&self, user_id: &str) -> Option<usize> {
        self.clients.iter().position(|c| c.local_user_id() == user_id)
    }

    fn deliver_to(
        &mut self,
        user_id: &str,
        event: ClientEvent<SimInstant>,
    ) -> Result<(), ClusterError> {
        let idx = self.position(user_id).ok_or_else(|| ClusterError::UnknownClient(user_id.into()))?;
        let client = &mut self.clients[idx];
        let actions = client
            .handle(event)
            .map_err(|source| ClusterError::Client { user_id: user_id.to_owned(), source })?;
        self.route(user_id, actions)
    }

    fn route(&mut self, from: &str, actions: Vec<ClientAction>) -> Result<(), ClusterError> {
        for action in actions {
            match action {
                ClientAction::Broadcast(command) => {
                    let text = encode(&command)?;
                    for member in self.ids() {
                        if member != from {
                            self.inject(&member, from, text.clone());
                        }
                    }
                },
                ClientAction::SendDirect { target, command } => {
                    let text = encode_for_channel(&command, ROOM_ID)?;
                    self.inject(&target, from, text);
                },
                ClientAction::FetchProfiles { ids } => {
                    let event = if self.directory_offline {
                        ClientEvent::ProfileLookupFailed { reason: "directory offline".into() }
                    } else {
                        let profiles =
                            ids.iter().filter_map(|id| self.directory.get(id).cloned()).collect();
                        ClientEvent::ProfilesResolved { profiles }
                    };
                    self.inflight.push_back(Delivery { to: from.to_owned(), event });
                },
                ClientAction::Notice(notice) => self.notices.push((from.to_owned(), notice)),
                ClientAction::Ready(phase) => {
                    tracing::debug!(user_id = from, ?phase, "replica ready");
                },
                ClientAction::RoomStopped => {
                    self.stopped.insert(from.to_owned());
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use roomsync_client::Phase;

    use super::*;

    #[test]
    fn first_member_lands_in_empty_room() {
        let mut cluster = Cluster::new(1, RoomType::SmallClass);
        cluster.join(OWNER_ID).unwrap();
        assert_eq!(cluster.settle().unwrap(), 0);
        assert_eq!(cluster.client(OWNER_ID).unwrap().phase(), Phase::EmptyRoom);
    }

    #[test]
    fn second_member_syncs_from_first() {
        let mut cluster = Cluster::new(1, RoomType::SmallClass);
        cluster.join(OWNER_ID).unwrap();
        cluster.join("s1").unwrap();
        assert!(cluster.settle().unwrap() > 0);

        assert_eq!(cluster.client("s1").unwrap().phase(), Phase::Synced);
        assert!(cluster.check(&InvariantRegistry::standard()).is_ok());
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut cluster = Cluster::new(1, RoomType::SmallClass);
        cluster.join(OWNER_ID).unwrap();
        assert_eq!(cluster.join(OWNER_ID), Err(ClusterError::AlreadyJoined(OWNER_ID.into())));
    }

    #[test]
    fn departed_client_gets_nothing() {
        let mut cluster = Cluster::new(1, RoomType::SmallClass);
        cluster.join(OWNER_ID).unwrap();
        cluster.join("s1").unwrap();
        cluster.leave("s1").unwrap();
        cluster.settle().unwrap();

        assert!(cluster.client("s1").is_none());
        assert!(!cluster.state(OWNER_ID).unwrap().contains("s1"));
    }
}
