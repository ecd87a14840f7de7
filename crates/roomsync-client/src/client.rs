//! Client state machine.
//!
//! The `Client` owns one participant's replica of one room. It runs the join
//! bootstrap, feeds peer commands through the reducer once the replica is
//! ready, and turns local intents into broadcasts.

use std::collections::VecDeque;

use roomsync_core::{
    DispatchEffect, Environment, Intent, Profile, RoomNotice, RoomState, dispatch, translate,
};
use roomsync_proto::{
    Command, RequestChannelStatus, RequesterInfo, RoomStatus, UserId, UserStatus, decode,
};

use crate::{
    bootstrap::{Bootstrap, Phase},
    config::{ClientConfig, MAX_PENDING_COMMANDS, RoomInfo},
    error::{BootstrapError, ClientError},
    event::{ClientAction, ClientEvent},
};

/// Room client for one participant.
pub struct Client<E: Environment> {
    /// Environment for randomness and time.
    env: E,

    /// Timeouts and stage limits.
    config: ClientConfig,

    /// Local replica.
    state: RoomState,

    /// Join bootstrap progress.
    bootstrap: Bootstrap<E::Instant>,

    /// Peer commands received before the replica was ready, in arrival order.
    pending: VecDeque<(UserId, Command)>,
}

impl<E: Environment> Client<E> {
    /// Create a client for a room it has not joined yet.
    pub fn new(env: E, config: ClientConfig, room: RoomInfo) -> Self {
        let RoomInfo { room_id, room_type, owner_id, local, local_status } = room;
        let local_id = local.id.clone();
        let mut state = RoomState::new(room_id, room_type, owner_id, local);
        state.update_status(&local_id, |s| *s = local_status);

        Self { env, config, state, bootstrap: Bootstrap::new(), pending: VecDeque::new() }
    }

    /// Current replica.
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// Current bootstrap phase.
    pub fn phase(&self) -> Phase {
        self.bootstrap.phase
    }

    /// Whether the replica is usable.
    pub fn is_ready(&self) -> bool {
        self.bootstrap.phase.is_ready()
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Local user id.
    pub fn local_user_id(&self) -> &str {
        self.state.local_user_id()
    }

    /// Peer currently asked for a snapshot, if any.
    pub fn snapshot_target(&self) -> Option<&str> {
        self.bootstrap.target.as_deref()
    }

    /// Tear the client down. Every later event is rejected.
    pub fn close(&mut self) {
        if self.bootstrap.phase != Phase::Closed {
            tracing::debug!(room = self.state.room_id(), "client closed");
        }
        self.bootstrap.phase = Phase::Closed;
        self.pending.clear();
    }

    /// Process an event and return resulting actions.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match self.bootstrap.phase {
            Phase::Closed => return Err(ClientError::Closed),
            Phase::Failed => {
                return Err(ClientError::NotReady { phase: Phase::Failed });
            },
            _ => {},
        }

        match event {
            ClientEvent::Joined { members } => self.handle_joined(&members),
            ClientEvent::ProfilesResolved { profiles } => Ok(self.handle_profiles(profiles)),
            ClientEvent::ProfileLookupFailed { reason } => self.handle_lookup_failed(reason),
            ClientEvent::MemberJoined { user_id } => Ok(self.handle_member_joined(&user_id)),
            ClientEvent::MemberLeft { user_id } => Ok(self.handle_member_left(&user_id)),
            ClientEvent::MessageReceived { sender, text } => {
                Ok(self.handle_command(sender, decode(&text)))
            },
            ClientEvent::CommandReceived { sender, command } => {
                Ok(self.handle_command(sender, command))
            },
            ClientEvent::Intent(intent) => self.handle_intent(intent),
            ClientEvent::Tick { now } => self.handle_tick(now),
        }
    }

    fn handle_joined(&mut self, members: &[UserId]) -> Result<Vec<ClientAction>, ClientError> {
        if self.bootstrap.phase != Phase::Joining {
            return Err(ClientError::UnexpectedEvent {
                event: "Joined",
                phase: self.bootstrap.phase,
            });
        }

        self.bootstrap.started_at = Some(self.env.now());
        self.bootstrap.set_peers(members, self.state.local_user_id());

        if self.bootstrap.peers().is_empty() {
            return Ok(self.enter_empty_room());
        }

        self.bootstrap.phase = Phase::AwaitingRoster;
        tracing::debug!(
            room = self.state.room_id(),
            peers = self.bootstrap.peers().len(),
            "joined, resolving roster"
        );
        Ok(vec![ClientAction::FetchProfiles { ids: self.bootstrap.peers().to_vec() }])
    }

    fn handle_profiles(&mut self, profiles: Vec<Profile>) -> Vec<ClientAction> {
        if self.bootstrap.phase != Phase::AwaitingRoster {
            for profile in profiles {
                self.state.refresh_profile(profile);
            }
            return Vec::new();
        }

        for profile in profiles {
            if self.bootstrap.peers().contains(&profile.id) {
                self.state.upsert_profile(profile);
            }
        }
        let unresolved: Vec<UserId> = self
            .bootstrap
            .peers()
            .iter()
            .filter(|id| !self.state.contains(id))
            .cloned()
            .collect();
        for id in unresolved {
            tracing::debug!(user_id = id.as_str(), "profile not found, using placeholder");
            self.state.upsert_profile(Profile::placeholder(id));
        }

        // Members who joined while the lookup was in flight were not part of it.
        let late = self.bootstrap.late_peers();
        let mut actions = Vec::new();
        if !late.is_empty() {
            tracing::debug!(count = late.len(), "resolving members who joined during lookup");
            actions.push(ClientAction::FetchProfiles { ids: late });
        }
        actions.extend(self.request_snapshot(None));
        actions
    }

    fn handle_lookup_failed(&mut self, reason: String) -> Result<Vec<ClientAction>, ClientError> {
        if self.bootstrap.phase == Phase::AwaitingRoster {
            tracing::warn!(room = self.state.room_id(), %reason, "roster lookup failed");
            self.fail();
            return Err(BootstrapError::ProfileLookup { reason }.into());
        }
        Ok(vec![ClientAction::Notice(RoomNotice::ProfileLookupFailed { reason })])
    }

    fn handle_member_joined(&mut self, user_id: &str) -> Vec<ClientAction> {
        if user_id == self.state.local_user_id() || self.bootstrap.phase == Phase::Joining {
            return Vec::new();
        }
        if self.bootstrap.phase.is_bootstrapping() {
            self.bootstrap.add_peer(user_id);
        }
        if self.bootstrap.phase == Phase::AwaitingRoster || self.state.contains(user_id) {
            return Vec::new();
        }

        self.state.upsert_profile(Profile::placeholder(user_id));
        vec![ClientAction::FetchProfiles { ids: vec![user_id.to_owned()] }]
    }

    fn handle_member_left(&mut self, user_id: &str) -> Vec<ClientAction> {
        self.state.remove(user_id);
        let was_target = self.bootstrap.remove_peer(user_id);

        if self.bootstrap.phase == Phase::AwaitingSnapshot && was_target {
            tracing::debug!(user_id, "snapshot peer left, choosing another");
            return self.request_snapshot(None);
        }
        Vec::new()
    }

    fn handle_command(&mut self, sender: UserId, command: Command) -> Vec<ClientAction> {
        let phase = self.bootstrap.phase;
        if phase.is_ready() {
            return self.apply_command(&sender, &command);
        }

        if phase == Phase::AwaitingSnapshot
            && let Command::ChannelStatus(snapshot) = &command
        {
            tracing::debug!(
                room = self.state.room_id(),
                from = sender.as_str(),
                "snapshot received"
            );
            let stopped = dispatch::apply_snapshot(&mut self.state, snapshot);
            let mut actions = self.finish(Phase::Synced);
            if stopped {
                actions.push(ClientAction::RoomStopped);
            }
            return actions;
        }

        // Our snapshot peer is itself bootstrapping and waiting on us.
        let mutual = phase == Phase::AwaitingSnapshot
            && self.bootstrap.target.as_deref() == Some(sender.as_str())
            && matches!(&command, Command::RequestChannelStatus(request)
                if request.targets.iter().any(|t| t == self.state.local_user_id()));

        if self.pending.len() >= MAX_PENDING_COMMANDS {
            tracing::warn!(dropped = self.pending.len(), "pending command buffer full");
            self.pending.pop_front();
        }
        self.pending.push_back((sender.clone(), command));

        if mutual {
            tracing::debug!(peer = sender.as_str(), "snapshot peer waiting on us, asking another");
            return self.request_snapshot(Some(&sender));
        }
        Vec::new()
    }

    fn handle_intent(&mut self, intent: Intent) -> Result<Vec<ClientAction>, ClientError> {
        let phase = self.bootstrap.phase;
        if !phase.is_ready() {
            return Err(ClientError::NotReady { phase });
        }

        let before = self.state.lifecycle();
        let name = intent.name();
        let commands = translate(&mut self.state, intent, &self.config.stage).map_err(|e| {
            tracing::debug!(intent = name, error = %e, "intent rejected");
            e
        })?;

        let mut actions: Vec<ClientAction> =
            commands.into_iter().map(ClientAction::Broadcast).collect();
        if before != RoomStatus::Stopped && self.state.lifecycle() == RoomStatus::Stopped {
            actions.push(ClientAction::RoomStopped);
        }
        Ok(actions)
    }

    fn handle_tick(&mut self, now: E::Instant) -> Result<Vec<ClientAction>, ClientError> {
        if !self.bootstrap.phase.is_bootstrapping() {
            return Ok(Vec::new());
        }

        if let Some(started) = self.bootstrap.started_at {
            let elapsed = now - started;
            if elapsed >= self.config.bootstrap_timeout {
                tracing::warn!(room = self.state.room_id(), ?elapsed, "bootstrap timed out");
                self.fail();
                return Err(BootstrapError::Timeout { elapsed }.into());
            }
        }

        if self.bootstrap.phase == Phase::AwaitingSnapshot
            && let Some(requested) = self.bootstrap.requested_at
            && now - requested >= self.config.peer_response_timeout
        {
            tracing::debug!(
                peer = self.bootstrap.target.as_deref().unwrap_or("-"),
                "snapshot peer silent, choosing another"
            );
            return Ok(self.request_snapshot(None));
        }

        Ok(Vec::new())
    }

    /// Asks a peer other than `avoid` for a snapshot, or settles on the
    /// empty-room defaults when no such peer is left.
    fn request_snapshot(&mut self, avoid: Option<&str>) -> Vec<ClientAction> {
        let now = self.env.now();
        let Some(target) = self.bootstrap.choose_peer(&self.env, now, avoid) else {
            return self.enter_empty_room();
        };

        self.bootstrap.phase = Phase::AwaitingSnapshot;
        let local = self.state.local_user();
        let name = local.map(|u| u.profile.name.clone()).unwrap_or_default();
        let status = local.map(|u| u.status).unwrap_or(UserStatus::IDLE);

        tracing::debug!(room = self.state.room_id(), peer = target.as_str(), "requesting snapshot");
        let request = Command::RequestChannelStatus(RequestChannelStatus {
            room_id: self.state.room_id().to_owned(),
            targets: vec![target.clone()],
            user: RequesterInfo {
                name,
                camera: status.camera_on,
                mic: status.mic_on,
                is_speaking: status.is_speaking,
            },
        });
        vec![ClientAction::SendDirect { target, command: request }]
    }

    fn enter_empty_room(&mut self) -> Vec<ClientAction> {
        tracing::debug!(room = self.state.room_id(), "no peers, applying room defaults");
        self.state.apply_empty_room_defaults();
        self.finish(Phase::EmptyRoom)
    }

    /// Marks the replica ready, settles local devices and replays buffered
    /// commands.
    fn finish(&mut self, phase: Phase) -> Vec<ClientAction> {
        self.bootstrap.phase = phase;
        self.bootstrap.target = None;
        self.bootstrap.requested_at = None;

        let mut actions = Vec::new();
        let forced = self.state.normalize_local_devices();
        if let Some(status) = forced {
            tracing::debug!(%status, "local devices forced off");
        }
        // Only the snapshot peer saw the join status; everyone else still
        // holds the idle placeholder.
        let announce = match forced {
            Some(status) => Some(status),
            None if phase == Phase::Synced => {
                Some(self.state.local_status()).filter(|s| s.camera_on || s.mic_on)
            },
            None => None,
        };
        if let Some(status) = announce {
            actions.push(ClientAction::Broadcast(Command::device_state(
                self.state.local_user_id(),
                status.camera_on,
                status.mic_on,
            )));
        }
        actions.push(ClientAction::Ready(phase));

        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "replaying buffered commands");
        }
        for (sender, command) in pending {
            actions.extend(self.apply_command(&sender, &command));
        }
        actions
    }

    fn apply_command(&mut self, sender: &str, command: &Command) -> Vec<ClientAction> {
        dispatch::apply(&mut self.state, command, sender)
            .into_iter()
            .map(|effect| match effect {
                DispatchEffect::Reply { target, command } => {
                    ClientAction::SendDirect { target, command }
                },
                DispatchEffect::FetchProfiles { ids } => ClientAction::FetchProfiles { ids },
                DispatchEffect::Notice(notice) => ClientAction::Notice(notice),
                DispatchEffect::RoomStopped => ClientAction::RoomStopped,
            })
            .collect()
    }

    fn fail(&mut self) {
        self.bootstrap.phase = Phase::Failed;
        self.pending.clear();
    }
}
