//! Async runtime for one room session.
//!
//! The Runtime drives the client event loop, coordinating between:
//! - [`Client`]: pure room state machine
//! - [`ChannelTransport`]: the room's pub/sub channel
//! - [`ProfileLookup`]: the user directory
//! - [`RoomHandle`]: callers performing intents and observing state
//!
//! Everything runs on one task. Transport events, intents and ticks are
//! handled one at a time, so the replica never sees concurrent mutation.

use std::collections::VecDeque;

use roomsync_client::{Client, ClientAction, ClientError, ClientEvent, RoomInfo};
use roomsync_core::{Environment, Intent, RoomState};
use roomsync_proto::{encode, encode_for_channel};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::MissedTickBehavior,
};

use crate::{
    config::RuntimeConfig,
    driver::{ChannelEvent, ChannelTransport, ProfileLookup},
    error::RuntimeError,
    event::RoomEvent,
    handle::{Request, RoomHandle},
};

/// Whether the loop keeps running after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// What woke the loop.
enum Wake {
    Channel(Option<ChannelEvent>),
    Request(Option<Request>),
    Tick,
}

/// Room runtime over a transport, a profile directory and an environment.
///
/// # Type Parameters
///
/// - `T`: room channel transport
/// - `P`: profile directory
/// - `E`: environment for time and randomness
pub struct Runtime<T, P, E>
where
    T: ChannelTransport,
    P: ProfileLookup,
    E: Environment,
{
    transport: T,
    profiles: P,
    env: E,
    client: Client<E>,
    config: RuntimeConfig,
    channel: String,
    requests: mpsc::Receiver<Request>,
    state_tx: watch::Sender<RoomState>,
    events: broadcast::Sender<RoomEvent>,
}

impl<T, P, E> Runtime<T, P, E>
where
    T: ChannelTransport,
    P: ProfileLookup,
    E: Environment,
{
    /// Create a runtime and the handle that controls it.
    ///
    /// Nothing happens until [`Runtime::run`] is awaited.
    pub fn new(
        transport: T,
        profiles: P,
        env: E,
        room: RoomInfo,
        config: RuntimeConfig,
    ) -> (Self, RoomHandle) {
        let channel = config.channel.clone().unwrap_or_else(|| room.room_id.clone());
        let client = Client::new(env.clone(), config.client.clone(), room);

        let (request_tx, requests) = mpsc::channel(config.intent_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(client.state().clone());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let handle = RoomHandle::new(request_tx, state_rx, events.clone());
        let runtime = Self {
            transport,
            profiles,
            env,
            client,
            config,
            channel,
            requests,
            state_tx,
            events,
        };
        (runtime, handle)
    }

    /// Current replica.
    pub fn state(&self) -> &RoomState {
        self.client.state()
    }

    /// Join the channel and run until the room stops, the caller leaves, or
    /// the session fails.
    ///
    /// The channel is always left before returning.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Transport`] if the join fails
    /// - [`RuntimeError::ConnectionLost`] if the transport goes away
    /// - [`RuntimeError::Client`] if the bootstrap fails
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        let result = self.session().await;
        if let Err(e) = &result {
            tracing::warn!(channel = self.channel.as_str(), error = %e, "room session ended");
        }
        self.shutdown().await;
        result
    }

    async fn session(&mut self) -> Result<(), RuntimeError> {
        let members = self
            .transport
            .join(&self.channel)
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;
        tracing::info!(
            channel = self.channel.as_str(),
            members = members.len(),
            "joined room channel"
        );

        if self.dispatch(ClientEvent::Joined { members }).await? == Flow::Stop {
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                event = self.transport.next_event() => Wake::Channel(event),
                request = self.requests.recv() => Wake::Request(request),
                _ = ticker.tick() => Wake::Tick,
            };

            let flow = match wake {
                Wake::Channel(Some(event)) => self.dispatch(client_event(event)).await?,
                Wake::Channel(None) => {
                    self.emit(RoomEvent::ConnectionLost);
                    return Err(RuntimeError::ConnectionLost);
                },
                Wake::Request(Some(Request::Intent { intent, reply })) => {
                    self.perform(intent, reply).await
                },
                Wake::Request(Some(Request::Leave) | None) => Flow::Stop,
                Wake::Tick => {
                    let now = self.env.now();
                    self.dispatch(ClientEvent::Tick { now }).await?
                },
            };

            if flow == Flow::Stop {
                return Ok(());
            }
        }
    }

    /// Feeds one event and everything it triggers through the client.
    async fn dispatch(&mut self, event: ClientEvent<E::Instant>) -> Result<Flow, RuntimeError> {
        let mut queue = VecDeque::from([event]);
        let mut flow = Flow::Continue;

        while let Some(event) = queue.pop_front() {
            let actions = match self.client.handle(event) {
                Ok(actions) => actions,
                Err(e) => {
                    self.publish_state();
                    return Err(self.client_failed(e));
                },
            };
            if self.execute_all(actions, &mut queue).await == Flow::Stop {
                flow = Flow::Stop;
            }
        }

        self.publish_state();
        Ok(flow)
    }

    /// Runs a local intent and answers the caller.
    ///
    /// A rejected intent is only reported to the caller; the session goes on.
    async fn perform(
        &mut self,
        intent: Intent,
        reply: oneshot::Sender<Result<(), RuntimeError>>,
    ) -> Flow {
        let name = intent.name();
        let actions = match self.client.handle(ClientEvent::Intent(intent)) {
            Ok(actions) => actions,
            Err(e) => {
                if reply.send(Err(e.into())).is_err() {
                    tracing::debug!(intent = name, "intent caller went away");
                }
                return Flow::Continue;
            },
        };

        let mut queue = VecDeque::new();
        let mut flow = self.execute_all(actions, &mut queue).await;
        self.publish_state();
        if reply.send(Ok(())).is_err() {
            tracing::debug!(intent = name, "intent caller went away");
        }

        // Follow-up events (profile lookups) go through the normal path.
        while let Some(event) = queue.pop_front() {
            match self.dispatch(event).await {
                Ok(Flow::Stop) => flow = Flow::Stop,
                Ok(Flow::Continue) => {},
                Err(e) => {
                    tracing::warn!(error = %e, "follow-up after intent failed");
                },
            }
        }
        flow
    }

    /// Executes client actions in order. Follow-up client events are queued.
    async fn execute_all(
        &mut self,
        actions: Vec<ClientAction>,
        queue: &mut VecDeque<ClientEvent<E::Instant>>,
    ) -> Flow {
        let mut flow = Flow::Continue;
        for action in actions {
            if self.execute(action, queue).await == Flow::Stop {
                flow = Flow::Stop;
            }
        }
        flow
    }

    async fn execute(
        &mut self,
        action: ClientAction,
        queue: &mut VecDeque<ClientEvent<E::Instant>>,
    ) -> Flow {
        match action {
            ClientAction::Broadcast(command) => {
                let tag = command.tag();
                match encode(&command) {
                    Ok(text) => {
                        if let Err(e) = self.transport.broadcast(text).await {
                            self.send_failed(tag, None, &e.to_string());
                        }
                    },
                    Err(e) => self.send_failed(tag, None, &e.to_string()),
                }
            },
            ClientAction::SendDirect { target, command } => {
                let tag = command.tag();
                match encode_for_channel(&command, &self.channel) {
                    Ok(text) => {
                        if let Err(e) = self.transport.send_direct(&target, text).await {
                            self.send_failed(tag, Some(&target), &e.to_string());
                        }
                    },
                    Err(e) => self.send_failed(tag, Some(&target), &e.to_string()),
                }
            },
            ClientAction::FetchProfiles { ids } => {
                let event = match self.profiles.fetch_users(&ids).await {
                    Ok(profiles) => ClientEvent::ProfilesResolved { profiles },
                    Err(e) => ClientEvent::ProfileLookupFailed { reason: e.to_string() },
                };
                queue.push_back(event);
            },
            ClientAction::Notice(notice) => self.emit(RoomEvent::Notice(notice)),
            ClientAction::Ready(phase) => {
                tracing::info!(channel = self.channel.as_str(), ?phase, "room replica ready");
                self.emit(RoomEvent::Ready(phase));
            },
            ClientAction::RoomStopped => {
                tracing::info!(channel = self.channel.as_str(), "room stopped");
                self.emit(RoomEvent::RoomStopped);
                return Flow::Stop;
            },
        }
        Flow::Continue
    }

    fn client_failed(&self, error: ClientError) -> RuntimeError {
        if let ClientError::Bootstrap(e) = &error {
            self.emit(RoomEvent::BootstrapFailed { reason: e.to_string() });
        }
        error.into()
    }

    fn send_failed(&self, tag: &str, target: Option<&str>, reason: &str) {
        tracing::warn!(command = tag, target = target.unwrap_or("*"), reason, "send failed");
        self.emit(RoomEvent::SendFailed { reason: format!("{tag}: {reason}") });
    }

    fn publish_state(&self) {
        let state = self.client.state();
        self.state_tx.send_if_modified(|current| {
            if current == state {
                return false;
            }
            *current = state.clone();
            true
        });
    }

    fn emit(&self, event: RoomEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn shutdown(&mut self) {
        self.client.close();
        self.requests.close();
        if let Err(e) = self.transport.leave().await {
            tracing::warn!(channel = self.channel.as_str(), error = %e, "leave failed");
        }
        tracing::info!(channel = self.channel.as_str(), "left room channel");
        self.emit(RoomEvent::Left);
    }
}

fn client_event<I>(event: ChannelEvent) -> ClientEvent<I> {
    match event {
        ChannelEvent::MemberJoined { user_id } => ClientEvent::MemberJoined { user_id },
        ChannelEvent::MemberLeft { user_id } => ClientEvent::MemberLeft { user_id },
        ChannelEvent::MessageReceived { sender, text } => {
            ClientEvent::MessageReceived { sender, text }
        },
    }
}
