//! Caller-facing handle to a running room.

use roomsync_core::{Intent, RoomState};
use roomsync_proto::{ClassMode, UserId};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::{error::RuntimeError, event::RoomEvent};

/// Request sent from a [`RoomHandle`] to its runtime.
#[derive(Debug)]
pub(crate) enum Request {
    Intent { intent: Intent, reply: oneshot::Sender<Result<(), RuntimeError>> },
    Leave,
}

/// Handle to a room runtime.
///
/// Cheap to clone. State is observed through a watch channel (latest value
/// wins), one-shot events through a broadcast channel. Dropping every handle
/// makes the runtime leave the room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<RoomState>,
    events: broadcast::Sender<RoomEvent>,
}

impl RoomHandle {
    pub(crate) fn new(
        requests: mpsc::Sender<Request>,
        state: watch::Receiver<RoomState>,
        events: broadcast::Sender<RoomEvent>,
    ) -> Self {
        Self { requests, state, events }
    }

    /// Latest replica snapshot.
    pub fn state(&self) -> RoomState {
        self.state.borrow().clone()
    }

    /// State stream. `changed()` resolves whenever the replica changes.
    pub fn watch_state(&self) -> watch::Receiver<RoomState> {
        self.state.clone()
    }

    /// Event stream. Only events sent after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Whether the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }

    /// Perform a local intent and wait for it to be checked and sent.
    pub async fn perform(&self, intent: Intent) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request::Intent { intent, reply })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)?
    }

    /// Ask the runtime to leave the room. Returns once the request is queued.
    pub async fn leave(&self) -> Result<(), RuntimeError> {
        self.requests.send(Request::Leave).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Toggle a camera.
    pub async fn toggle_camera(&self, user_id: impl Into<UserId>) -> Result<(), RuntimeError> {
        self.perform(Intent::ToggleCamera { user_id: user_id.into() }).await
    }

    /// Toggle a microphone.
    pub async fn toggle_mic(&self, user_id: impl Into<UserId>) -> Result<(), RuntimeError> {
        self.perform(Intent::ToggleMic { user_id: user_id.into() }).await
    }

    /// Raise or lower the local hand.
    pub async fn toggle_raise_hand(&self) -> Result<(), RuntimeError> {
        self.perform(Intent::ToggleRaiseHand).await
    }

    /// Bring a user on stage.
    pub async fn accept_raise_hand(&self, user_id: impl Into<UserId>) -> Result<(), RuntimeError> {
        self.perform(Intent::AcceptRaiseHand { user_id: user_id.into() }).await
    }

    /// Take a user off stage.
    pub async fn disconnect(&self, user_id: impl Into<UserId>) -> Result<(), RuntimeError> {
        self.perform(Intent::Disconnect { user_id: user_id.into() }).await
    }

    /// Clear raised hands and empty the stage.
    pub async fn stop_interaction(&self) -> Result<(), RuntimeError> {
        self.perform(Intent::StopInteraction).await
    }

    /// Start the class.
    pub async fn start_class(&self) -> Result<(), RuntimeError> {
        self.perform(Intent::StartClass).await
    }

    /// Pause the class.
    pub async fn pause_class(&self) -> Result<(), RuntimeError> {
        self.perform(Intent::PauseClass).await
    }

    /// Resume a paused class.
    pub async fn resume_class(&self) -> Result<(), RuntimeError> {
        self.perform(Intent::ResumeClass).await
    }

    /// Stop the class.
    pub async fn stop_class(&self) -> Result<(), RuntimeError> {
        self.perform(Intent::StopClass).await
    }

    /// Flip the message ban.
    pub async fn toggle_message_ban(&self) -> Result<(), RuntimeError> {
        self.perform(Intent::ToggleMessageBan).await
    }

    /// Set the class mode.
    pub async fn set_mode(&self, mode: ClassMode) -> Result<(), RuntimeError> {
        self.perform(Intent::SetMode(mode)).await
    }

    /// Broadcast a notice.
    pub async fn send_notice(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        self.perform(Intent::SendNotice { text: text.into() }).await
    }
}
