//! Room commands and their payloads.
//!
//! Every message on the room channel carries exactly one [`Command`]. The set
//! is closed; anything the codec cannot map onto a known variant becomes
//! [`Command::Unrecognized`] so newer peers never break older ones.
//!
//! Payload field names follow the established wire vocabulary of the
//! classroom channel (`userUUID`, `roomStartStatus`, ...), while the Rust side
//! uses descriptive names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::status::UserStatus;

/// Stable participant identifier on the room channel.
pub type UserId = String;

/// Room lifecycle status.
///
/// `Stopped` is terminal: once a room is stopped it never starts again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomStatus {
    /// Class has not started yet.
    #[default]
    Idle,
    /// Class is running.
    Started,
    /// Class is paused by the owner.
    Paused,
    /// Class is over.
    Stopped,
}

impl RoomStatus {
    /// Whether no further lifecycle transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Class interaction mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassMode {
    /// Owner-controlled: students speak only when brought on stage.
    Lecture,
    /// Everyone may interact.
    #[default]
    Interaction,
}

impl ClassMode {
    /// Whether students may interact without being brought on stage.
    #[must_use]
    pub const fn allows_interaction(self) -> bool {
        matches!(self, Self::Interaction)
    }
}

/// Device state update for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    /// User whose devices changed.
    #[serde(rename = "userUUID")]
    pub user_id: UserId,
    /// Camera publishing.
    pub camera: bool,
    /// Microphone publishing.
    pub mic: bool,
}

/// The requester's own provisional state, sent with a status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterInfo {
    /// Display name, used until the profile lookup completes.
    pub name: String,
    /// Camera publishing at join time.
    pub camera: bool,
    /// Microphone publishing at join time.
    pub mic: bool,
    /// Requester is on stage.
    #[serde(rename = "isSpeak")]
    pub is_speaking: bool,
}

impl RequesterInfo {
    /// Status a responder records for the requester.
    ///
    /// New joiners never start with a raised hand.
    #[must_use]
    pub const fn status(&self) -> UserStatus {
        UserStatus {
            is_speaking: self.is_speaking,
            is_raising_hand: false,
            camera_on: self.camera,
            mic_on: self.mic,
        }
    }
}

/// Request for the current room state, sent by a joining peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestChannelStatus {
    /// Room being joined.
    #[serde(rename = "roomUUID")]
    pub room_id: String,
    /// Peers asked to answer with a snapshot.
    #[serde(rename = "userUUIDs")]
    pub targets: Vec<UserId>,
    /// Requester's provisional state.
    pub user: RequesterInfo,
}

/// Full room state snapshot, sent directly to a joining peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Message ban flag.
    #[serde(rename = "banMessage")]
    pub message_banned: bool,
    /// Room lifecycle status.
    #[serde(rename = "roomStartStatus")]
    pub lifecycle: RoomStatus,
    /// Class mode.
    #[serde(rename = "classRoomMode")]
    pub mode: ClassMode,
    /// Status token per user.
    #[serde(rename = "userStates")]
    pub user_states: BTreeMap<UserId, UserStatus>,
}

/// One entry of a stage update batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakEntry {
    /// User being moved on or off stage.
    #[serde(rename = "userUUID")]
    pub user_id: UserId,
    /// New stage state.
    pub speak: bool,
}

/// Owner accepts a raised hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRaiseHand {
    /// User brought on stage.
    #[serde(rename = "userUUID")]
    pub user_id: UserId,
    /// Acceptance flag. Receivers ignore `false`.
    pub accept: bool,
}

/// A room channel command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A user's camera or microphone changed.
    DeviceState(DeviceState),
    /// A joining peer asks for the room state.
    RequestChannelStatus(RequestChannelStatus),
    /// Room lifecycle change.
    RoomStatus(RoomStatus),
    /// Full state snapshot answering a request.
    ChannelStatus(ChannelStatus),
    /// Message ban toggled.
    BanText(bool),
    /// Batched stage update.
    Speak(Vec<SpeakEntry>),
    /// Class mode change.
    ClassMode(ClassMode),
    /// Free-form notice text.
    Notice(String),
    /// The sender raised or lowered their hand.
    RaiseHand(bool),
    /// Owner brought a user on stage.
    AcceptRaiseHand(AcceptRaiseHand),
    /// Owner cleared every raised hand.
    CancelHandRaising(bool),
    /// Message the codec could not map onto a known command.
    Unrecognized(String),
}

impl Command {
    /// Wire tag for this command.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::DeviceState(_) => tags::DEVICE_STATE,
            Self::RequestChannelStatus(_) => tags::REQUEST_CHANNEL_STATUS,
            Self::RoomStatus(_) => tags::ROOM_STATUS,
            Self::ChannelStatus(_) => tags::CHANNEL_STATUS,
            Self::BanText(_) => tags::BAN_TEXT,
            Self::Speak(_) => tags::SPEAK,
            Self::ClassMode(_) => tags::CLASS_MODE,
            Self::Notice(_) => tags::NOTICE,
            Self::RaiseHand(_) => tags::RAISE_HAND,
            Self::AcceptRaiseHand(_) => tags::ACCEPT_RAISE_HAND,
            Self::CancelHandRaising(_) => tags::CANCEL_HAND_RAISING,
            Self::Unrecognized(_) => tags::UNDEFINED,
        }
    }

    /// Device state command for a user.
    #[must_use]
    pub fn device_state(user_id: impl Into<UserId>, camera: bool, mic: bool) -> Self {
        Self::DeviceState(DeviceState { user_id: user_id.into(), camera, mic })
    }

    /// Stage update taking every listed user off stage.
    #[must_use]
    pub fn off_stage<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UserId>,
    {
        Self::Speak(
            users.into_iter().map(|u| SpeakEntry { user_id: u.into(), speak: false }).collect(),
        )
    }

    /// Accept-raise-hand command for a user.
    #[must_use]
    pub fn accept_raise_hand(user_id: impl Into<UserId>) -> Self {
        Self::AcceptRaiseHand(AcceptRaiseHand { user_id: user_id.into(), accept: true })
    }
}

/// Wire tags, one per command kind.
pub mod tags {
    /// [`super::Command::DeviceState`]
    pub const DEVICE_STATE: &str = "DeviceState";
    /// [`super::Command::RequestChannelStatus`]
    pub const REQUEST_CHANNEL_STATUS: &str = "RequestChannelStatus";
    /// [`super::Command::RoomStatus`]
    pub const ROOM_STATUS: &str = "RoomStatus";
    /// [`super::Command::ChannelStatus`]
    pub const CHANNEL_STATUS: &str = "ChannelStatus";
    /// [`super::Command::BanText`]
    pub const BAN_TEXT: &str = "BanText";
    /// [`super::Command::Speak`]
    pub const SPEAK: &str = "Speak";
    /// [`super::Command::ClassMode`]
    pub const CLASS_MODE: &str = "ClassMode";
    /// [`super::Command::Notice`]
    pub const NOTICE: &str = "Notice";
    /// [`super::Command::RaiseHand`]
    pub const RAISE_HAND: &str = "RaiseHand";
    /// [`super::Command::AcceptRaiseHand`]
    pub const ACCEPT_RAISE_HAND: &str = "AcceptRaiseHand";
    /// [`super::Command::CancelHandRaising`]
    pub const CANCEL_HAND_RAISING: &str = "CancelHandRaising";
    /// [`super::Command::Unrecognized`]
    pub const UNDEFINED: &str = "undefined";
}
