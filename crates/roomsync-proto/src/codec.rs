//! JSON envelope codec.
//!
//! Every channel message is a JSON object:
//!
//! ```text
//! { "t": <tag>, "v": <payload>, "r": <channel id, direct messages only> }
//! ```
//!
//! The tag selects the payload shape. Payloads are serialized straight from the
//! payload structs, so field order on the wire follows declaration order.
//!
//! # Invariants
//!
//! - [`decode`] never fails: unknown tags, malformed payloads and non-JSON text
//!   all become [`Command::Unrecognized`] carrying the raw message.
//! - [`try_decode`] is the strict variant, for callers that want the reason.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    command::{Command, tags},
    errors::{ProtocolError, Result},
};

/// A decoded channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The command carried.
    pub command: Command,
    /// Channel id, present on direct-addressed messages.
    pub channel: Option<String>,
}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T: Serialize> {
    t: &'static str,
    v: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    r: Option<&'a str>,
}

#[derive(Deserialize)]
struct IncomingEnvelope {
    t: String,
    #[serde(default)]
    v: Value,
    #[serde(default)]
    r: Option<String>,
}

/// Encode a command for broadcast on the room channel.
pub fn encode(command: &Command) -> Result<String> {
    encode_envelope(command, None)
}

/// Encode a command for direct delivery, stamped with the channel id.
pub fn encode_for_channel(command: &Command, channel: &str) -> Result<String> {
    encode_envelope(command, Some(channel))
}

fn encode_envelope(command: &Command, channel: Option<&str>) -> Result<String> {
    let t = command.tag();
    match command {
        Command::DeviceState(p) => to_json(t, p, channel),
        Command::RequestChannelStatus(p) => to_json(t, p, channel),
        Command::RoomStatus(p) => to_json(t, p, channel),
        Command::ChannelStatus(p) => to_json(t, p, channel),
        Command::BanText(p) | Command::RaiseHand(p) | Command::CancelHandRaising(p) => {
            to_json(t, p, channel)
        },
        Command::Speak(p) => to_json(t, p, channel),
        Command::ClassMode(p) => to_json(t, p, channel),
        Command::Notice(p) | Command::Unrecognized(p) => to_json(t, p, channel),
        Command::AcceptRaiseHand(p) => to_json(t, p, channel),
    }
}

fn to_json<T: Serialize>(t: &'static str, v: &T, r: Option<&str>) -> Result<String> {
    serde_json::to_string(&OutgoingEnvelope { t, v, r })
        .map_err(|e| ProtocolError::Encode { tag: t, reason: e.to_string() })
}

/// Decode a channel message strictly.
pub fn try_decode(text: &str) -> Result<Envelope> {
    let envelope: IncomingEnvelope = serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
    let IncomingEnvelope { t, v, r } = envelope;

    let command = match t.as_str() {
        tags::DEVICE_STATE => Command::DeviceState(payload(tags::DEVICE_STATE, v)?),
        tags::REQUEST_CHANNEL_STATUS => {
            Command::RequestChannelStatus(payload(tags::REQUEST_CHANNEL_STATUS, v)?)
        },
        tags::ROOM_STATUS => Command::RoomStatus(payload(tags::ROOM_STATUS, v)?),
        tags::CHANNEL_STATUS => Command::ChannelStatus(payload(tags::CHANNEL_STATUS, v)?),
        tags::BAN_TEXT => Command::BanText(payload(tags::BAN_TEXT, v)?),
        tags::SPEAK => Command::Speak(payload(tags::SPEAK, v)?),
        tags::CLASS_MODE => Command::ClassMode(payload(tags::CLASS_MODE, v)?),
        tags::NOTICE => Command::Notice(payload(tags::NOTICE, v)?),
        tags::RAISE_HAND => Command::RaiseHand(payload(tags::RAISE_HAND, v)?),
        tags::ACCEPT_RAISE_HAND => {
            Command::AcceptRaiseHand(payload(tags::ACCEPT_RAISE_HAND, v)?)
        },
        tags::CANCEL_HAND_RAISING => {
            Command::CancelHandRaising(payload(tags::CANCEL_HAND_RAISING, v)?)
        },
        _ => return Err(ProtocolError::UnknownTag(t)),
    };

    Ok(Envelope { command, channel: r })
}

fn payload<T: DeserializeOwned>(tag: &'static str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::InvalidPayload { tag, reason: e.to_string() })
}

/// Decode a channel message, mapping anything unreadable to
/// [`Command::Unrecognized`].
#[must_use]
pub fn decode(text: &str) -> Command {
    decode_envelope(text).command
}

/// Decode a channel message with its channel stamp, never failing.
#[must_use]
pub fn decode_envelope(text: &str) -> Envelope {
    try_decode(text).unwrap_or_else(|_| Envelope {
        command: Command::Unrecognized(text.to_owned()),
        channel: None,
    })
}
