//! Protocol
//!
//! Wire vocabulary for the classroom room channel: the [`Command`] set, the
//! compact [`UserStatus`] token, and the JSON envelope [`codec`].
//!
//! # Wire Format
//!
//! ```text
//! {"t":"DeviceState","v":{"userUUID":"u1","camera":true,"mic":false}}
//! {"t":"ChannelStatus","v":{...},"r":"room-1"}
//! ```
//!
//! `t` selects the command, `v` carries its payload, and `r` is present only
//! on direct-addressed replies. Decoding is lenient by default: anything the
//! codec cannot read becomes [`Command::Unrecognized`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod command;
pub mod errors;
pub mod status;

pub use codec::{Envelope, decode, decode_envelope, encode, encode_for_channel, try_decode};
pub use command::{
    AcceptRaiseHand, ChannelStatus, ClassMode, Command, DeviceState, RequestChannelStatus,
    RequesterInfo, RoomStatus, SpeakEntry, UserId,
};
pub use errors::{ProtocolError, Result};
pub use status::UserStatus;
