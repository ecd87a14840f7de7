//! Client
//!
//! Action-based room client. Receives events ([`ClientEvent`]), runs them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute. No I/O happens here.
//!
//! # Components
//!
//! - [`Client`]: one participant's room session
//! - [`Phase`]: join bootstrap progress
//! - [`ClientConfig`] / [`RoomInfo`]: timeouts, stage limits, and room identity
//! - [`ClientEvent`] / [`ClientAction`]: the event and action vocabulary

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bootstrap;
mod client;
mod config;
mod error;
mod event;

pub use bootstrap::Phase;
pub use client::Client;
pub use config::{
    ClientConfig, DEFAULT_BOOTSTRAP_TIMEOUT, DEFAULT_PEER_RESPONSE_TIMEOUT, MAX_PENDING_COMMANDS,
    RoomInfo,
};
pub use error::{BootstrapError, ClientError};
pub use event::{ClientAction, ClientEvent};
pub use roomsync_core::{Environment, Intent, Profile, RoomNotice, RoomState, RoomType};
