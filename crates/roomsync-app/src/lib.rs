//! Room runtime
//!
//! Async shell around the pure room [`Client`](roomsync_client::Client). It
//! owns the I/O: the room channel, the profile directory and the clock, and
//! exposes the session to callers through a [`RoomHandle`].
//!
//! # Components
//!
//! - [`ChannelTransport`] / [`ProfileLookup`]: I/O seams
//! - [`Runtime`]: single-task orchestration loop
//! - [`RoomHandle`]: intents in, `watch` state and `broadcast` events out
//! - [`SystemEnv`]: production clock and randomness

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod driver;
mod error;
mod event;
mod handle;
mod runtime;
mod system_env;

pub use config::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_INTENT_CAPACITY, DEFAULT_TICK_INTERVAL, RuntimeConfig,
};
pub use driver::{ChannelEvent, ChannelTransport, ProfileLookup};
pub use error::RuntimeError;
pub use event::RoomEvent;
pub use handle::RoomHandle;
pub use runtime::Runtime;
pub use system_env::SystemEnv;
