//! Core
//!
//! Sans-IO room logic shared by every participant: the local replica
//! ([`RoomState`]), the inbound command reducer ([`dispatch`]), and the
//! permission-gated translator for local intents ([`translate`]).
//!
//! # Architecture
//!
//! ```text
//!   local Intent ──> translate ──┐            ┌──> broadcast commands
//!                                ├─> RoomState│
//!   peer Command ──> dispatch ───┘            └──> DispatchEffect (reply, fetch, notice)
//! ```
//!
//! Both paths mutate the same replica. The translator applies its own commands
//! through the reducer, so a local change and its remote echo follow one rule
//! set.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod dispatch;
pub mod env;
pub mod error;
pub mod policy;
pub mod room;
pub mod translate;

pub use dispatch::{DispatchEffect, RoomNotice, apply, reduce};
pub use env::Environment;
pub use error::ActionError;
pub use policy::StagePolicy;
pub use room::{Profile, RoomState, RoomType, User};
pub use translate::{Intent, translate};
