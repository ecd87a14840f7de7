//! Deterministic simulation harness for room sync testing.
//!
//! Seeded implementations of the Environment, channel transport and profile
//! directory for deterministic, reproducible tests of the same client and
//! runtime code that runs in production.
//!
//! # Cluster Testing
//!
//! [`Cluster`] pumps several clients over one in-memory delivery queue with no
//! async runtime. [`Operation`] sequences drive it from proptest strategies or
//! fuzz input.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Use [`InvariantRegistry::standard()`] after settling a cluster.
//!
//! # Runtime Testing
//!
//! [`SimNetwork`] hands out [`SimTransport`]s and [`SimProfiles`] so full
//! [`roomsync_app::Runtime`] instances can talk to each other inside one tokio
//! test.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod invariants;
pub mod operation;
pub mod sim_env;
pub mod sim_network;

pub use cluster::{Cluster, ClusterError, MAX_SETTLE_STEPS, OWNER_ID, ROOM_ID};
pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, LocalUserPresent, OwnerNeverRaisesHand,
    ReplicaConvergence, ReplicaSnapshot, StageLimit, SystemSnapshot, Violation,
};
pub use operation::{Actor, MAX_STUDENTS, Operation, Outcome};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_network::{SimNetwork, SimNetworkError, SimProfiles, SimTransport};
