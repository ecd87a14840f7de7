//! Random lesson operations for property and fuzz testing.
//!
//! An [`Operation`] is one thing that can happen in a classroom: someone
//! joins or leaves, or a participant performs an intent. Applying a sequence
//! to a [`Cluster`] and settling after each one must keep every standard
//! invariant.

use std::time::Duration;

use arbitrary::Arbitrary;
use roomsync_client::ClientError;
use roomsync_core::Intent;
use roomsync_proto::ClassMode;

use crate::cluster::{Cluster, ClusterError, OWNER_ID};

/// Students an operation can name. Indices wrap onto this range.
pub const MAX_STUDENTS: u8 = 6;

/// Participant picked by an operation. `0` is the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct Actor(pub u8);

impl Actor {
    /// User id for this actor.
    pub fn user_id(self) -> String {
        match self.0 % (MAX_STUDENTS + 1) {
            0 => OWNER_ID.to_owned(),
            n => format!("s{n}"),
        }
    }
}

/// One classroom event.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// A student joins, optionally with devices on.
    Join {
        /// Who joins
        who: Actor,
        /// Camera on at join
        camera: bool,
        /// Mic on at join
        mic: bool,
    },
    /// A student leaves. The owner stays.
    Leave(Actor),
    /// Someone toggles a camera.
    ToggleCamera {
        /// Who acts
        actor: Actor,
        /// Whose camera
        target: Actor,
    },
    /// Someone toggles a microphone.
    ToggleMic {
        /// Who acts
        actor: Actor,
        /// Whose mic
        target: Actor,
    },
    /// Someone raises or lowers a hand.
    RaiseHand(Actor),
    /// Owner brings someone on stage.
    Accept(Actor),
    /// Owner takes someone off stage.
    Disconnect(Actor),
    /// Owner clears the stage.
    StopInteraction,
    /// Owner starts the class.
    Start,
    /// Owner pauses the class.
    Pause,
    /// Owner resumes the class.
    Resume,
    /// Owner stops the class.
    Stop,
    /// Someone flips the message ban.
    ToggleBan(Actor),
    /// Someone sets the class mode.
    SetMode {
        /// Who acts
        actor: Actor,
        /// Lecture when true
        lecture: bool,
    },
    /// Time passes.
    Advance {
        /// Milliseconds
        millis: u16,
    },
}

/// What applying an operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation took effect.
    Applied,
    /// Refused: permission, lifecycle, or a missing participant.
    Rejected,
}

impl Operation {
    /// Apply to the cluster and deliver everything it caused.
    ///
    /// # Errors
    ///
    /// Returns an error only when the cluster itself misbehaves; refused
    /// intents are [`Outcome::Rejected`].
    pub fn apply(&self, cluster: &mut Cluster) -> Result<Outcome, ClusterError> {
        let outcome = match self {
            Self::Join { who, camera, mic } => {
                let user_id = who.user_id();
                if cluster.client(&user_id).is_some() {
                    Outcome::Rejected
                } else {
                    cluster.join_with_devices(&user_id, *camera, *mic)?;
                    Outcome::Applied
                }
            },
            Self::Leave(who) => {
                let user_id = who.user_id();
                if user_id == OWNER_ID || cluster.client(&user_id).is_none() {
                    Outcome::Rejected
                } else {
                    cluster.leave(&user_id)?;
                    Outcome::Applied
                }
            },
            Self::Advance { millis } => {
                cluster.advance(Duration::from_millis(u64::from(*millis)))?;
                Outcome::Applied
            },
            _ => match self.intent() {
                Some((actor, intent)) => perform(cluster, &actor, intent)?,
                None => Outcome::Rejected,
            },
        };
        cluster.settle()?;
        Ok(outcome)
    }

    /// Acting user and intent, for operations that are intents.
    fn intent(&self) -> Option<(String, Intent)> {
        let owner = OWNER_ID.to_owned();
        let pair = match self {
            Self::ToggleCamera { actor, target } => {
                (actor.user_id(), Intent::ToggleCamera { user_id: target.user_id() })
            },
            Self::ToggleMic { actor, target } => {
                (actor.user_id(), Intent::ToggleMic { user_id: target.user_id() })
            },
            Self::RaiseHand(actor) => (actor.user_id(), Intent::ToggleRaiseHand),
            Self::Accept(target) => (owner, Intent::AcceptRaiseHand { user_id: target.user_id() }),
            Self::Disconnect(target) => (owner, Intent::Disconnect { user_id: target.user_id() }),
            Self::StopInteraction => (owner, Intent::StopInteraction),
            Self::Start => (owner, Intent::StartClass),
            Self::Pause => (owner, Intent::PauseClass),
            Self::Resume => (owner, Intent::ResumeClass),
            Self::ToggleBan(actor) => (actor.user_id(), Intent::ToggleMessageBan),
            Self::SetMode { actor, lecture } => {
                let mode = if *lecture { ClassMode::Lecture } else { ClassMode::Interaction };
                (actor.user_id(), Intent::SetMode(mode))
            },
            Self::Stop => (owner, Intent::StopClass),
            Self::Join { .. } | Self::Leave(_) | Self::Advance { .. } => return None,
        };
        Some(pair)
    }
}

fn perform(cluster: &mut Cluster, actor: &str, intent: Intent) -> Result<Outcome, ClusterError> {
    if cluster.client(actor).is_none() {
        return Ok(Outcome::Rejected);
    }
    match cluster.perform(actor, intent) {
        Ok(()) => Ok(Outcome::Applied),
        Err(ClusterError::Client {
            source: ClientError::Action(_) | ClientError::NotReady { .. },
            ..
        }) => Ok(Outcome::Rejected),
        Err(e) => Err(e),
    }
}
