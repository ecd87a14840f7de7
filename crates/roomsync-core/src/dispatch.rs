//! Inbound command reducer.
//!
//! Maps `(state, command, sender)` to a mutated state plus effects for the
//! caller to execute. Pure logic: no I/O, no clock, no randomness.
//!
//! Receivers trust the sender. Owner-only commands are gated on the sending
//! side by [`crate::translate`]; a peer that skips that gate is obeyed. The
//! channel is assumed to be authenticated and limited to room members.
//!
//! # Invariants
//!
//! - Applying the same snapshot twice leaves the state as after the first
//!   application.
//! - Commands naming users absent from the roster mutate nothing and surface
//!   as [`RoomNotice::UnknownUser`].
//! - [`Command::Unrecognized`] never mutates state.

use roomsync_proto::{ChannelStatus, Command, RequestChannelStatus, RoomStatus, UserId, UserStatus};

use crate::room::{Profile, RoomState};

/// Non-fatal anomaly or informational message for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomNotice {
    /// A peer broadcast a notice.
    Notice {
        /// Sending user
        sender: UserId,
        /// Notice text
        text: String,
    },

    /// A peer sent something the codec could not read.
    Unrecognized {
        /// Sending user
        sender: UserId,
        /// Raw message text
        raw: String,
    },

    /// A command referenced a user that is not in the roster.
    UnknownUser {
        /// Tag of the command
        command: &'static str,
        /// The missing user
        user_id: UserId,
    },

    /// Profile lookup failed outside the bootstrap.
    ProfileLookupFailed {
        /// Error reported by the lookup
        reason: String,
    },
}

/// Work for the caller after a command is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEffect {
    /// Send `command` directly to `target`.
    Reply {
        /// Recipient user
        target: UserId,
        /// Command to send
        command: Command,
    },

    /// Resolve profiles for users that were added with a placeholder.
    FetchProfiles {
        /// Users to resolve
        ids: Vec<UserId>,
    },

    /// Surface a notice to the application.
    Notice(RoomNotice),

    /// The room moved into the terminal `Stopped` state.
    RoomStopped,
}

/// Applies an inbound command to the replica.
pub fn apply(state: &mut RoomState, command: &Command, sender: &str) -> Vec<DispatchEffect> {
    let mut effects = Vec::new();
    match command {
        Command::DeviceState(device) => {
            let updated = state.update_status(&device.user_id, |s| {
                s.camera_on = device.camera;
                s.mic_on = device.mic;
            });
            note_unknown(updated, command, &device.user_id, &mut effects);
        },
        Command::RequestChannelStatus(request) => {
            on_status_request(state, request, sender, &mut effects);
        },
        Command::ChannelStatus(snapshot) => {
            if apply_snapshot(state, snapshot) {
                effects.push(DispatchEffect::RoomStopped);
            }
        },
        Command::RoomStatus(lifecycle) => {
            if set_lifecycle(state, *lifecycle) {
                effects.push(DispatchEffect::RoomStopped);
            }
        },
        Command::RaiseHand(raise) => {
            let updated = state.update_status(sender, |s| s.is_raising_hand = *raise);
            note_unknown(updated, command, sender, &mut effects);
        },
        Command::AcceptRaiseHand(accept) => {
            if accept.accept {
                let updated = state.update_status(&accept.user_id, |s| {
                    s.is_raising_hand = false;
                    s.is_speaking = true;
                    s.mic_on = true;
                });
                note_unknown(updated, command, &accept.user_id, &mut effects);
            }
        },
        Command::CancelHandRaising(cancel) => {
            if *cancel {
                state.update_all(|s| s.is_raising_hand = false);
            }
        },
        Command::Speak(entries) => {
            for entry in entries {
                let speak = entry.speak;
                let updated = state.update_status(&entry.user_id, |s| {
                    s.is_speaking = speak;
                    s.mic_on = speak;
                    s.camera_on = speak;
                });
                note_unknown(updated, command, &entry.user_id, &mut effects);
            }
        },
        Command::BanText(banned) => state.set_message_banned(*banned),
        Command::ClassMode(mode) => state.set_mode(*mode),
        Command::Notice(text) => {
            effects.push(DispatchEffect::Notice(RoomNotice::Notice {
                sender: sender.to_owned(),
                text: text.clone(),
            }));
        },
        Command::Unrecognized(raw) => {
            tracing::debug!(sender, len = raw.len(), "unrecognized command");
            effects.push(DispatchEffect::Notice(RoomNotice::Unrecognized {
                sender: sender.to_owned(),
                raw: raw.clone(),
            }));
        },
    }
    effects
}

/// Pure variant of [`apply`]: returns the next state and leaves `state` alone.
pub fn reduce(
    state: &RoomState,
    command: &Command,
    sender: &str,
) -> (RoomState, Vec<DispatchEffect>) {
    let mut next = state.clone();
    let effects = apply(&mut next, command, sender);
    (next, effects)
}

/// Merges a status snapshot. Returns true if the room transitioned into
/// `Stopped`.
///
/// Users listed in the snapshot but absent from the roster are skipped; roster
/// users missing from the snapshot keep their status.
pub fn apply_snapshot(state: &mut RoomState, snapshot: &ChannelStatus) -> bool {
    state.set_message_banned(snapshot.message_banned);
    state.set_mode(snapshot.mode);
    for (user_id, status) in &snapshot.user_states {
        if !state.update_status(user_id, |s| *s = *status) {
            tracing::trace!(user_id = user_id.as_str(), "snapshot entry for user not in roster");
        }
    }
    set_lifecycle(state, snapshot.lifecycle)
}

fn set_lifecycle(state: &mut RoomState, lifecycle: RoomStatus) -> bool {
    let previous = state.set_lifecycle(lifecycle);
    if previous != lifecycle {
        tracing::debug!(?previous, ?lifecycle, "room lifecycle changed");
    }
    lifecycle.is_terminal() && !previous.is_terminal()
}

fn on_status_request(
    state: &mut RoomState,
    request: &RequestChannelStatus,
    sender: &str,
    effects: &mut Vec<DispatchEffect>,
) {
    let status: UserStatus = request.user.status();
    if state.contains(sender) {
        state.update_status(sender, |s| *s = status);
    } else {
        state.upsert(Profile::new(sender, request.user.name.clone()), status);
        effects.push(DispatchEffect::FetchProfiles { ids: vec![sender.to_owned()] });
    }

    if request.targets.iter().any(|t| t == state.local_user_id()) {
        tracing::debug!(requester = sender, "answering status request");
        effects.push(DispatchEffect::Reply {
            target: sender.to_owned(),
            command: Command::ChannelStatus(state.snapshot()),
        });
    }
}

fn note_unknown(
    updated: bool,
    command: &Command,
    user_id: &str,
    effects: &mut Vec<DispatchEffect>,
) {
    if updated {
        return;
    }
    let tag = command.tag();
    tracing::debug!(command = tag, user_id, "command for unknown user ignored");
    effects.push(DispatchEffect::Notice(RoomNotice::UnknownUser {
        command: tag,
        user_id: user_id.to_owned(),
    }));
}
