//! Local intent translator.
//!
//! Turns a user-level [`Intent`] into the commands to broadcast, after checking
//! that the local user may perform it. Accepted commands are also applied to
//! the local replica through [`crate::dispatch::apply`] with the local user as
//! sender, so the optimistic update follows the same rules every remote replica
//! applies on receipt.
//!
//! # Invariants
//!
//! - A rejected intent returns an error, emits nothing, and leaves the replica
//!   untouched.
//! - Every returned command has already been applied locally.

use roomsync_proto::{ClassMode, Command, RoomStatus, UserId, UserStatus};

use crate::{dispatch, error::ActionError, policy::StagePolicy, room::RoomState};

/// A local user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Flip a camera. Remote cameras can only be turned off, by the owner.
    ToggleCamera {
        /// Whose camera
        user_id: UserId,
    },

    /// Flip a microphone. Remote mics can only be turned off, by the owner.
    ToggleMic {
        /// Whose microphone
        user_id: UserId,
    },

    /// Raise or lower the local user's hand.
    ToggleRaiseHand,

    /// Owner brings a user on stage.
    AcceptRaiseHand {
        /// User to bring on stage
        user_id: UserId,
    },

    /// Owner takes a user off stage.
    Disconnect {
        /// User to take off stage
        user_id: UserId,
    },

    /// Owner clears every raised hand and empties the stage.
    StopInteraction,

    /// Owner starts the class.
    StartClass,

    /// Owner pauses the class.
    PauseClass,

    /// Owner resumes a paused class.
    ResumeClass,

    /// Owner ends the class for good.
    StopClass,

    /// Owner flips the message ban.
    ToggleMessageBan,

    /// Owner sets the class mode.
    SetMode(ClassMode),

    /// Owner broadcasts a notice.
    SendNotice {
        /// Notice text
        text: String,
    },
}

impl Intent {
    /// Short name for logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ToggleCamera { .. } => "toggle camera",
            Self::ToggleMic { .. } => "toggle mic",
            Self::ToggleRaiseHand => "raise hand",
            Self::AcceptRaiseHand { .. } => "accept raised hand",
            Self::Disconnect { .. } => "disconnect user",
            Self::StopInteraction => "stop interaction",
            Self::StartClass => "start class",
            Self::PauseClass => "pause class",
            Self::ResumeClass => "resume class",
            Self::StopClass => "stop class",
            Self::ToggleMessageBan => "toggle message ban",
            Self::SetMode(_) => "set class mode",
            Self::SendNotice { .. } => "send notice",
        }
    }
}

#[derive(Clone, Copy)]
enum Device {
    Camera,
    Mic,
}

/// Checks and applies an intent, returning the commands to broadcast.
pub fn translate(
    state: &mut RoomState,
    intent: Intent,
    policy: &StagePolicy,
) -> Result<Vec<Command>, ActionError> {
    let commands = plan(state, &intent, policy)?;
    let local = state.local_user_id().to_owned();
    for command in &commands {
        dispatch::apply(state, command, &local);
    }
    tracing::debug!(intent = intent.name(), commands = commands.len(), "intent accepted");
    Ok(commands)
}

fn plan(
    state: &RoomState,
    intent: &Intent,
    policy: &StagePolicy,
) -> Result<Vec<Command>, ActionError> {
    match intent {
        Intent::ToggleCamera { user_id } => toggle_device(state, user_id, Device::Camera),
        Intent::ToggleMic { user_id } => toggle_device(state, user_id, Device::Mic),
        Intent::ToggleRaiseHand => {
            if state.is_owner() {
                return Err(ActionError::OwnerCannotRaiseHand);
            }
            let status = state.local_status();
            if status.is_speaking {
                return Err(ActionError::AlreadySpeaking {
                    user_id: state.local_user_id().to_owned(),
                });
            }
            Ok(vec![Command::RaiseHand(!status.is_raising_hand)])
        },
        Intent::AcceptRaiseHand { user_id } => {
            require_owner(state, intent)?;
            let status = known_status(state, user_id)?;
            if status.is_speaking {
                return Err(ActionError::AlreadySpeaking { user_id: user_id.clone() });
            }
            if !policy.admits(state.speaker_count()) {
                return Err(ActionError::StageFull { max: policy.max_speakers.unwrap_or(0) });
            }
            Ok(vec![Command::accept_raise_hand(user_id.clone())])
        },
        Intent::Disconnect { user_id } => {
            require_owner(state, intent)?;
            known_status(state, user_id)?;
            Ok(vec![Command::off_stage([user_id.clone()])])
        },
        Intent::StopInteraction => {
            require_owner(state, intent)?;
            let mut commands = Vec::new();
            if !state.raised_hands().is_empty() {
                commands.push(Command::CancelHandRaising(true));
            }
            let speakers: Vec<UserId> = state
                .users()
                .iter()
                .filter(|u| u.status.is_speaking)
                .map(|u| u.profile.id.clone())
                .collect();
            if !speakers.is_empty() {
                commands.push(Command::off_stage(speakers));
            }
            Ok(commands)
        },
        Intent::StartClass => {
            require_owner(state, intent)?;
            require_lifecycle(state, intent, |l| {
                !matches!(l, RoomStatus::Started | RoomStatus::Stopped)
            })?;
            Ok(open_class(state))
        },
        Intent::ResumeClass => {
            require_owner(state, intent)?;
            require_lifecycle(state, intent, |l| l == RoomStatus::Paused)?;
            Ok(open_class(state))
        },
        Intent::PauseClass => {
            require_owner(state, intent)?;
            require_lifecycle(state, intent, |l| l == RoomStatus::Started)?;
            Ok(close_class(state, RoomStatus::Paused))
        },
        Intent::StopClass => {
            require_owner(state, intent)?;
            require_lifecycle(state, intent, |l| !l.is_terminal())?;
            Ok(close_class(state, RoomStatus::Stopped))
        },
        Intent::ToggleMessageBan => {
            require_owner(state, intent)?;
            Ok(vec![Command::BanText(!state.message_banned())])
        },
        Intent::SetMode(mode) => {
            require_owner(state, intent)?;
            Ok(vec![Command::ClassMode(*mode)])
        },
        Intent::SendNotice { text } => {
            require_owner(state, intent)?;
            Ok(vec![Command::Notice(text.clone())])
        },
    }
}

fn toggle_device(
    state: &RoomState,
    user_id: &str,
    device: Device,
) -> Result<Vec<Command>, ActionError> {
    let status = known_status(state, user_id)?;
    let (camera, mic) = match device {
        Device::Camera => (!status.camera_on, status.mic_on),
        Device::Mic => (status.camera_on, !status.mic_on),
    };

    if user_id != state.local_user_id() {
        if !state.is_owner() {
            return Err(ActionError::NotOwner { action: "toggle a remote device" });
        }
        let turning_on = match device {
            Device::Camera => camera,
            Device::Mic => mic,
        };
        if turning_on {
            return Err(ActionError::CannotEnableRemoteDevice { user_id: user_id.to_owned() });
        }
    }

    Ok(vec![Command::device_state(user_id, camera, mic)])
}

/// Lecture mode and the owner's mic on, then `Started`.
fn open_class(state: &RoomState) -> Vec<Command> {
    let mut commands = vec![Command::ClassMode(ClassMode::Lecture)];
    let owner = state.local_status();
    if !owner.mic_on {
        commands.push(Command::device_state(state.local_user_id(), owner.camera_on, true));
    }
    commands.push(Command::RoomStatus(RoomStatus::Started));
    commands
}

/// The owner's mic off, then `lifecycle`.
fn close_class(state: &RoomState, lifecycle: RoomStatus) -> Vec<Command> {
    let mut commands = Vec::new();
    let owner = state.local_status();
    if owner.mic_on {
        commands.push(Command::device_state(state.local_user_id(), owner.camera_on, false));
    }
    commands.push(Command::RoomStatus(lifecycle));
    commands
}

fn require_owner(state: &RoomState, intent: &Intent) -> Result<(), ActionError> {
    if state.is_owner() { Ok(()) } else { Err(ActionError::NotOwner { action: intent.name() }) }
}

fn require_lifecycle(
    state: &RoomState,
    intent: &Intent,
    allowed: impl FnOnce(RoomStatus) -> bool,
) -> Result<(), ActionError> {
    let from = state.lifecycle();
    if allowed(from) {
        Ok(())
    } else {
        Err(ActionError::InvalidTransition { from, action: intent.name() })
    }
}

fn known_status(
    state: &RoomState,
    user_id: &str,
) -> Result<UserStatus, ActionError> {
    state.status_of(user_id).ok_or_else(|| ActionError::UnknownUser { user_id: user_id.to_owned() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::room::{Profile, RoomType};

    fn owner_room() -> RoomState {
        let mut state =
            RoomState::new("room", RoomType::SmallClass, "teacher", Profile::placeholder("teacher"));
        state.upsert_profile(Profile::placeholder("s1"));
        state.upsert_profile(Profile::placeholder("s2"));
        state
    }

    fn student_room() -> RoomState {
        let mut state =
            RoomState::new("room", RoomType::SmallClass, "teacher", Profile::placeholder("s1"));
        state.upsert_profile(Profile::placeholder("teacher"));
        state
    }

    fn run(state: &mut RoomState, intent: Intent) -> Result<Vec<Command>, ActionError> {
        translate(state, intent, &StagePolicy::UNLIMITED)
    }

    #[test]
    fn own_device_toggle_is_always_allowed() {
        let mut state = student_room();
        let commands = run(&mut state, Intent::ToggleMic { user_id: "s1".into() }).unwrap();
        assert_eq!(commands, vec![Command::device_state("s1", false, true)]);
        assert!(state.local_status().mic_on);
    }

    #[test]
    fn student_cannot_touch_remote_devices() {
        let mut state = student_room();
        state.update_status("teacher", |s| s.mic_on = true);
        let before = state.clone();

        let err = run(&mut state, Intent::ToggleMic { user_id: "teacher".into() }).unwrap_err();
        assert!(matches!(err, ActionError::NotOwner { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn owner_may_only_turn_remote_devices_off() {
        let mut state = owner_room();
        let err = run(&mut state, Intent::ToggleCamera { user_id: "s1".into() }).unwrap_err();
        assert_eq!(err, ActionError::CannotEnableRemoteDevice { user_id: "s1".into() });

        state.update_status("s1", |s| *s = UserStatus::with_devices(true, true));
        let commands = run(&mut state, Intent::ToggleCamera { user_id: "s1".into() }).unwrap();
        assert_eq!(commands, vec![Command::device_state("s1", false, true)]);
        assert_eq!(state.status_of("s1"), Some(UserStatus::with_devices(false, true)));
    }

    #[test]
    fn raise_hand_rules() {
        let mut owner = owner_room();
        assert_eq!(run(&mut owner, Intent::ToggleRaiseHand), Err(ActionError::OwnerCannotRaiseHand));

        let mut student = student_room();
        let raised = run(&mut student, Intent::ToggleRaiseHand).unwrap();
        assert_eq!(raised, vec![Command::RaiseHand(true)]);
        assert!(student.local_status().is_raising_hand);
        let lowered = run(&mut student, Intent::ToggleRaiseHand).unwrap();
        assert_eq!(lowered, vec![Command::RaiseHand(false)]);

        student.update_status("s1", |s| s.is_speaking = true);
        assert!(matches!(
            run(&mut student, Intent::ToggleRaiseHand),
            Err(ActionError::AlreadySpeaking { .. })
        ));
    }

    #[test]
    fn accept_respects_stage_capacity() {
        let mut state = owner_room();
        let policy = StagePolicy::with_max_speakers(1);

        translate(&mut state, Intent::AcceptRaiseHand { user_id: "s1".into() }, &policy).unwrap();
        assert_eq!(state.status_of("s1"), Some(UserStatus::from_token("SM")));

        let err = translate(&mut state, Intent::AcceptRaiseHand { user_id: "s2".into() }, &policy)
            .unwrap_err();
        assert_eq!(err, ActionError::StageFull { max: 1 });
        assert!(!state.status_of("s2").unwrap().is_speaking);
    }

    #[test]
    fn stop_interaction_batches_commands() {
        let mut state = owner_room();
        state.update_status("s1", |s| s.is_raising_hand = true);
        state.update_status("s2", |s| *s = UserStatus::from_token("SCM"));

        let commands = run(&mut state, Intent::StopInteraction).unwrap();
        assert_eq!(commands, vec![
            Command::CancelHandRaising(true),
            Command::off_stage(["s2"]),
        ]);
        assert!(state.raised_hands().is_empty());
        assert_eq!(state.speaker_count(), 0);
        assert_eq!(state.status_of("s2"), Some(UserStatus::IDLE));

        assert!(run(&mut state, Intent::StopInteraction).unwrap().is_empty());
    }

    #[test]
    fn start_forces_lecture_and_owner_mic() {
        let mut state = owner_room();
        let commands = run(&mut state, Intent::StartClass).unwrap();
        assert_eq!(commands, vec![
            Command::ClassMode(ClassMode::Lecture),
            Command::device_state("teacher", false, true),
            Command::RoomStatus(RoomStatus::Started),
        ]);
        assert_eq!(state.lifecycle(), RoomStatus::Started);
        assert_eq!(state.mode(), ClassMode::Lecture);
        assert!(state.local_status().mic_on);
    }

    #[test]
    fn lifecycle_transitions() {
        let mut state = owner_room();
        assert!(matches!(
            run(&mut state, Intent::PauseClass),
            Err(ActionError::InvalidTransition { from: RoomStatus::Idle, .. })
        ));

        run(&mut state, Intent::StartClass).unwrap();
        assert!(run(&mut state, Intent::StartClass).is_err());

        let paused = run(&mut state, Intent::PauseClass).unwrap();
        assert_eq!(paused, vec![
            Command::device_state("teacher", false, false),
            Command::RoomStatus(RoomStatus::Paused),
        ]);
        assert!(run(&mut state, Intent::PauseClass).is_err());

        run(&mut state, Intent::ResumeClass).unwrap();
        assert_eq!(state.lifecycle(), RoomStatus::Started);

        run(&mut state, Intent::StopClass).unwrap();
        assert_eq!(state.lifecycle(), RoomStatus::Stopped);
        for intent in [Intent::StartClass, Intent::ResumeClass, Intent::StopClass] {
            assert!(run(&mut state, intent).is_err());
        }
    }

    #[test]
    fn owner_only_intents_are_gated() {
        let intents = [
            Intent::AcceptRaiseHand { user_id: "teacher".into() },
            Intent::Disconnect { user_id: "teacher".into() },
            Intent::StopInteraction,
            Intent::StartClass,
            Intent::StopClass,
            Intent::ToggleMessageBan,
            Intent::SetMode(ClassMode::Lecture),
            Intent::SendNotice { text: "hi".into() },
        ];
        for intent in intents {
            let mut state = student_room();
            let before = state.clone();
            assert!(matches!(run(&mut state, intent), Err(ActionError::NotOwner { .. })));
            assert_eq!(state, before);
        }
    }

    #[test]
    fn unknown_target_is_not_user_facing() {
        let mut state = owner_room();
        let err = run(&mut state, Intent::Disconnect { user_id: "ghost".into() }).unwrap_err();
        assert!(!err.is_user_facing());
    }
}
