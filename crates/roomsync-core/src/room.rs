//! Local room replica.
//!
//! [`RoomState`] is one participant's view of the room: the ordered roster,
//! lifecycle, class mode, message ban, and owner identity. It is mutated only
//! by the reducer ([`crate::dispatch`]) and the translator
//! ([`crate::translate`]); presentation code receives clones.
//!
//! # Invariants
//!
//! - The local user is always in the roster. [`RoomState::remove`] refuses to
//!   remove it.
//! - Roster order is insertion order. Re-inserting an existing id updates it in
//!   place.

use std::collections::BTreeMap;

use roomsync_proto::{ChannelStatus, ClassMode, RoomStatus, UserId, UserStatus};

/// Identity data for a participant, as returned by the profile lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Stable user id.
    pub id: UserId,
    /// Numeric id used by the media layer.
    pub media_id: u64,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub avatar: Option<String>,
}

impl Profile {
    /// Profile with the given id and display name, no media id or avatar.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), media_id: 0, name: name.into(), avatar: None }
    }

    /// Stand-in profile for a user the lookup has not resolved.
    ///
    /// The display name falls back to the id.
    pub fn placeholder(id: impl Into<UserId>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id)
    }
}

/// A room participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Identity.
    pub profile: Profile,
    /// Interaction and device flags.
    pub status: UserStatus,
}

impl User {
    /// User id.
    pub fn id(&self) -> &str {
        &self.profile.id
    }
}

/// Classroom shape. Decides who may interact and who is shown on stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RoomType {
    /// Large lecture: students interact only when brought on stage.
    BigClass,
    /// Small group: interaction follows the class mode.
    #[default]
    SmallClass,
    /// One teacher, one student: always interactive.
    OneToOne,
}

impl RoomType {
    /// Whether students may use their devices freely in `mode`.
    pub const fn interaction_enabled(self, mode: ClassMode) -> bool {
        match self {
            Self::BigClass => false,
            Self::SmallClass => mode.allows_interaction(),
            Self::OneToOne => true,
        }
    }

    /// Whether the stage shows every participant, not only owner and speakers.
    pub const fn shows_everyone(self) -> bool {
        !matches!(self, Self::BigClass)
    }
}

/// One participant's replica of the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    room_id: String,
    room_type: RoomType,
    owner_id: UserId,
    local_user_id: UserId,
    users: Vec<User>,
    lifecycle: RoomStatus,
    mode: ClassMode,
    message_banned: bool,
}

impl RoomState {
    /// Fresh replica containing only the local user, with idle status.
    pub fn new(
        room_id: impl Into<String>,
        room_type: RoomType,
        owner_id: impl Into<UserId>,
        local: Profile,
    ) -> Self {
        let local_user_id = local.id.clone();
        Self {
            room_id: room_id.into(),
            room_type,
            owner_id: owner_id.into(),
            local_user_id,
            users: vec![User { profile: local, status: UserStatus::IDLE }],
            lifecycle: RoomStatus::Idle,
            mode: ClassMode::default(),
            message_banned: false,
        }
    }

    /// Room id.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Room type.
    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    /// Owner's user id.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Local user's id.
    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    /// Lifecycle status.
    pub fn lifecycle(&self) -> RoomStatus {
        self.lifecycle
    }

    /// Class mode.
    pub fn mode(&self) -> ClassMode {
        self.mode
    }

    /// Whether students are barred from sending chat messages.
    pub fn message_banned(&self) -> bool {
        self.message_banned
    }

    /// Roster in insertion order.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Looks up a user by id.
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id() == id)
    }

    /// Whether `id` is in the roster.
    pub fn contains(&self, id: &str) -> bool {
        self.user(id).is_some()
    }

    /// Status of a user, if present.
    pub fn status_of(&self, id: &str) -> Option<UserStatus> {
        self.user(id).map(|u| u.status)
    }

    /// Whether the local user owns the room.
    pub fn is_owner(&self) -> bool {
        self.local_user_id == self.owner_id
    }

    /// Whether `id` is the owner.
    pub fn is_user_owner(&self, id: &str) -> bool {
        self.owner_id == id
    }

    /// The local user.
    pub fn local_user(&self) -> Option<&User> {
        self.user(&self.local_user_id)
    }

    /// The local user's status.
    pub fn local_status(&self) -> UserStatus {
        self.status_of(&self.local_user_id).unwrap_or_default()
    }

    /// Whether the owner is currently in the roster.
    pub fn owner_present(&self) -> bool {
        self.contains(&self.owner_id)
    }

    /// Number of users on stage.
    pub fn speaker_count(&self) -> usize {
        self.users.iter().filter(|u| u.status.is_speaking).count()
    }

    /// Ids of users with a raised hand, in roster order.
    pub fn raised_hands(&self) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|u| u.status.is_raising_hand)
            .map(|u| u.profile.id.clone())
            .collect()
    }

    /// Whether students may use their devices without being on stage.
    pub fn interaction_enabled(&self) -> bool {
        self.room_type.interaction_enabled(self.mode)
    }

    /// Whether the local user may publish audio.
    pub fn can_local_speak(&self) -> bool {
        self.is_owner()
            || self.room_type == RoomType::OneToOne
            || self.mode.allows_interaction()
            || self.local_status().is_speaking
    }

    /// Whether the local user may draw on the whiteboard.
    pub fn whiteboard_writable(&self) -> bool {
        self.is_owner() || self.interaction_enabled() || self.local_status().is_speaking
    }

    /// Users shown on stage, in roster order.
    pub fn stage_users(&self) -> Vec<&User> {
        if self.room_type.shows_everyone() {
            return self.users.iter().collect();
        }
        self.users
            .iter()
            .filter(|u| u.status.is_speaking || self.is_user_owner(u.id()))
            .collect()
    }

    /// Status snapshot for a joining peer.
    pub fn snapshot(&self) -> ChannelStatus {
        let user_states: BTreeMap<UserId, UserStatus> =
            self.users.iter().map(|u| (u.profile.id.clone(), u.status)).collect();
        ChannelStatus {
            message_banned: self.message_banned,
            lifecycle: self.lifecycle,
            mode: self.mode,
            user_states,
        }
    }

    /// Inserts or replaces a user. Returns true if the user was new.
    pub fn upsert(&mut self, profile: Profile, status: UserStatus) -> bool {
        match self.users.iter_mut().find(|u| u.profile.id == profile.id) {
            Some(user) => {
                user.profile = profile;
                user.status = status;
                false
            },
            None => {
                self.users.push(User { profile, status });
                true
            },
        }
    }

    /// Inserts a user with idle status, or refreshes the profile of an existing
    /// one while keeping its status. Returns true if the user was new.
    pub fn upsert_profile(&mut self, profile: Profile) -> bool {
        if self.refresh_profile(profile.clone()) {
            return false;
        }
        self.users.push(User { profile, status: UserStatus::IDLE });
        true
    }

    /// Replaces the profile of a user already in the roster. Returns false if
    /// the user is absent.
    pub fn refresh_profile(&mut self, profile: Profile) -> bool {
        match self.users.iter_mut().find(|u| u.profile.id == profile.id) {
            Some(user) => {
                user.profile = profile;
                true
            },
            None => false,
        }
    }

    /// Removes a remote user. The local user is never removed.
    pub fn remove(&mut self, id: &str) -> Option<User> {
        if id == self.local_user_id {
            return None;
        }
        let idx = self.users.iter().position(|u| u.id() == id)?;
        Some(self.users.remove(idx))
    }

    /// Applies `f` to one user's status. Returns false if the user is absent.
    pub fn update_status(&mut self, id: &str, f: impl FnOnce(&mut UserStatus)) -> bool {
        match self.users.iter_mut().find(|u| u.profile.id == id) {
            Some(user) => {
                f(&mut user.status);
                true
            },
            None => false,
        }
    }

    /// Applies `f` to every user's status.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut UserStatus)) {
        for user in &mut self.users {
            f(&mut user.status);
        }
    }

    /// Overwrites the lifecycle status. Returns the previous one.
    pub fn set_lifecycle(&mut self, lifecycle: RoomStatus) -> RoomStatus {
        std::mem::replace(&mut self.lifecycle, lifecycle)
    }

    /// Overwrites the class mode.
    pub fn set_mode(&mut self, mode: ClassMode) {
        self.mode = mode;
    }

    /// Overwrites the message ban flag.
    pub fn set_message_banned(&mut self, banned: bool) {
        self.message_banned = banned;
    }

    /// Applies the defaults of a room nobody else is in: no message ban and
    /// interactive mode.
    pub fn apply_empty_room_defaults(&mut self) {
        self.message_banned = false;
        self.mode = ClassMode::Interaction;
    }

    /// Forces a student's own camera and mic off when the room does not allow
    /// free interaction.
    ///
    /// Returns the new local status if it changed. Owners and users on stage
    /// are left alone.
    pub fn normalize_local_devices(&mut self) -> Option<UserStatus> {
        if self.is_owner() || self.interaction_enabled() {
            return None;
        }
        let before = self.local_status();
        if before.is_speaking || !(before.camera_on || before.mic_on) {
            return None;
        }
        let local = self.local_user_id.clone();
        self.update_status(&local, |s| {
            s.camera_on = false;
            s.mic_on = false;
        });
        Some(self.local_status())
    }
}
