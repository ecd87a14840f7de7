//! Client configuration.

use std::time::Duration;

use roomsync_core::{Profile, RoomType, StagePolicy};
use roomsync_proto::{UserId, UserStatus};

/// Time allowed from join until the replica is ready.
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(15);

/// Time a chosen peer has to answer a status request before another is asked.
pub const DEFAULT_PEER_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Upper bound on commands held while the replica bootstraps.
pub const MAX_PENDING_COMMANDS: usize = 1024;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for the whole bootstrap.
    pub bootstrap_timeout: Duration,
    /// Deadline for one peer to answer a status request.
    pub peer_response_timeout: Duration,
    /// Stage admission limits for owner intents.
    pub stage: StagePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bootstrap_timeout: DEFAULT_BOOTSTRAP_TIMEOUT,
            peer_response_timeout: DEFAULT_PEER_RESPONSE_TIMEOUT,
            stage: StagePolicy::UNLIMITED,
        }
    }
}

/// What the client knows about the room before joining.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    /// Room id.
    pub room_id: String,
    /// Room type.
    pub room_type: RoomType,
    /// Owner's user id.
    pub owner_id: UserId,
    /// Local user's profile.
    pub local: Profile,
    /// Local device state at join time.
    pub local_status: UserStatus,
}

impl RoomInfo {
    /// Room info with idle local devices.
    pub fn new(
        room_id: impl Into<String>,
        room_type: RoomType,
        owner_id: impl Into<UserId>,
        local: Profile,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            room_type,
            owner_id: owner_id.into(),
            local,
            local_status: UserStatus::IDLE,
        }
    }

    /// Sets the local device state at join time.
    #[must_use]
    pub fn with_devices(mut self, camera_on: bool, mic_on: bool) -> Self {
        self.local_status = UserStatus::with_devices(camera_on, mic_on);
        self
    }
}
