//! Compact per-user status token.
//!
//! A user's interaction state is four independent flags. On the wire it is
//! carried as a short token: one letter per set flag, in the canonical order
//! `S` (speaking), `R` (raising hand), `C` (camera), `M` (mic). An empty token
//! means every flag is false.
//!
//! # Invariants
//!
//! - `UserStatus::from_token(&s.to_token()) == s` for every status.
//! - Encoding is canonical; decoding is permissive: letter order does not
//!   matter and unknown characters are ignored.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SPEAKING: char = 'S';
const RAISING_HAND: char = 'R';
const CAMERA: char = 'C';
const MIC: char = 'M';

/// Interaction and device flags for one room participant.
///
/// The data model enforces no cross-field constraints. Keeping camera and mic
/// off for users that leave the stage is the reducer's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UserStatus {
    /// User currently holds an active media slot ("on stage").
    pub is_speaking: bool,
    /// User has a raised hand pending.
    pub is_raising_hand: bool,
    /// Camera is publishing.
    pub camera_on: bool,
    /// Microphone is publishing.
    pub mic_on: bool,
}

impl UserStatus {
    /// All flags false.
    pub const IDLE: Self =
        Self { is_speaking: false, is_raising_hand: false, camera_on: false, mic_on: false };

    /// Status with the given device flags and no stage or hand state.
    #[must_use]
    pub const fn with_devices(camera_on: bool, mic_on: bool) -> Self {
        Self { is_speaking: false, is_raising_hand: false, camera_on, mic_on }
    }

    /// Canonical wire token.
    #[must_use]
    pub fn to_token(self) -> String {
        let mut token = String::with_capacity(4);
        for (set, letter) in [
            (self.is_speaking, SPEAKING),
            (self.is_raising_hand, RAISING_HAND),
            (self.camera_on, CAMERA),
            (self.mic_on, MIC),
        ] {
            if set {
                token.push(letter);
            }
        }
        token
    }

    /// Decode a token. Never fails; unknown characters are ignored.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        Self {
            is_speaking: token.contains(SPEAKING),
            is_raising_hand: token.contains(RAISING_HAND),
            camera_on: token.contains(CAMERA),
            mic_on: token.contains(MIC),
        }
    }

    /// Status after being forced off the stage.
    #[must_use]
    pub const fn off_stage(self) -> Self {
        Self { is_speaking: false, camera_on: false, mic_on: false, ..self }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = self.to_token();
        if token.is_empty() { f.write_str("-") } else { f.write_str(&token) }
    }
}

impl Serialize for UserStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_token())
    }
}

impl<'de> Deserialize<'de> for UserStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Ok(Self::from_token(&token))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn token_is_canonical_order() {
        let status =
            UserStatus { is_speaking: true, is_raising_hand: true, camera_on: true, mic_on: true };
        assert_eq!(status.to_token(), "SRCM");

        let status = UserStatus { mic_on: true, camera_on: true, ..UserStatus::IDLE };
        assert_eq!(status.to_token(), "CM");
    }

    #[test]
    fn idle_status_encodes_empty() {
        assert_eq!(UserStatus::IDLE.to_token(), "");
        assert_eq!(UserStatus::from_token(""), UserStatus::IDLE);
    }

    #[test]
    fn decode_ignores_order_and_noise() {
        let status = UserStatus::from_token("Mx?S");
        assert!(status.is_speaking);
        assert!(status.mic_on);
        assert!(!status.camera_on);
        assert!(!status.is_raising_hand);
    }

    #[test]
    fn off_stage_keeps_raised_hand() {
        let status =
            UserStatus { is_speaking: true, is_raising_hand: true, camera_on: true, mic_on: true };
        let off = status.off_stage();
        assert_eq!(off, UserStatus { is_raising_hand: true, ..UserStatus::IDLE });
    }

    #[test]
    fn serde_uses_token() {
        let status = UserStatus::with_devices(true, false);
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"C\"");

        let back: UserStatus = serde_json::from_str("\"MC\"").unwrap();
        assert_eq!(back, UserStatus::with_devices(true, true));
    }
}
