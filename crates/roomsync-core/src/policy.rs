//! Stage admission policy.

/// Limits applied when the owner brings users on stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagePolicy {
    /// Maximum number of simultaneous speakers. `None` is unlimited.
    pub max_speakers: Option<usize>,
}

impl StagePolicy {
    /// No speaker limit.
    pub const UNLIMITED: Self = Self { max_speakers: None };

    /// Policy with a speaker limit.
    pub const fn with_max_speakers(max: usize) -> Self {
        Self { max_speakers: Some(max) }
    }

    /// Whether one more speaker fits when `current` users are on stage.
    pub fn admits(&self, current: usize) -> bool {
        self.max_speakers.is_none_or(|max| current < max)
    }
}
