//! Scripted lesson over the simulated cluster.
//!
//! The owner opens the room, students arrive one at a time, the class starts,
//! every student raises a hand and the owner accepts them in arrival order
//! until the stage is full. Then the owner clears the stage and stops the
//! class. Invariants are checked at every checkpoint.

use roomsync_client::{ClientConfig, ClientError};
use roomsync_core::{Intent, RoomType, StagePolicy};
use roomsync_harness::{
    Cluster, ClusterError, InvariantRegistry, OWNER_ID, SystemSnapshot, Violation,
};
use roomsync_proto::UserId;
use thiserror::Error;

/// Default number of students.
pub const DEFAULT_STUDENTS: usize = 4;

/// Parameters for one lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonConfig {
    /// Students besides the owner.
    pub students: usize,
    /// Seed for the simulated environment.
    pub seed: u64,
    /// Room kind.
    pub room_type: RoomType,
    /// Stage limit. `None` is unlimited.
    pub max_speakers: Option<usize>,
}

impl Default for LessonConfig {
    fn default() -> Self {
        Self {
            students: DEFAULT_STUDENTS,
            seed: 0,
            room_type: RoomType::SmallClass,
            max_speakers: None,
        }
    }
}

/// Lesson failures.
#[derive(Error, Debug)]
pub enum LessonError {
    /// The cluster rejected an event or never went quiet
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// A participant's intent was refused
    #[error("{user_id} could not {intent}: {source}")]
    Refused {
        /// Who acted
        user_id: UserId,
        /// Intent name
        intent: &'static str,
        /// Why it was refused
        source: ClientError,
    },

    /// Replicas broke an invariant
    #[error("{} invariant violation(s) {checkpoint}, first: {}", .violations.len(), first(.violations))]
    Invariants {
        /// Where in the script
        checkpoint: &'static str,
        /// What broke
        violations: Vec<Violation>,
    },

    /// A replica missed the end of the class
    #[error("{0} never saw the room stop")]
    StopNotSeen(UserId),
}

fn first(violations: &[Violation]) -> String {
    violations.first().map(ToString::to_string).unwrap_or_default()
}

/// What happened during a lesson.
#[derive(Debug, Clone)]
pub struct LessonReport {
    /// Students brought on stage, in order.
    pub accepted: Vec<UserId>,
    /// Students whose raised hand the owner could not accept.
    pub left_waiting: Vec<UserId>,
    /// Events delivered between replicas.
    pub deliveries: usize,
    /// Most users on stage at once.
    pub peak_speakers: usize,
    /// Every replica at the end.
    pub last: SystemSnapshot,
}

/// Student id for a 1-based position.
pub fn student_id(n: usize) -> UserId {
    format!("s{n}")
}

/// Run the scripted lesson.
///
/// # Errors
///
/// Fails if the cluster misbehaves, the owner is refused a step, an
/// invariant breaks, or some replica never sees the stop. Refused hands and
/// accepts are part of the report, not errors.
pub fn run_lesson(config: &LessonConfig) -> Result<LessonReport, LessonError> {
    let stage = config.max_speakers.map_or(StagePolicy::UNLIMITED, StagePolicy::with_max_speakers);
    let registry = InvariantRegistry::for_policy(&stage);
    let client = ClientConfig { stage, ..ClientConfig::default() };
    let mut lesson = Lesson {
        cluster: Cluster::with_config(config.seed, config.room_type, client),
        registry,
        deliveries: 0,
    };

    lesson.cluster.join(OWNER_ID)?;
    lesson.settle()?;
    let students: Vec<UserId> = (1..=config.students).map(student_id).collect();
    for (i, id) in students.iter().enumerate() {
        // Every other student arrives with the camera on.
        lesson.cluster.join_with_devices(id, i % 2 == 0, false)?;
        lesson.settle()?;
    }
    lesson.checkpoint("after joins")?;

    lesson.owner(Intent::StartClass)?;

    for id in &students {
        if let Err(e) = lesson.attempt(id, Intent::ToggleRaiseHand) {
            tracing::debug!(user_id = id.as_str(), error = %e, "hand stayed down");
        }
    }
    lesson.checkpoint("after raised hands")?;

    let mut accepted = Vec::new();
    let mut left_waiting = Vec::new();
    for id in &students {
        match lesson.attempt(OWNER_ID, Intent::AcceptRaiseHand { user_id: id.clone() }) {
            Ok(()) => accepted.push(id.clone()),
            Err(e) => {
                tracing::info!(user_id = id.as_str(), reason = %e, "hand not accepted");
                left_waiting.push(id.clone());
            },
        }
    }
    lesson.checkpoint("with stage")?;
    let peak_speakers = lesson.speakers();

    lesson.owner(Intent::StopInteraction)?;
    lesson.checkpoint("after stop interaction")?;

    lesson.owner(Intent::StopClass)?;
    lesson.checkpoint("after stop")?;
    for id in lesson.cluster.ids() {
        if !lesson.cluster.saw_stop(&id) {
            return Err(LessonError::StopNotSeen(id));
        }
    }

    Ok(LessonReport {
        accepted,
        left_waiting,
        deliveries: lesson.deliveries,
        peak_speakers,
        last: lesson.cluster.snapshot(),
    })
}

struct Lesson {
    cluster: Cluster,
    registry: InvariantRegistry,
    deliveries: usize,
}

impl Lesson {
    fn settle(&mut self) -> Result<(), ClusterError> {
        self.deliveries += self.cluster.settle()?;
        Ok(())
    }

    /// Perform and settle. Refusals come back as the client's error.
    fn attempt(&mut self, user_id: &str, intent: Intent) -> Result<(), LessonError> {
        let name = intent.name();
        match self.cluster.perform(user_id, intent) {
            Ok(()) => {},
            Err(ClusterError::Client {
                source: source @ (ClientError::Action(_) | ClientError::NotReady { .. }),
                ..
            }) => {
                let user_id = user_id.to_owned();
                return Err(LessonError::Refused { user_id, intent: name, source });
            },
            Err(e) => return Err(e.into()),
        }
        self.settle()?;
        Ok(())
    }

    fn owner(&mut self, intent: Intent) -> Result<(), LessonError> {
        self.attempt(OWNER_ID, intent)
    }

    fn checkpoint(&self, checkpoint: &'static str) -> Result<(), LessonError> {
        self.cluster
            .check(&self.registry)
            .map_err(|violations| LessonError::Invariants { checkpoint, violations })?;
        tracing::debug!(checkpoint, deliveries = self.deliveries, "invariants hold");
        Ok(())
    }

    fn speakers(&self) -> usize {
        self.cluster.state(OWNER_ID).map_or(0, |s| s.speaker_count())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use roomsync_proto::RoomStatus;

    use super::*;

    #[test]
    fn default_lesson_puts_everyone_on_stage() {
        let report = run_lesson(&LessonConfig::default()).unwrap();

        assert_eq!(report.accepted, vec!["s1", "s2", "s3", "s4"]);
        assert!(report.left_waiting.is_empty());
        assert_eq!(report.peak_speakers, 4);
        assert_eq!(report.last.replicas.len(), 5);
        for replica in &report.last.replicas {
            assert_eq!(replica.lifecycle, RoomStatus::Stopped);
            assert_eq!(replica.speakers(), 0);
        }
    }

    #[test]
    fn stage_limit_leaves_hands_waiting() {
        let config = LessonConfig { students: 5, max_speakers: Some(2), ..LessonConfig::default() };
        let report = run_lesson(&config).unwrap();

        assert_eq!(report.accepted, vec!["s1", "s2"]);
        assert_eq!(report.left_waiting, vec!["s3", "s4", "s5"]);
        assert_eq!(report.peak_speakers, 2);
    }

    #[test]
    fn big_class_runs_to_the_end() {
        let config = LessonConfig { room_type: RoomType::BigClass, seed: 7, ..LessonConfig::default() };
        let report = run_lesson(&config).unwrap();

        let owner = report.last.replicas.iter().find(|r| r.user_id == OWNER_ID).unwrap();
        for status in owner.statuses.values() {
            assert!(!status.camera_on, "big class devices start off");
        }
    }

    #[test]
    fn owner_alone_still_stops() {
        let config = LessonConfig { students: 0, ..LessonConfig::default() };
        let report = run_lesson(&config).unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(report.last.replicas.len(), 1);
    }

    #[test]
    fn same_seed_same_report() {
        let config = LessonConfig { seed: 42, ..LessonConfig::default() };
        let a = run_lesson(&config).unwrap();
        let b = run_lesson(&config).unwrap();

        assert_eq!(a.deliveries, b.deliveries);
        assert_eq!(a.last.replicas, b.last.replicas);
    }
}
