//! Classroom scenarios over the synchronous cluster.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use roomsync_client::{
    BootstrapError, ClientConfig, ClientError, DEFAULT_BOOTSTRAP_TIMEOUT,
    DEFAULT_PEER_RESPONSE_TIMEOUT, Phase,
};
use roomsync_core::{ActionError, Intent, RoomNotice, RoomType, StagePolicy};
use roomsync_harness::{Cluster, ClusterError, InvariantRegistry, OWNER_ID};
use roomsync_proto::{ClassMode, Command, RoomStatus, UserStatus, encode};

fn lesson(seed: u64, room_type: RoomType, students: &[&str]) -> Cluster {
    let mut cluster = Cluster::new(seed, room_type);
    cluster.join(OWNER_ID).unwrap();
    cluster.settle().unwrap();
    for student in students {
        cluster.join(student).unwrap();
        cluster.settle().unwrap();
    }
    cluster
}

fn status(cluster: &Cluster, viewer: &str, user: &str) -> UserStatus {
    cluster.state(viewer).unwrap().status_of(user).unwrap()
}

#[test]
fn owner_alone_gets_room_defaults() {
    let cluster = lesson(1, RoomType::SmallClass, &[]);
    let state = cluster.state(OWNER_ID).unwrap();

    assert_eq!(cluster.client(OWNER_ID).unwrap().phase(), Phase::EmptyRoom);
    assert_eq!(state.mode(), ClassMode::Interaction);
    assert!(!state.message_banned());
    assert_eq!(state.lifecycle(), RoomStatus::Idle);
    assert!(state.owner_present());
}

#[test]
fn accepted_hand_goes_on_stage_everywhere() {
    let mut cluster = lesson(2, RoomType::SmallClass, &["s1", "s2"]);

    cluster.perform("s1", Intent::ToggleRaiseHand).unwrap();
    cluster.settle().unwrap();
    assert!(status(&cluster, "s2", "s1").is_raising_hand);
    assert_eq!(cluster.state(OWNER_ID).unwrap().raised_hands().len(), 1);

    cluster.perform(OWNER_ID, Intent::AcceptRaiseHand { user_id: "s1".into() }).unwrap();
    cluster.settle().unwrap();

    for viewer in [OWNER_ID, "s1", "s2"] {
        let s1 = status(&cluster, viewer, "s1");
        assert!(s1.is_speaking, "{viewer} should see s1 speaking");
        assert!(s1.mic_on);
        assert!(!s1.is_raising_hand);
    }
    assert!(cluster.state("s1").unwrap().can_local_speak());
    cluster.check(&InvariantRegistry::standard()).unwrap();
}

#[test]
fn students_cannot_run_the_room() {
    let mut cluster = lesson(3, RoomType::SmallClass, &["s1"]);
    let before = cluster.snapshot();

    for intent in [
        Intent::StartClass,
        Intent::ToggleMessageBan,
        Intent::SetMode(ClassMode::Lecture),
        Intent::AcceptRaiseHand { user_id: "s1".into() },
        Intent::ToggleMic { user_id: OWNER_ID.into() },
    ] {
        let err = cluster.perform("s1", intent).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Client { source: ClientError::Action(ActionError::NotOwner { .. }), .. }
        ));
    }

    assert_eq!(cluster.pending(), 0);
    assert_eq!(cluster.snapshot().replicas, before.replicas);
}

#[test]
fn owner_cannot_switch_student_camera_on() {
    let mut cluster = lesson(4, RoomType::SmallClass, &["s1"]);
    let err = cluster.perform(OWNER_ID, Intent::ToggleCamera { user_id: "s1".into() }).unwrap_err();
    assert!(matches!(
        err,
        ClusterError::Client {
            source: ClientError::Action(ActionError::CannotEnableRemoteDevice { .. }),
            ..
        }
    ));
}

#[test]
fn stop_interaction_clears_stage_and_hands() {
    let mut cluster = lesson(5, RoomType::SmallClass, &["s1", "s2", "s3"]);
    for student in ["s1", "s2"] {
        cluster.perform(student, Intent::ToggleRaiseHand).unwrap();
    }
    cluster.settle().unwrap();
    cluster.perform(OWNER_ID, Intent::AcceptRaiseHand { user_id: "s1".into() }).unwrap();
    cluster.perform("s3", Intent::ToggleRaiseHand).unwrap();
    cluster.settle().unwrap();

    cluster.perform(OWNER_ID, Intent::StopInteraction).unwrap();
    cluster.settle().unwrap();

    for viewer in cluster.ids() {
        let state = cluster.state(&viewer).unwrap();
        assert_eq!(state.speaker_count(), 0, "{viewer}");
        assert!(state.raised_hands().is_empty(), "{viewer}");
        assert_eq!(state.status_of("s1"), Some(UserStatus::IDLE), "{viewer}");
    }
    cluster.check(&InvariantRegistry::standard()).unwrap();
}

#[test]
fn unknown_commands_are_surfaced_not_fatal() {
    let mut cluster = lesson(6, RoomType::SmallClass, &["s1"]);
    let before = cluster.snapshot();

    cluster.inject("s1", OWNER_ID, r#"{"t":"Whiteboard","v":{"page":3}}"#);
    cluster.inject("s1", OWNER_ID, "not json");
    cluster.settle().unwrap();

    assert_eq!(cluster.snapshot().replicas, before.replicas);
    let unrecognized = cluster
        .notices()
        .iter()
        .filter(|(to, n)| to == "s1" && matches!(n, RoomNotice::Unrecognized { .. }))
        .count();
    assert_eq!(unrecognized, 2);
}

#[test]
fn repeated_snapshot_changes_nothing() {
    let mut cluster = lesson(7, RoomType::SmallClass, &["s1"]);
    cluster.perform(OWNER_ID, Intent::StartClass).unwrap();
    cluster.settle().unwrap();

    let snapshot = Command::ChannelStatus(cluster.state(OWNER_ID).unwrap().snapshot());
    let text = encode(&snapshot).unwrap();
    let before = cluster.snapshot();

    cluster.inject("s1", OWNER_ID, text.clone());
    cluster.inject("s1", OWNER_ID, text);
    cluster.settle().unwrap();

    assert_eq!(cluster.snapshot().replicas, before.replicas);
}

#[test]
fn room_snapshot_on_the_wire() {
    let mut cluster = lesson(8, RoomType::SmallClass, &["s1"]);
    cluster.perform("s1", Intent::ToggleRaiseHand).unwrap();
    cluster.perform(OWNER_ID, Intent::StartClass).unwrap();
    cluster.settle().unwrap();

    let snapshot = Command::ChannelStatus(cluster.state("s1").unwrap().snapshot());
    insta::assert_snapshot!(encode(&snapshot).unwrap(), @r#"{"t":"ChannelStatus","v":{"banMessage":false,"roomStartStatus":"Started","classRoomMode":"Lecture","userStates":{"s1":"R","teacher":"M"}}}"#);
}

#[test]
fn stopping_the_room_reaches_everyone() {
    let mut cluster = lesson(9, RoomType::SmallClass, &["s1", "s2"]);
    cluster.perform(OWNER_ID, Intent::StartClass).unwrap();
    cluster.perform(OWNER_ID, Intent::StopClass).unwrap();
    cluster.settle().unwrap();

    for viewer in cluster.ids() {
        assert!(cluster.saw_stop(&viewer), "{viewer}");
        assert_eq!(cluster.state(&viewer).unwrap().lifecycle(), RoomStatus::Stopped);
    }

    let err = cluster.perform(OWNER_ID, Intent::StartClass).unwrap_err();
    assert!(matches!(
        err,
        ClusterError::Client {
            source: ClientError::Action(ActionError::InvalidTransition { .. }),
            ..
        }
    ));
}

#[test]
fn big_class_forces_joiner_devices_off() {
    let mut cluster = lesson(10, RoomType::BigClass, &[]);
    cluster.join_with_devices("s1", true, true).unwrap();
    cluster.settle().unwrap();

    for viewer in [OWNER_ID, "s1"] {
        assert_eq!(status(&cluster, viewer, "s1"), UserStatus::IDLE, "{viewer}");
    }
    assert_eq!(cluster.state("s1").unwrap().stage_users().len(), 1);
}

#[test]
fn joiner_with_live_devices_converges() {
    let mut cluster = lesson(11, RoomType::SmallClass, &["s1", "s2"]);
    cluster.join_with_devices("s3", true, true).unwrap();
    cluster.settle().unwrap();

    for viewer in cluster.ids() {
        assert_eq!(status(&cluster, &viewer, "s3"), UserStatus::with_devices(true, true), "{viewer}");
    }
    cluster.check(&InvariantRegistry::standard()).unwrap();
}

#[test]
fn commands_during_bootstrap_are_replayed() {
    let mut cluster = lesson(12, RoomType::SmallClass, &["s1"]);
    cluster.join("s2").unwrap();

    // s1 acts while s2 is still waiting for its snapshot.
    cluster.step().unwrap();
    cluster.perform("s1", Intent::ToggleRaiseHand).unwrap();
    cluster.settle().unwrap();

    assert!(status(&cluster, "s2", "s1").is_raising_hand);
    cluster.check(&InvariantRegistry::standard()).unwrap();
}

/// Joins `user_id` and delivers until its snapshot request is in flight.
fn join_until_requesting(cluster: &mut Cluster, user_id: &str) -> String {
    cluster.join(user_id).unwrap();
    while cluster.client(user_id).unwrap().phase() != Phase::AwaitingSnapshot {
        assert!(cluster.step().unwrap(), "bootstrap stalled before the request");
    }
    cluster.client(user_id).unwrap().snapshot_target().unwrap().to_owned()
}

#[test]
fn silent_peer_is_replaced_by_another() {
    let mut cluster = lesson(13, RoomType::SmallClass, &["s1"]);
    let first = join_until_requesting(&mut cluster, "s2");
    assert_eq!(cluster.lose_messages_to(&first), 1);
    cluster.settle().unwrap();
    assert_eq!(cluster.client("s2").unwrap().phase(), Phase::AwaitingSnapshot);

    cluster.advance(DEFAULT_PEER_RESPONSE_TIMEOUT).unwrap();
    let second = cluster.client("s2").unwrap().snapshot_target().unwrap().to_owned();
    assert_ne!(first, second);

    cluster.settle().unwrap();
    assert_eq!(cluster.client("s2").unwrap().phase(), Phase::Synced);
    cluster.check(&InvariantRegistry::standard()).unwrap();
}

#[test]
fn stalled_bootstrap_times_out() {
    let config = ClientConfig {
        peer_response_timeout: Duration::from_secs(60),
        ..ClientConfig::default()
    };
    let mut cluster = Cluster::with_config(14, RoomType::SmallClass, config);
    cluster.join(OWNER_ID).unwrap();
    cluster.settle().unwrap();

    let target = join_until_requesting(&mut cluster, "s1");
    cluster.lose_messages_to(&target);
    cluster.settle().unwrap();

    let err = cluster.advance(DEFAULT_BOOTSTRAP_TIMEOUT).unwrap_err();
    assert!(matches!(
        err,
        ClusterError::Client {
            source: ClientError::Bootstrap(BootstrapError::Timeout { .. }),
            ..
        }
    ));
    assert_eq!(cluster.client("s1").unwrap().phase(), Phase::Failed);
}

#[test]
fn roster_lookup_failure_fails_bootstrap() {
    let mut cluster = lesson(15, RoomType::SmallClass, &[]);
    cluster.set_directory_offline(true);
    cluster.join("s1").unwrap();

    let err = cluster.settle().unwrap_err();
    assert!(matches!(
        err,
        ClusterError::Client {
            source: ClientError::Bootstrap(BootstrapError::ProfileLookup { .. }),
            ..
        }
    ));
    assert_eq!(cluster.client("s1").unwrap().phase(), Phase::Failed);
}

#[test]
fn full_stage_rejects_another_speaker() {
    let config = ClientConfig { stage: StagePolicy::with_max_speakers(1), ..ClientConfig::default() };
    let mut cluster = Cluster::with_config(16, RoomType::SmallClass, config);
    for id in [OWNER_ID, "s1", "s2"] {
        cluster.join(id).unwrap();
        cluster.settle().unwrap();
    }

    cluster.perform(OWNER_ID, Intent::AcceptRaiseHand { user_id: "s1".into() }).unwrap();
    let err =
        cluster.perform(OWNER_ID, Intent::AcceptRaiseHand { user_id: "s2".into() }).unwrap_err();
    assert!(matches!(
        err,
        ClusterError::Client { source: ClientError::Action(ActionError::StageFull { max: 1 }), .. }
    ));
}
