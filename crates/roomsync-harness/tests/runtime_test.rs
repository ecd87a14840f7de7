//! Full runtimes over the in-memory network.
//!
//! Same `Runtime` and `RoomHandle` code as production, with `SimTransport`
//! and `SimProfiles` in place of the messaging SDK and user directory.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use roomsync_app::{RoomEvent, RoomHandle, Runtime, RuntimeConfig, RuntimeError};
use roomsync_client::{Phase, RoomInfo};
use roomsync_core::{Profile, RoomState, RoomType};
use roomsync_harness::{OWNER_ID, ROOM_ID, SimEnv, SimNetwork};
use roomsync_proto::RoomStatus;
use tokio::{sync::broadcast, task::JoinHandle, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

struct Member {
    handle: RoomHandle,
    events: broadcast::Receiver<RoomEvent>,
    task: JoinHandle<Result<(), RuntimeError>>,
}

fn start(network: &SimNetwork, env: &SimEnv, user_id: &str) -> Member {
    let profile = Profile::new(user_id, user_id.to_uppercase());
    network.register(profile.clone());
    let room = RoomInfo::new(ROOM_ID, RoomType::SmallClass, OWNER_ID, profile);

    let (runtime, handle) = Runtime::new(
        network.transport(user_id),
        network.profiles(),
        env.clone(),
        room,
        RuntimeConfig::default(),
    );
    let events = handle.subscribe();
    let task = tokio::spawn(runtime.run());
    Member { handle, events, task }
}

async fn expect_event(member: &mut Member, wanted: &RoomEvent) {
    loop {
        let event = timeout(WAIT, member.events.recv()).await.unwrap().unwrap();
        if &event == wanted {
            return;
        }
    }
}

async fn until(member: &Member, what: &str, f: impl FnMut(&RoomState) -> bool) {
    let mut rx = member.handle.watch_state();
    let reached = timeout(WAIT, async { rx.wait_for(f).await.map(|_| ()) }).await;
    assert!(matches!(reached, Ok(Ok(()))), "timed out waiting for {what}");
}

#[tokio::test]
async fn teacher_brings_student_on_stage() {
    let network = SimNetwork::new();
    let env = SimEnv::with_seed(1);

    let mut teacher = start(&network, &env, OWNER_ID);
    expect_event(&mut teacher, &RoomEvent::Ready(Phase::EmptyRoom)).await;

    let mut student = start(&network, &env, "s1");
    expect_event(&mut student, &RoomEvent::Ready(Phase::Synced)).await;
    assert_eq!(student.handle.state().user(OWNER_ID).unwrap().profile.name, "TEACHER");

    student.handle.toggle_raise_hand().await.unwrap();
    until(&teacher, "raised hand", |s| s.status_of("s1").is_some_and(|u| u.is_raising_hand))
        .await;

    teacher.handle.accept_raise_hand("s1").await.unwrap();
    until(&student, "stage", |s| s.local_status().is_speaking).await;
    assert!(student.handle.state().can_local_speak());

    teacher.handle.start_class().await.unwrap();
    teacher.handle.stop_class().await.unwrap();

    expect_event(&mut student, &RoomEvent::RoomStopped).await;
    expect_event(&mut student, &RoomEvent::Left).await;
    assert_eq!(student.handle.state().lifecycle(), RoomStatus::Stopped);

    teacher.task.await.unwrap().unwrap();
    student.task.await.unwrap().unwrap();
    assert!(network.members(ROOM_ID).is_empty());
}

#[tokio::test]
async fn departed_student_leaves_every_roster() {
    let network = SimNetwork::new();
    let env = SimEnv::with_seed(2);

    let mut teacher = start(&network, &env, OWNER_ID);
    expect_event(&mut teacher, &RoomEvent::Ready(Phase::EmptyRoom)).await;
    let mut student = start(&network, &env, "s1");
    expect_event(&mut student, &RoomEvent::Ready(Phase::Synced)).await;
    until(&teacher, "student joined", |s| s.contains("s1")).await;

    student.handle.leave().await.unwrap();
    expect_event(&mut student, &RoomEvent::Left).await;
    student.task.await.unwrap().unwrap();

    until(&teacher, "student gone", |s| !s.contains("s1")).await;
    assert_eq!(network.members(ROOM_ID), vec![OWNER_ID.to_owned()]);

    teacher.handle.leave().await.unwrap();
    teacher.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn dropped_connection_ends_session() {
    let network = SimNetwork::new();
    let env = SimEnv::with_seed(3);

    let mut teacher = start(&network, &env, OWNER_ID);
    expect_event(&mut teacher, &RoomEvent::Ready(Phase::EmptyRoom)).await;

    assert!(network.disconnect(ROOM_ID, OWNER_ID));
    expect_event(&mut teacher, &RoomEvent::ConnectionLost).await;
    assert_eq!(teacher.task.await.unwrap(), Err(RuntimeError::ConnectionLost));
    assert!(!teacher.handle.is_running());
}

#[tokio::test]
async fn offline_directory_fails_the_join() {
    let network = SimNetwork::new();
    let env = SimEnv::with_seed(4);

    let mut teacher = start(&network, &env, OWNER_ID);
    expect_event(&mut teacher, &RoomEvent::Ready(Phase::EmptyRoom)).await;

    network.set_directory_offline(true);
    let mut student = start(&network, &env, "s1");
    loop {
        let event = timeout(WAIT, student.events.recv()).await.unwrap().unwrap();
        assert_ne!(event, RoomEvent::Ready(Phase::Synced));
        if matches!(event, RoomEvent::BootstrapFailed { .. }) {
            break;
        }
    }

    let err = student.task.await.unwrap().unwrap_err();
    assert!(err.is_fatal());

    teacher.handle.leave().await.unwrap();
    teacher.task.await.unwrap().unwrap();
}
