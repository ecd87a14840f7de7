//! Cluster convergence tests using deterministic simulation.
//!
//! Random lessons run against a [`Cluster`], settling after every operation.
//! Once nothing is in flight, every ready replica must agree and the standard
//! invariants must hold.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use roomsync_client::{ClientConfig, Phase};
use roomsync_core::{RoomType, StagePolicy};
use roomsync_harness::{Actor, Cluster, InvariantRegistry, OWNER_ID, Operation, Outcome};

fn actor() -> impl Strategy<Value = Actor> {
    (0u8..=6).prop_map(Actor)
}

fn student() -> impl Strategy<Value = Actor> {
    (1u8..=6).prop_map(Actor)
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (student(), any::<bool>(), any::<bool>())
            .prop_map(|(who, camera, mic)| Operation::Join { who, camera, mic }),
        1 => student().prop_map(Operation::Leave),
        2 => (actor(), actor()).prop_map(|(actor, target)| Operation::ToggleCamera { actor, target }),
        2 => (actor(), actor()).prop_map(|(actor, target)| Operation::ToggleMic { actor, target }),
        3 => actor().prop_map(Operation::RaiseHand),
        3 => student().prop_map(Operation::Accept),
        1 => student().prop_map(Operation::Disconnect),
        1 => Just(Operation::StopInteraction),
        1 => Just(Operation::Start),
        1 => Just(Operation::Pause),
        1 => Just(Operation::Resume),
        1 => Just(Operation::Stop),
        1 => actor().prop_map(Operation::ToggleBan),
        1 => (actor(), any::<bool>()).prop_map(|(actor, lecture)| Operation::SetMode { actor, lecture }),
        1 => (0u16..5_000).prop_map(|millis| Operation::Advance { millis }),
    ]
}

fn room_type() -> impl Strategy<Value = RoomType> {
    prop_oneof![Just(RoomType::BigClass), Just(RoomType::SmallClass), Just(RoomType::OneToOne)]
}

fn run_lesson(cluster: &mut Cluster, ops: &[Operation], registry: &InvariantRegistry) {
    for (i, op) in ops.iter().enumerate() {
        op.apply(cluster).unwrap();
        registry.assert_all(&cluster.snapshot(), &format!("after op {i} ({op:?})"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_lessons_converge(
        seed in any::<u64>(),
        room_type in room_type(),
        ops in prop::collection::vec(operation(), 1..40),
    ) {
        let mut cluster = Cluster::new(seed, room_type);
        cluster.join(OWNER_ID).unwrap();
        cluster.settle().unwrap();

        run_lesson(&mut cluster, &ops, &InvariantRegistry::standard());

        for id in cluster.ids() {
            prop_assert!(cluster.client(&id).unwrap().is_ready(), "{id} never became ready");
        }
    }

    #[test]
    fn stage_limit_holds_under_random_accepts(
        seed in any::<u64>(),
        max in 1usize..3,
        ops in prop::collection::vec(operation(), 1..40),
    ) {
        let config = ClientConfig {
            stage: StagePolicy::with_max_speakers(max),
            ..ClientConfig::default()
        };
        let mut cluster = Cluster::with_config(seed, RoomType::SmallClass, config);
        cluster.join(OWNER_ID).unwrap();
        cluster.settle().unwrap();

        let registry = InvariantRegistry::for_policy(&cluster.config().stage);
        run_lesson(&mut cluster, &ops, &registry);
    }
}

#[test]
fn same_seed_same_lesson() {
    let ops = vec![
        Operation::Join { who: Actor(1), camera: true, mic: false },
        Operation::Join { who: Actor(2), camera: false, mic: false },
        Operation::Join { who: Actor(3), camera: false, mic: true },
        Operation::RaiseHand(Actor(2)),
        Operation::Accept(Actor(2)),
        Operation::Start,
    ];

    let run = |seed| {
        let mut cluster = Cluster::new(seed, RoomType::SmallClass);
        cluster.join(OWNER_ID).unwrap();
        cluster.settle().unwrap();
        for op in &ops {
            op.apply(&mut cluster).unwrap();
        }
        cluster.snapshot().replicas
    };

    assert_eq!(run(9), run(9));
}

#[test]
fn late_joiner_sees_lesson_in_progress() {
    let mut cluster = Cluster::new(5, RoomType::SmallClass);
    cluster.join(OWNER_ID).unwrap();
    cluster.settle().unwrap();

    let script = [
        Operation::Join { who: Actor(1), camera: false, mic: false },
        Operation::Start,
        Operation::RaiseHand(Actor(1)),
        Operation::Join { who: Actor(2), camera: false, mic: false },
    ];
    for op in &script {
        assert_eq!(op.apply(&mut cluster).unwrap(), Outcome::Applied, "{op:?}");
    }

    let late = cluster.client("s2").unwrap();
    assert_eq!(late.phase(), Phase::Synced);
    assert!(late.state().status_of("s1").unwrap().is_raising_hand);
    cluster.check(&InvariantRegistry::standard()).unwrap();
}
