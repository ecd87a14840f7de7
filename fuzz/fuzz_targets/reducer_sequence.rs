//! Fuzz target for whole-room behavior
//!
//! Random lessons (joins, leaves, intents, time passing) run on a simulated
//! cluster that settles after every operation.
//!
//! # Invariants
//!
//! - The cluster always reaches quiescence
//! - Every replica lists itself and agrees with its peers once settled
//! - The owner never shows a raised hand

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_core::RoomType;
use roomsync_harness::{Cluster, InvariantRegistry, OWNER_ID, Operation};

const MAX_OPERATIONS: usize = 64;

#[derive(Debug, Arbitrary)]
enum RoomChoice {
    Big,
    Small,
    OneToOne,
}

#[derive(Debug, Arbitrary)]
struct Lesson {
    seed: u64,
    room: RoomChoice,
    operations: Vec<Operation>,
}

fuzz_target!(|lesson: Lesson| {
    let room_type = match lesson.room {
        RoomChoice::Big => RoomType::BigClass,
        RoomChoice::Small => RoomType::SmallClass,
        RoomChoice::OneToOne => RoomType::OneToOne,
    };
    let registry = InvariantRegistry::standard();

    let mut cluster = Cluster::new(lesson.seed, room_type);
    if let Err(e) = cluster.join(OWNER_ID).and_then(|()| cluster.settle()) {
        panic!("owner could not open the room: {e}");
    }

    for (i, op) in lesson.operations.iter().take(MAX_OPERATIONS).enumerate() {
        if let Err(e) = op.apply(&mut cluster) {
            panic!("op {i} ({op:?}) broke the cluster: {e}");
        }
        registry.assert_all(&cluster.snapshot(), &format!("after op {i} ({op:?})"));
    }
});
