//! Standard invariant implementations.

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Every replica lists its own user.
pub struct LocalUserPresent;

impl Invariant for LocalUserPresent {
    fn name(&self) -> &'static str {
        "local_user_present"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for replica in &state.replicas {
            if !replica.statuses.contains_key(&replica.user_id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{} is missing from its own roster", replica.user_id),
                });
            }
        }
        Ok(())
    }
}

/// Ready replicas agree on lifecycle, mode, ban and every user's status.
///
/// Only meaningful once all in-flight messages are delivered.
pub struct ReplicaConvergence;

impl Invariant for ReplicaConvergence {
    fn name(&self) -> &'static str {
        "replica_convergence"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut ready = state.ready();
        let Some(reference) = ready.next() else {
            return Ok(());
        };

        for replica in ready {
            let mismatch = if replica.lifecycle != reference.lifecycle {
                Some(format!("lifecycle {:?} vs {:?}", replica.lifecycle, reference.lifecycle))
            } else if replica.mode != reference.mode {
                Some(format!("mode {:?} vs {:?}", replica.mode, reference.mode))
            } else if replica.message_banned != reference.message_banned {
                Some(format!(
                    "message ban {} vs {}",
                    replica.message_banned, reference.message_banned
                ))
            } else if replica.statuses != reference.statuses {
                Some(format!("statuses {:?} vs {:?}", replica.statuses, reference.statuses))
            } else {
                None
            };

            if let Some(detail) = mismatch {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{} and {} differ: {detail}", replica.user_id, reference.user_id),
                });
            }
        }
        Ok(())
    }
}

/// The owner never shows a raised hand.
pub struct OwnerNeverRaisesHand;

impl Invariant for OwnerNeverRaisesHand {
    fn name(&self) -> &'static str {
        "owner_never_raises_hand"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for replica in &state.replicas {
            if replica.statuses.get(&replica.owner_id).is_some_and(|s| s.is_raising_hand) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{} sees the owner with a raised hand", replica.user_id),
                });
            }
        }
        Ok(())
    }
}

/// No replica shows more speakers than the stage admits.
pub struct StageLimit {
    /// Maximum simultaneous speakers.
    pub max_speakers: usize,
}

impl Invariant for StageLimit {
    fn name(&self) -> &'static str {
        "stage_limit"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for replica in &state.replicas {
            let speakers = replica.speakers();
            if speakers > self.max_speakers {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} sees {speakers} speakers, limit is {}",
                        replica.user_id, self.max_speakers
                    ),
                });
            }
        }
        Ok(())
    }
}
