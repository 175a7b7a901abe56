//! Era/epoch slot arithmetic.
//!
//! A slot is one block-production opportunity. `SLOTS_PER_ERA` consecutive
//! slots form an era; the first `COMMIT_WINDOW_SLOTS` of each era are the
//! COMMIT phase of the randomness beacon, the next `REVEAL_WINDOW_SLOTS` the
//! REVEAL phase, and the remainder is neither. All functions here are pure —
//! the wall-clock anchor that maps real time onto slot numbers lives in the
//! [`Dag`](crate::dag::Dag).

use serde::{Deserialize, Serialize};

use crate::constants::{COMMIT_WINDOW_SLOTS, REVEAL_WINDOW_SLOTS, SLOTS_PER_ERA};

/// A discrete block-production opportunity, numbered from genesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotNumber(pub u64);

/// A contiguous range of slots sharing one commit-reveal randomness round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Era(pub u64);

/// Which sub-window of an era a slot falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochPhase {
    /// Beacon participants publish encrypted commitments.
    Commit,
    /// Beacon participants disclose their reveal keys.
    Reveal,
    /// Neither beacon window.
    Other,
}

/// The era containing the given slot.
pub fn era_of(slot: SlotNumber) -> Era {
    Era(slot.0 / SLOTS_PER_ERA)
}

/// The beacon phase of the given slot within its era.
pub fn phase_of(slot: SlotNumber) -> EpochPhase {
    let offset = slot.0 % SLOTS_PER_ERA;
    if offset < COMMIT_WINDOW_SLOTS {
        EpochPhase::Commit
    } else if offset < COMMIT_WINDOW_SLOTS + REVEAL_WINDOW_SLOTS {
        EpochPhase::Reveal
    } else {
        EpochPhase::Other
    }
}

/// First slot of the given era.
pub fn era_start(era: Era) -> SlotNumber {
    SlotNumber(era.0 * SLOTS_PER_ERA)
}

impl std::fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for Era {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
