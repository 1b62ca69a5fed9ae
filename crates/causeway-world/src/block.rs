//! Block positions, states, and change transactions.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// An integer block coordinate.
///
/// `Ord` is derived so per-block drop maps iterate in a deterministic order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// BlockState
// ---------------------------------------------------------------------------

/// The state of a single block position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// Block type identifier, e.g. `"stone"`, `"grass"`, `"air"`.
    pub id: String,
}

impl BlockState {
    pub fn named(id: &str) -> Self {
        Self { id: id.to_owned() }
    }

    /// The empty block state.
    pub fn air() -> Self {
        Self::named("air")
    }

    pub fn is_air(&self) -> bool {
        self.id == "air"
    }
}

// ---------------------------------------------------------------------------
// BlockChangeKind
// ---------------------------------------------------------------------------

/// What kind of change a block transaction represents.
///
/// The `Break` kind carries extra responsibility during attribution: a broken
/// block must detach any hanging entities on it before the change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockChangeKind {
    /// A new block placed where there was none (or air).
    Place,
    /// An existing block destroyed.
    Break,
    /// An in-place state change (e.g. crop growth stage).
    Modify,
    /// Natural decay (leaves, ice).
    Decay,
}

// ---------------------------------------------------------------------------
// BlockTransaction
// ---------------------------------------------------------------------------

/// A proposed block change: the original state, the replacement, and the
/// change kind, at one position in one world.
///
/// Transactions are captured during a unit of work and applied (or discarded)
/// at flush time. Applying is a single [`force_apply_block`] call; discarding
/// means the original state simply stays in place, so no rollback write is
/// needed for never-applied transactions.
///
/// [`force_apply_block`]: crate::state::WorldState::force_apply_block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTransaction {
    pub world: crate::transform::WorldId,
    pub pos: BlockPos,
    pub original: BlockState,
    pub replacement: BlockState,
    pub kind: BlockChangeKind,
}

impl BlockTransaction {
    /// A break transaction: `original` becomes air.
    pub fn breaking(world: crate::transform::WorldId, pos: BlockPos, original: BlockState) -> Self {
        Self {
            world,
            pos,
            original,
            replacement: BlockState::air(),
            kind: BlockChangeKind::Break,
        }
    }

    /// A placement transaction: air becomes `replacement`.
    pub fn placing(
        world: crate::transform::WorldId,
        pos: BlockPos,
        replacement: BlockState,
    ) -> Self {
        Self {
            world,
            pos,
            original: BlockState::air(),
            replacement,
            kind: BlockChangeKind::Place,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::WorldId;

    #[test]
    fn block_pos_ordering_is_lexicographic() {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(0, 0, 1);
        let c = BlockPos::new(1, -5, -5);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn breaking_produces_air_replacement() {
        let tx = BlockTransaction::breaking(WorldId(0), BlockPos::new(1, 2, 3), BlockState::named("stone"));
        assert_eq!(tx.kind, BlockChangeKind::Break);
        assert!(tx.replacement.is_air());
        assert_eq!(tx.original, BlockState::named("stone"));
    }
}
