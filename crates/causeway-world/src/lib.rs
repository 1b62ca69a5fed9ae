//! Causeway World -- the simulation state observed by the phase tracker.
//!
//! This crate models the live world that units of work mutate: entities with
//! generational identifiers, block states addressed by position, item stacks,
//! and the per-object ownership bookkeeping (creator / notifier) that causal
//! attribution reads from.
//!
//! The world deliberately knows nothing about phases or capture buffers. It
//! exposes two surfaces to the tracker:
//!
//! - **Force application**: [`WorldState::force_spawn`],
//!   [`WorldState::force_apply_block`], [`WorldState::force_spawn_item`] --
//!   the commit step of a flush calls each of these at most once per
//!   committed effect.
//! - **Identity resolution**: [`WorldState::creator_of`] and
//!   [`WorldState::notifier_of`] -- pure reads the cause builder uses to
//!   attribute effects to the player that created or last touched an object.
//!
//! # Quick Start
//!
//! ```
//! use causeway_world::prelude::*;
//!
//! let mut world = WorldState::new(WorldId(0));
//! let zombie = world.spawn_direct(EntitySpawn::new(
//!     EntityKind::Zombie,
//!     Transform::at(WorldId(0), Vec3::new(0.0, 64.0, 0.0)),
//! ));
//! assert!(world.is_alive(zombie));
//! ```

#![deny(unsafe_code)]

pub mod block;
pub mod entity;
pub mod item;
pub mod state;
pub mod transform;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The entity does not exist (stale generation or never spawned).
    #[error("entity {entity:?} does not exist (stale or never spawned)")]
    MissingEntity { entity: entity::EntityId },

    /// A transform referenced a world other than this one.
    #[error("transform is bound to world {found:?}, expected {expected:?}")]
    ForeignWorld {
        expected: transform::WorldId,
        found: transform::WorldId,
    },

    /// The world state could not be serialized for digesting.
    #[error("world state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::block::{BlockChangeKind, BlockPos, BlockState, BlockTransaction};
    pub use crate::entity::{DamageSource, EntityId, EntityKind};
    pub use crate::item::ItemStack;
    pub use crate::state::{EntityRecord, EntitySpawn, UserId, WorldState};
    pub use crate::transform::{Transform, Vec3, WorldId};
    pub use crate::WorldError;
}
