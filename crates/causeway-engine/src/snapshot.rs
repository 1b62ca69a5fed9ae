//! World snapshots for rollback and no-trace verification.
//!
//! A [`WorldSnapshot`] is a full serialized copy of a [`WorldState`] plus
//! its content digest. Tests and tools use it two ways: restore a world to
//! a known point, or assert that a sequence of cancelled notifications left
//! the world bit-for-bit untouched.

use anyhow::Context;
use causeway_world::state::WorldState;
use serde::{Deserialize, Serialize};

/// A point-in-time copy of one world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    state: serde_json::Value,
    digest: String,
}

impl WorldSnapshot {
    /// Capture the world as it is now.
    pub fn capture(world: &WorldState) -> Result<Self, anyhow::Error> {
        let state = serde_json::to_value(world).context("failed to serialize world state")?;
        let digest = world.digest().context("failed to digest world state")?;
        Ok(Self { state, digest })
    }

    /// The content digest at capture time.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Rebuild the captured world.
    pub fn restore(&self) -> Result<WorldState, anyhow::Error> {
        serde_json::from_value(self.state.clone())
            .context("failed to restore world state from snapshot")
    }

    /// Assert that `world` is still identical to this snapshot.
    pub fn verify_unchanged(&self, world: &WorldState) -> Result<(), anyhow::Error> {
        let current = world.digest().context("failed to digest world state")?;
        if current != self.digest {
            return Err(anyhow::anyhow!(
                "world diverged from snapshot: expected digest {}, got {}",
                self.digest,
                current
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_world::prelude::*;

    fn sample_world() -> WorldState {
        let mut world = WorldState::new(WorldId(3));
        world.set_block(BlockPos::new(0, 64, 0), BlockState::named("stone"));
        world.spawn_direct(EntitySpawn::new(
            EntityKind::Villager,
            Transform::at(WorldId(3), Vec3::new(0.5, 65.0, 0.5)),
        ));
        world
    }

    #[test]
    fn restore_round_trips_the_world() {
        let world = sample_world();
        let snapshot = WorldSnapshot::capture(&world).unwrap();
        let restored = snapshot.restore().unwrap();
        assert_eq!(restored.digest().unwrap(), world.digest().unwrap());
    }

    #[test]
    fn verify_detects_divergence() {
        let mut world = sample_world();
        let snapshot = WorldSnapshot::capture(&world).unwrap();
        snapshot.verify_unchanged(&world).unwrap();

        world.set_block(BlockPos::new(1, 64, 0), BlockState::named("dirt"));
        assert!(snapshot.verify_unchanged(&world).is_err());
    }
}
