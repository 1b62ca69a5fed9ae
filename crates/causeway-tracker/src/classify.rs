//! Spawn classification into notification buckets.
//!
//! Captured spawns are not posted one by one. Before flush they are sorted
//! into four buckets, each of which becomes at most one notification. The
//! buckets are checked in a fixed priority order so that a candidate lands
//! in exactly one.

use causeway_world::entity::EntityKind;
use causeway_world::state::EntitySpawn;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SpawnCategory
// ---------------------------------------------------------------------------

/// The bucket a captured spawn was classified into.
///
/// Declaration order is also notification order: experience first, then
/// breeding, projectiles, and everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnCategory {
    Experience,
    Breeding,
    Projectile,
    Passive,
}

impl SpawnCategory {
    /// All categories in notification order.
    pub const ALL: [SpawnCategory; 4] = [
        SpawnCategory::Experience,
        SpawnCategory::Breeding,
        SpawnCategory::Projectile,
        SpawnCategory::Passive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpawnCategory::Experience => "experience",
            SpawnCategory::Breeding => "breeding",
            SpawnCategory::Projectile => "projectile",
            SpawnCategory::Passive => "passive",
        }
    }
}

/// Classify one candidate relative to the ticking source kind.
///
/// Priority order: experience orbs first, then offspring of an ageable
/// source, then projectiles. Anything else is passive.
///
/// Breeding requires the candidate kind to equal the source kind exactly,
/// so a zombie spawning a chicken jockey's chicken does not classify as
/// breeding even though both are ageable.
pub fn classify_single(source_kind: Option<EntityKind>, candidate: EntityKind) -> SpawnCategory {
    if candidate.is_experience_orb() {
        return SpawnCategory::Experience;
    }
    if let Some(source) = source_kind {
        if source.is_ageable() && candidate == source {
            return SpawnCategory::Breeding;
        }
    }
    if candidate.is_projectile() {
        return SpawnCategory::Projectile;
    }
    SpawnCategory::Passive
}

// ---------------------------------------------------------------------------
// ClassifiedSpawns
// ---------------------------------------------------------------------------

/// The four buckets produced by [`classify_batch`]. Within each bucket,
/// capture order is preserved.
#[derive(Debug, Default, Clone)]
pub struct ClassifiedSpawns {
    pub experience: Vec<EntitySpawn>,
    pub breeding: Vec<EntitySpawn>,
    pub projectiles: Vec<EntitySpawn>,
    pub passive: Vec<EntitySpawn>,
}

impl ClassifiedSpawns {
    pub fn bucket(&self, category: SpawnCategory) -> &[EntitySpawn] {
        match category {
            SpawnCategory::Experience => &self.experience,
            SpawnCategory::Breeding => &self.breeding,
            SpawnCategory::Projectile => &self.projectiles,
            SpawnCategory::Passive => &self.passive,
        }
    }

    fn bucket_mut(&mut self, category: SpawnCategory) -> &mut Vec<EntitySpawn> {
        match category {
            SpawnCategory::Experience => &mut self.experience,
            SpawnCategory::Breeding => &mut self.breeding,
            SpawnCategory::Projectile => &mut self.projectiles,
            SpawnCategory::Passive => &mut self.passive,
        }
    }

    pub fn total(&self) -> usize {
        self.experience.len() + self.breeding.len() + self.projectiles.len() + self.passive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Sort a batch of captured spawns into buckets, preserving capture order
/// within each bucket.
pub fn classify_batch(
    source_kind: Option<EntityKind>,
    candidates: Vec<EntitySpawn>,
) -> ClassifiedSpawns {
    let mut classified = ClassifiedSpawns::default();
    for candidate in candidates {
        let category = classify_single(source_kind, candidate.kind);
        classified.bucket_mut(category).push(candidate);
    }
    classified
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
