//! Entity identifiers, kinds, and capability predicates.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits, so a recycled index is
//! immediately detectable as stale. The [`EntityKind`] enum is the closed set
//! of runtime types the simulation knows about; spawn classification compares
//! kinds exactly and consults the capability predicates defined here.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// The closed set of entity runtime types.
///
/// Classification decisions are driven by the predicates below, never by
/// matching individual variants at the call site, so adding a kind means
/// deciding its capabilities in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// An experience orb dropped on death or from smelting.
    ExperienceOrb,
    /// A dropped-item entity carrying an [`ItemStack`](crate::item::ItemStack).
    Item,
    /// An arrow in flight.
    Arrow,
    /// A thrown snowball.
    Snowball,
    /// Undead melee mob. Ageable (babies exist).
    Zombie,
    /// Undead ranged mob. Not ageable.
    Skeleton,
    /// Passive breeding mob.
    Cow,
    /// Passive breeding mob.
    Chicken,
    /// Trading villager. Ageable.
    Villager,
    /// Exploding mob.
    Creeper,
    /// A hanging frame attached to a block face, holding an item.
    ItemFrame,
    /// A player-controlled entity.
    Player,
}

impl EntityKind {
    /// Experience-orb check, the highest-priority classification bucket.
    pub fn is_experience_orb(self) -> bool {
        matches!(self, EntityKind::ExperienceOrb)
    }

    /// Whether this kind is a projectile.
    pub fn is_projectile(self) -> bool {
        matches!(self, EntityKind::Arrow | EntityKind::Snowball)
    }

    /// Whether this kind is a dropped-item entity.
    pub fn is_item(self) -> bool {
        matches!(self, EntityKind::Item)
    }

    /// Whether this kind can age and reproduce.
    pub fn is_ageable(self) -> bool {
        matches!(
            self,
            EntityKind::Zombie
                | EntityKind::Cow
                | EntityKind::Chicken
                | EntityKind::Villager
        )
    }

    /// Whether this kind hangs on a block face and should be detached when
    /// that block is broken.
    pub fn is_hanging(self) -> bool {
        matches!(self, EntityKind::ItemFrame)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// DamageSource
// ---------------------------------------------------------------------------

/// The most recent damage recorded against an entity.
///
/// When an entity dies mid-tick and drops experience, the cause chain for the
/// experience spawn includes the best-matching prior damage source so
/// consumers can see what killed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageSource {
    /// Damage type name (e.g. `"player_attack"`, `"fall"`, `"explosion"`).
    pub kind: String,
    /// The attacking entity, if the damage had one.
    pub attacker: Option<EntityId>,
}

impl DamageSource {
    /// Build a damage source with an attacker.
    pub fn attack(kind: &str, attacker: EntityId) -> Self {
        Self {
            kind: kind.to_owned(),
            attacker: Some(attacker),
        }
    }

    /// Build an environmental damage source with no attacker.
    pub fn environmental(kind: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            attacker: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
