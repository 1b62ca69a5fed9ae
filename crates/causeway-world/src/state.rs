//! The live world: entity records, block states, and ownership bookkeeping.
//!
//! [`WorldState`] is the single mutable authority for one world. During a unit
//! of work the tracker redirects mutations into capture buffers; only the
//! commit step of a flush (or an explicitly direct call during setup) writes
//! here. Entity iteration order is deterministic because records live in a
//! `BTreeMap` keyed by [`EntityId`].
//!
//! # Ownership bookkeeping
//!
//! Every entity record carries an optional `creator` (who ultimately created
//! it) and `notifier` (who most recently acted upon it). The cause builder
//! reads these through [`WorldState::creator_of`] / [`WorldState::notifier_of`]
//! and never mutates them; committed spawns are stamped via the `creator`
//! argument of [`WorldState::force_spawn`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::block::{BlockPos, BlockState, BlockTransaction};
use crate::entity::{DamageSource, EntityId, EntityKind};
use crate::item::ItemStack;
use crate::transform::{Transform, Vec3, WorldId};
use crate::WorldError;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Identity of a player for attribution purposes (owner / notifier factors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntitySpawn
// ---------------------------------------------------------------------------

/// A proposed entity that does not exist in the world yet.
///
/// Spawn candidates captured during a unit of work are `EntitySpawn` values;
/// they only become live records (and receive an [`EntityId`]) when a flush
/// commits them through [`WorldState::force_spawn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpawn {
    pub kind: EntityKind,
    pub transform: Transform,
    /// The carried stack, for [`EntityKind::Item`] and frame-held items.
    pub stack: Option<ItemStack>,
    /// The block face this entity hangs on, for hanging kinds.
    pub attached_to: Option<BlockPos>,
}

impl EntitySpawn {
    pub fn new(kind: EntityKind, transform: Transform) -> Self {
        Self {
            kind,
            transform,
            stack: None,
            attached_to: None,
        }
    }

    /// An item entity carrying `stack` at `position`.
    pub fn item(world: WorldId, position: Vec3, stack: ItemStack) -> Self {
        Self {
            kind: EntityKind::Item,
            transform: Transform::at(world, position),
            stack: Some(stack),
            attached_to: None,
        }
    }

    /// Attach this spawn to a block face (hanging kinds).
    pub fn attached(mut self, pos: BlockPos) -> Self {
        self.attached_to = Some(pos);
        self
    }

    /// Set the carried stack.
    pub fn holding(mut self, stack: ItemStack) -> Self {
        self.stack = Some(stack);
        self
    }
}

// ---------------------------------------------------------------------------
// EntityRecord
// ---------------------------------------------------------------------------

/// A live entity in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub transform: Transform,
    /// The transform recorded at the start of the current tick, used for
    /// movement-change detection and move-cancellation rollback.
    pub last_transform: Transform,
    /// Dead entities stay in the map until despawned so death-drop
    /// attribution can still read them.
    pub dead: bool,
    /// The most recent damage recorded against this entity.
    pub last_damage: Option<DamageSource>,
    /// The player currently courting this entity into breeding, if any.
    pub courting: Option<UserId>,
    /// Who ultimately created this entity.
    pub creator: Option<UserId>,
    /// Who most recently acted upon this entity.
    pub notifier: Option<UserId>,
    /// The carried stack (item entities, frame-held items).
    pub stack: Option<ItemStack>,
    /// The block face this entity hangs on.
    pub attached_to: Option<BlockPos>,
}

impl EntityRecord {
    fn from_spawn(spawn: EntitySpawn) -> Self {
        Self {
            kind: spawn.kind,
            last_transform: spawn.transform,
            transform: spawn.transform,
            dead: false,
            last_damage: None,
            courting: None,
            creator: None,
            notifier: None,
            stack: spawn.stack,
            attached_to: spawn.attached_to,
        }
    }
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// Serde adapter for maps with struct keys: JSON object keys must be strings,
/// so these maps travel as sequences of `(key, value)` pairs.
mod pair_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// One world's live state: entities, blocks, and per-block ownership.
///
/// Unset block positions read as air. Entity IDs are generational: an index is
/// recycled only with a bumped generation, so stale handles are detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    id: WorldId,
    entities: BTreeMap<EntityId, EntityRecord>,
    #[serde(with = "pair_map")]
    blocks: BTreeMap<BlockPos, BlockState>,
    /// Who placed each block, for block-tick owner attribution.
    #[serde(with = "pair_map")]
    block_creators: BTreeMap<BlockPos, UserId>,
    /// Who last notified each block (e.g. triggered its update).
    #[serde(with = "pair_map")]
    block_notifiers: BTreeMap<BlockPos, UserId>,
    /// Current generation per index slot.
    generations: Vec<u32>,
    /// Recyclable index slots (freed by despawn).
    free_indices: Vec<u32>,
}

impl WorldState {
    /// Create an empty world.
    pub fn new(id: WorldId) -> Self {
        Self {
            id,
            entities: BTreeMap::new(),
            blocks: BTreeMap::new(),
            block_creators: BTreeMap::new(),
            block_notifiers: BTreeMap::new(),
            generations: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    /// This world's identifier.
    pub fn id(&self) -> WorldId {
        self.id
    }

    fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free_indices.pop() {
            EntityId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            EntityId::new(index, 0)
        }
    }

    // -- spawning ------------------------------------------------------------

    /// Spawn directly, bypassing capture. Setup and the no-active-phase
    /// fallback for optional-capture categories use this path.
    pub fn spawn_direct(&mut self, spawn: EntitySpawn) -> EntityId {
        let id = self.allocate();
        self.entities.insert(id, EntityRecord::from_spawn(spawn));
        id
    }

    /// The commit step's spawn application. Called at most once per committed
    /// spawn candidate per flush. Stamps the resolved creator on the record.
    pub fn force_spawn(
        &mut self,
        spawn: EntitySpawn,
        creator: Option<UserId>,
    ) -> Result<EntityId, WorldError> {
        if spawn.transform.world != self.id {
            return Err(WorldError::ForeignWorld {
                expected: self.id,
                found: spawn.transform.world,
            });
        }
        let id = self.allocate();
        let mut record = EntityRecord::from_spawn(spawn);
        record.creator = creator;
        self.entities.insert(id, record);
        Ok(id)
    }

    /// The commit step's item-drop application: creates a live item entity.
    pub fn force_spawn_item(
        &mut self,
        stack: ItemStack,
        position: Vec3,
        creator: Option<UserId>,
    ) -> Result<EntityId, WorldError> {
        self.force_spawn(EntitySpawn::item(self.id, position, stack), creator)
    }

    // -- blocks --------------------------------------------------------------

    /// Read a block state; unset positions are air.
    pub fn block(&self, pos: BlockPos) -> BlockState {
        self.blocks.get(&pos).cloned().unwrap_or_else(BlockState::air)
    }

    /// Set a block state directly, bypassing capture (setup only).
    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) {
        if state.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, state);
        }
    }

    /// The commit step's block application. Writes the transaction's
    /// replacement state; discarding a transaction needs no write at all
    /// because captured changes were never applied.
    pub fn force_apply_block(&mut self, tx: &BlockTransaction) -> Result<(), WorldError> {
        if tx.world != self.id {
            return Err(WorldError::ForeignWorld {
                expected: self.id,
                found: tx.world,
            });
        }
        self.set_block(tx.pos, tx.replacement.clone());
        Ok(())
    }

    /// Who placed the block at `pos`.
    pub fn block_creator(&self, pos: BlockPos) -> Option<UserId> {
        self.block_creators.get(&pos).copied()
    }

    /// Who last notified the block at `pos`.
    pub fn block_notifier(&self, pos: BlockPos) -> Option<UserId> {
        self.block_notifiers.get(&pos).copied()
    }

    pub fn set_block_creator(&mut self, pos: BlockPos, user: UserId) {
        self.block_creators.insert(pos, user);
    }

    pub fn set_block_notifier(&mut self, pos: BlockPos, user: UserId) {
        self.block_notifiers.insert(pos, user);
    }

    // -- entity access -------------------------------------------------------

    /// The entity record, if the id is live (possibly dead-flagged).
    pub fn entity(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// Mutable entity record access.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(&id)
    }

    /// Like [`entity`](Self::entity) but a missing record is an error.
    pub fn require_entity(&self, id: EntityId) -> Result<&EntityRecord, WorldError> {
        self.entities
            .get(&id)
            .ok_or(WorldError::MissingEntity { entity: id })
    }

    /// Whether the entity exists (dead-flagged entities still exist).
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Whether the entity is flagged dead.
    pub fn is_dead(&self, id: EntityId) -> bool {
        self.entities.get(&id).map(|r| r.dead).unwrap_or(false)
    }

    /// All live entity ids in deterministic (raw id) order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entities hanging on the block face at `pos`.
    pub fn hanging_at(&self, pos: BlockPos) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, r)| r.attached_to == Some(pos))
            .map(|(id, _)| *id)
            .collect()
    }

    // -- lifecycle -----------------------------------------------------------

    /// Flag an entity dead, recording what killed it. The record stays in the
    /// map so attribution can still read it during the same tick.
    pub fn kill(&mut self, id: EntityId, damage: Option<DamageSource>) -> Result<(), WorldError> {
        let record = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::MissingEntity { entity: id })?;
        record.dead = true;
        if damage.is_some() {
            record.last_damage = damage;
        }
        Ok(())
    }

    /// Remove an entity record entirely, recycling its index with a bumped
    /// generation so outstanding handles go stale.
    pub fn despawn(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.entities
            .remove(&id)
            .ok_or(WorldError::MissingEntity { entity: id })?;
        let idx = id.index() as usize;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push(id.index());
        Ok(())
    }

    /// Record the entity's current transform as its last-tick transform.
    /// Drivers call this at the start of each entity tick.
    pub fn remember_transform(&mut self, id: EntityId) -> Result<(), WorldError> {
        let record = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::MissingEntity { entity: id })?;
        record.last_transform = record.transform;
        Ok(())
    }

    // -- identity resolution (pure reads) ------------------------------------

    /// Who ultimately created this entity.
    pub fn creator_of(&self, id: EntityId) -> Option<UserId> {
        self.entities.get(&id).and_then(|r| r.creator)
    }

    /// Who most recently acted upon this entity.
    pub fn notifier_of(&self, id: EntityId) -> Option<UserId> {
        self.entities.get(&id).and_then(|r| r.notifier)
    }

    pub fn set_creator(&mut self, id: EntityId, user: UserId) {
        if let Some(r) = self.entities.get_mut(&id) {
            r.creator = Some(user);
        }
    }

    pub fn set_notifier(&mut self, id: EntityId, user: UserId) {
        if let Some(r) = self.entities.get_mut(&id) {
            r.notifier = Some(user);
        }
    }

    // -- digest --------------------------------------------------------------

    /// Content digest of the entire world state.
    ///
    /// Serializes the state to JSON (deterministic thanks to `BTreeMap`
    /// ordering) and hashes it. Two worlds with identical observable state
    /// produce identical digests, which is how tests assert that a cancelled
    /// notification left no trace.
    pub fn digest(&self) -> Result<String, WorldError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
