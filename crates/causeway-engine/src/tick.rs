//! The tracked tick loop.
//!
//! Each tick runs two sweeps. First every live entity with a registered
//! behavior ticks inside its own entity-tick unit of work: the pre-tick
//! transform is recorded for movement detection, the context carries the
//! entity's stored creator and notifier, and the behavior's captured effects
//! flush when the unit ends. Then the scheduled block updates run the same
//! way under block-tick contexts. The tracker must be idle at both tick
//! boundaries; a leaked context fails the tick rather than corrupting
//! attribution for the next one.
//!
//! Behaviors are plain function pointers registered per entity kind or per
//! block id, executed in registration order when several match. Same
//! initial world, same behaviors, same sink verdicts: same final world.

use std::collections::VecDeque;

use causeway_tracker::context::{CauseSource, PhaseContext};
use causeway_tracker::event::EventSink;
use causeway_tracker::flush::FlushReport;
use causeway_tracker::phase::Phase;
use causeway_tracker::tracker::{PhaseTracker, TrackerConfig};
use causeway_tracker::TrackerError;
use causeway_world::block::BlockPos;
use causeway_world::entity::{EntityId, EntityKind};
use causeway_world::state::WorldState;
use tracing::{debug, trace};

use crate::EngineError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the tick loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickConfig {
    /// Tracker settings, including the nesting-depth bound.
    pub tracker: TrackerConfig,
}

// ---------------------------------------------------------------------------
// Behavior registration
// ---------------------------------------------------------------------------

/// One entity's per-tick logic. Runs inside an entity-tick unit of work, so
/// every capture call lands in that context's buffers.
pub type EntityBehavior = fn(
    &mut PhaseTracker,
    &mut WorldState,
    &mut dyn EventSink,
    EntityId,
) -> Result<(), TrackerError>;

/// One block update's logic. Runs inside a block-tick unit of work.
pub type BlockBehavior = fn(
    &mut PhaseTracker,
    &mut WorldState,
    &mut dyn EventSink,
    BlockPos,
) -> Result<(), TrackerError>;

#[derive(Debug)]
struct RegisteredEntityBehavior {
    name: String,
    kind: EntityKind,
    func: EntityBehavior,
}

#[derive(Debug)]
struct RegisteredBlockBehavior {
    block_id: String,
    func: BlockBehavior,
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// Aggregate of one tick's flushes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub ticked_entities: usize,
    pub ticked_blocks: usize,
    pub committed_spawns: usize,
    pub committed_blocks: usize,
    pub committed_drops: usize,
    pub cancelled_effects: usize,
}

impl TickReport {
    fn absorb(&mut self, flush: &FlushReport) {
        self.committed_spawns += flush.committed_spawns;
        self.committed_blocks += flush.committed_blocks;
        self.committed_drops += flush.committed_drops;
        self.cancelled_effects +=
            flush.cancelled_spawns + flush.cancelled_blocks + flush.cancelled_drops;
    }
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The simulation driver. Owns the world and the tracker; everything else
/// reaches them only through tracked units of work.
pub struct TickLoop {
    world: WorldState,
    tracker: PhaseTracker,
    entity_behaviors: Vec<RegisteredEntityBehavior>,
    block_behaviors: Vec<RegisteredBlockBehavior>,
    /// Block positions due for an update next tick, FIFO.
    scheduled_block_ticks: VecDeque<BlockPos>,
    tick_counter: u64,
}

impl TickLoop {
    pub fn new(world: WorldState, config: TickConfig) -> Self {
        Self {
            world,
            tracker: PhaseTracker::new(config.tracker),
            entity_behaviors: Vec::new(),
            block_behaviors: Vec::new(),
            scheduled_block_ticks: VecDeque::new(),
            tick_counter: 0,
        }
    }

    /// Register a per-tick behavior for one entity kind.
    ///
    /// # Panics
    ///
    /// Panics if a behavior with the same name is already registered.
    pub fn add_entity_behavior(&mut self, name: &str, kind: EntityKind, func: EntityBehavior) {
        assert!(
            !self.entity_behaviors.iter().any(|b| b.name == name),
            "duplicate behavior name: {name:?}"
        );
        self.entity_behaviors.push(RegisteredEntityBehavior {
            name: name.to_owned(),
            kind,
            func,
        });
    }

    /// Register an update behavior for one block id.
    pub fn add_block_behavior(&mut self, block_id: &str, func: BlockBehavior) {
        self.block_behaviors.push(RegisteredBlockBehavior {
            block_id: block_id.to_owned(),
            func,
        });
    }

    /// Queue a block position for an update on the next tick.
    pub fn schedule_block_tick(&mut self, pos: BlockPos) {
        self.scheduled_block_ticks.push_back(pos);
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Direct world access, for test setup and scenario loading. Never call
    /// this from inside a behavior; captures must go through the tracker.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Run one tick: all entity behaviors, then all scheduled block updates.
    ///
    /// The tracker is asserted idle at entry and exit, so a unit of work
    /// leaked by a behavior fails this tick loudly instead of poisoning the
    /// next one.
    pub fn tick(&mut self, sink: &mut dyn EventSink) -> Result<TickReport, EngineError> {
        self.tracker.assert_idle()?;
        let mut report = TickReport::default();

        // Entity sweep over a snapshot of ids: entities spawned during this
        // tick start ticking next tick.
        for id in self.world.entity_ids() {
            if !self.world.is_alive(id) {
                continue;
            }
            let Some(record) = self.world.entity(id) else {
                continue;
            };
            let kind = record.kind;
            let Some(behavior) = self.entity_behaviors.iter().find(|b| b.kind == kind) else {
                continue;
            };
            let func = behavior.func;
            trace!(entity = %id, kind = %kind, behavior = behavior.name, "entity tick");

            self.world.remember_transform(id)?;
            let mut ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(id));
            if let Some(owner) = self.world.creator_of(id) {
                ctx = ctx.with_owner(owner);
            }
            if let Some(notifier) = self.world.notifier_of(id) {
                ctx = ctx.with_notifier(notifier);
            }
            let (_, flush) =
                self.tracker
                    .unit_of_work(ctx, &mut self.world, sink, |tracker, world, sink| {
                        func(tracker, world, sink, id)
                    })?;
            report.absorb(&flush);
            report.ticked_entities += 1;
        }

        // Block sweep over the updates scheduled before this tick.
        let due: Vec<BlockPos> = self.scheduled_block_ticks.drain(..).collect();
        for pos in due {
            let state = self.world.block(pos);
            if state.is_air() {
                continue;
            }
            let Some(behavior) = self
                .block_behaviors
                .iter()
                .find(|b| b.block_id == state.id)
            else {
                continue;
            };
            let func = behavior.func;
            trace!(pos = ?pos, block = %state.id, "block tick");

            let mut ctx = PhaseContext::new(Phase::BlockTick, CauseSource::Block(pos));
            if let Some(owner) = self.world.block_creator(pos) {
                ctx = ctx.with_owner(owner);
            }
            if let Some(notifier) = self.world.block_notifier(pos) {
                ctx = ctx.with_notifier(notifier);
            }
            let (_, flush) =
                self.tracker
                    .unit_of_work(ctx, &mut self.world, sink, |tracker, world, sink| {
                        func(tracker, world, sink, pos)
                    })?;
            report.absorb(&flush);
            report.ticked_blocks += 1;
        }

        self.tick_counter += 1;
        self.tracker.assert_idle()?;
        debug!(
            tick = self.tick_counter,
            entities = report.ticked_entities,
            blocks = report.ticked_blocks,
            "tick complete"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_tracker::event::AcceptAll;
    use causeway_world::block::BlockState;
    use causeway_world::item::ItemStack;
    use causeway_world::state::{EntitySpawn, UserId};
    use causeway_world::transform::{Transform, Vec3, WorldId};

    const W: WorldId = WorldId(0);

    fn lay_egg(
        tracker: &mut PhaseTracker,
        world: &mut WorldState,
        _sink: &mut dyn EventSink,
        _id: EntityId,
    ) -> Result<(), TrackerError> {
        tracker.capture_item_drop(
            world,
            EntitySpawn::item(W, Vec3::ZERO, ItemStack::single("egg")),
        )
    }

    // 1. Entities without a registered behavior are skipped; registered ones
    //    tick and flush.
    #[test]
    fn ticks_only_registered_kinds() {
        let mut world = WorldState::new(W);
        world.spawn_direct(EntitySpawn::new(
            EntityKind::Chicken,
            Transform::at(W, Vec3::new(0.0, 64.0, 0.0)),
        ));
        world.spawn_direct(EntitySpawn::new(
            EntityKind::Cow,
            Transform::at(W, Vec3::new(2.0, 64.0, 0.0)),
        ));
        let mut tick_loop = TickLoop::new(world, TickConfig::default());
        tick_loop.add_entity_behavior("lay_egg", EntityKind::Chicken, lay_egg);

        let mut sink = AcceptAll;
        let report = tick_loop.tick(&mut sink).unwrap();
        assert_eq!(report.ticked_entities, 1);
        assert_eq!(report.committed_drops, 1);
        assert_eq!(tick_loop.tick_count(), 1);
    }

    // 2. Scheduled block ticks drain once and run under block-tick contexts
    //    carrying the stored block attribution.
    #[test]
    fn block_ticks_run_once_with_attribution() {
        fn decay(
            tracker: &mut PhaseTracker,
            _world: &mut WorldState,
            _sink: &mut dyn EventSink,
            pos: BlockPos,
        ) -> Result<(), TrackerError> {
            tracker.capture_item_stack_drop(
                ItemStack::single("sapling"),
                Vec3::new(pos.x as f64, pos.y as f64, pos.z as f64),
            )
        }

        let mut world = WorldState::new(W);
        let pos = BlockPos::new(0, 70, 0);
        world.set_block(pos, BlockState::named("leaves"));
        world.set_block_creator(pos, UserId(8));
        let mut tick_loop = TickLoop::new(world, TickConfig::default());
        tick_loop.add_block_behavior("leaves", decay);
        tick_loop.schedule_block_tick(pos);

        let mut sink = AcceptAll;
        let report = tick_loop.tick(&mut sink).unwrap();
        assert_eq!(report.ticked_blocks, 1);
        assert_eq!(report.committed_drops, 1);

        // The dropped sapling is stamped with the block's creator.
        let world = tick_loop.world();
        let item = world
            .entity_ids()
            .into_iter()
            .find(|id| world.entity(*id).is_some_and(|r| r.kind.is_item()))
            .unwrap();
        assert_eq!(world.creator_of(item), Some(UserId(8)));

        // The schedule drained; the next tick runs no block updates.
        let mut sink = AcceptAll;
        let report = tick_loop.tick(&mut sink).unwrap();
        assert_eq!(report.ticked_blocks, 0);
    }

    // 3. Duplicate behavior names are a programming error.
    #[test]
    #[should_panic(expected = "duplicate behavior name")]
    fn duplicate_behavior_name_panics() {
        let mut tick_loop = TickLoop::new(WorldState::new(W), TickConfig::default());
        tick_loop.add_entity_behavior("lay_egg", EntityKind::Chicken, lay_egg);
        tick_loop.add_entity_behavior("lay_egg", EntityKind::Cow, lay_egg);
    }
}
