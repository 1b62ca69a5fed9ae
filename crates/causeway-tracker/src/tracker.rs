//! The tracker facade: scoped units of work and capture redirection.
//!
//! [`PhaseTracker`] owns the process-wide [`PhaseStack`] and exposes it only
//! through the scoped [`unit_of_work`] operation, which guarantees the push
//! is matched by a pop on every exit path. Simulation code never touches the
//! stack directly; it calls the `capture_*` redirection methods, which land
//! effects in the top context's buffers or, for the optional categories,
//! fall back to immediate application when the stack is empty.
//!
//! [`unit_of_work`]: PhaseTracker::unit_of_work

use causeway_world::block::{BlockPos, BlockTransaction};
use causeway_world::item::ItemStack;
use causeway_world::state::{EntitySpawn, WorldState};
use causeway_world::transform::Vec3;
use tracing::{trace, warn};

use crate::buffer::category;
use crate::cause::Cause;
use crate::classify::classify_single;
use crate::context::{CauseSource, PhaseContext};
use crate::event::{EventSink, Notification};
use crate::flush::{flush_context, keep_committed, spawn_cause, FlushReport};
use crate::stack::PhaseStack;
use crate::TrackerError;

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

/// Tracker tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Upper bound on nesting depth. Exceeding it means a runaway
    /// re-entrancy loop and fails the offending unit of work fast.
    pub max_depth: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { max_depth: 16 }
    }
}

// ---------------------------------------------------------------------------
// PhaseTracker
// ---------------------------------------------------------------------------

/// The cause-tracking engine. One per simulation thread.
#[derive(Debug)]
pub struct PhaseTracker {
    stack: PhaseStack,
    /// One accumulator per active unit of work, collecting the flush reports
    /// of units nested inside it.
    nested_reports: Vec<FlushReport>,
}

impl PhaseTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            stack: PhaseStack::new(config.max_depth),
            nested_reports: Vec::new(),
        }
    }

    /// Current nesting depth. Zero means idle.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Assert the between-ticks invariant: no context may survive its unit
    /// of work.
    pub fn assert_idle(&self) -> Result<(), TrackerError> {
        self.stack.assert_idle()
    }

    /// The teleport cause chain for the currently active phase, if any.
    pub fn teleport_cause(&self) -> Option<Cause> {
        self.stack
            .peek()
            .map(|ctx| (ctx.phase().behavior().teleport_cause)(ctx))
    }

    // -- scoped units of work ------------------------------------------------

    /// Run one unit of work under `ctx`.
    ///
    /// The context is pushed before `body` runs and popped on every exit
    /// path. When `body` succeeds the popped context is flushed (classified,
    /// notified, committed) and the flush report is returned alongside the
    /// body's value. The report also absorbs the reports of any units of
    /// work nested under this one, so it covers everything committed in this
    /// unit's scope. When `body` fails, captured effects are discarded and
    /// the error propagates; the stack is still restored to its entry depth.
    ///
    /// If another context is already active, the new one is composed from it
    /// first: owner and notifier flow inward and the outer source becomes a
    /// parent factor in the nested cause chains.
    pub fn unit_of_work<S, F, R>(
        &mut self,
        mut ctx: PhaseContext,
        world: &mut WorldState,
        sink: &mut S,
        body: F,
    ) -> Result<(R, FlushReport), TrackerError>
    where
        S: EventSink + ?Sized,
        F: FnOnce(&mut Self, &mut WorldState, &mut S) -> Result<R, TrackerError>,
    {
        if let Some(outer) = self.stack.peek() {
            (outer.phase().behavior().compose_nested)(outer, &mut ctx);
        }
        let entry_depth = self.stack.depth();
        trace!(
            phase = ctx.phase().name(),
            depth = entry_depth + 1,
            "entering unit of work"
        );
        self.stack.push(ctx)?;
        self.nested_reports.push(FlushReport::default());

        let value = match body(self, world, sink) {
            Ok(value) => value,
            Err(err) => {
                // Scoped release: restore the stack even on the error path.
                // Captured effects of the failed unit are discarded.
                self.stack.truncate(entry_depth);
                self.nested_reports.truncate(entry_depth);
                return Err(err);
            }
        };

        // A well-behaved body leaves exactly our context on top.
        if self.stack.depth() != entry_depth + 1 {
            let remaining = self.stack.depth().saturating_sub(entry_depth);
            warn!(
                expected = entry_depth + 1,
                actual = self.stack.depth(),
                "unit of work unbalanced the phase stack"
            );
            self.stack.truncate(entry_depth);
            self.nested_reports.truncate(entry_depth);
            return if remaining > 1 {
                Err(TrackerError::LeakedContexts {
                    remaining: remaining - 1,
                })
            } else {
                Err(TrackerError::UnbalancedStack)
            };
        }
        let mut popped = match self.stack.pop() {
            Some(ctx) => ctx,
            None => return Err(TrackerError::UnbalancedStack),
        };
        let nested = self.nested_reports.pop().unwrap_or_default();
        let mut report = flush_context(&mut popped, world, sink)?;
        report.merge(&nested);
        if let Some(enclosing) = self.nested_reports.last_mut() {
            enclosing.merge(&report);
        }
        Ok((value, report))
    }

    // -- capture redirection -------------------------------------------------

    /// Capture a block transaction. Block changes are never applied outside
    /// a phase; an empty stack is a contract violation.
    pub fn capture_block_change(&mut self, tx: BlockTransaction) -> Result<(), TrackerError> {
        match self.stack.peek_mut() {
            Some(ctx) => ctx.blocks.capture(tx),
            None => Err(TrackerError::NoActivePhase {
                category: category::BLOCK_CHANGES,
            }),
        }
    }

    /// Capture an entity spawn candidate, or apply it immediately when no
    /// phase is active (spawns are an optional-capture category).
    pub fn capture_spawn(
        &mut self,
        world: &mut WorldState,
        spawn: EntitySpawn,
    ) -> Result<(), TrackerError> {
        match self.stack.peek_mut() {
            Some(ctx) => ctx.spawns.capture(spawn),
            None => {
                world.force_spawn(spawn, None)?;
                Ok(())
            }
        }
    }

    /// Capture a dropped-item entity, or apply it immediately when no phase
    /// is active (item drops are an optional-capture category).
    pub fn capture_item_drop(
        &mut self,
        world: &mut WorldState,
        drop: EntitySpawn,
    ) -> Result<(), TrackerError> {
        match self.stack.peek_mut() {
            Some(ctx) => ctx.item_drops.capture(drop),
            None => {
                world.force_spawn(drop, None)?;
                Ok(())
            }
        }
    }

    /// Capture an item drop attributed to a specific block position.
    /// Required capture: an empty stack is a contract violation.
    pub fn capture_block_item_drop(
        &mut self,
        pos: BlockPos,
        drop: EntitySpawn,
    ) -> Result<(), TrackerError> {
        match self.stack.peek_mut() {
            Some(ctx) => ctx.block_item_drops.capture((pos, drop)),
            None => Err(TrackerError::NoActivePhase {
                category: category::BLOCK_ITEM_DROPS,
            }),
        }
    }

    /// Capture a loose item-stack drop, converted to an item entity at
    /// flush time. Required capture: an empty stack is a contract violation.
    pub fn capture_item_stack_drop(
        &mut self,
        stack: ItemStack,
        position: Vec3,
    ) -> Result<(), TrackerError> {
        match self.stack.peek_mut() {
            Some(ctx) => ctx.stack_drops.capture((stack, position)),
            None => Err(TrackerError::NoActivePhase {
                category: category::ITEM_STACK_DROPS,
            }),
        }
    }

    // -- synchronous single-spawn path ---------------------------------------

    /// Classify and announce one spawn candidate immediately, bypassing the
    /// deferred batch. Returns whether the spawn was committed. With no
    /// active phase the candidate is applied directly and reported committed.
    pub fn spawn_or_capture(
        &mut self,
        world: &mut WorldState,
        sink: &mut dyn EventSink,
        spawn: EntitySpawn,
    ) -> Result<bool, TrackerError> {
        let Some(ctx) = self.stack.peek() else {
            world.force_spawn(spawn, None)?;
            return Ok(true);
        };
        let source_kind = match ctx.source() {
            CauseSource::Entity(id) => world.entity(*id).map(|r| r.kind),
            _ => None,
        };
        let category = classify_single(source_kind, spawn.kind);
        let mut notification = Notification::SpawnEntities {
            cause: spawn_cause(ctx, world, category),
            category,
            entities: vec![spawn],
        };
        let verdict = sink.post(&mut notification);
        let Notification::SpawnEntities { entities, .. } = notification else {
            unreachable!("sink cannot change a notification's variant");
        };
        let creator = ctx.effect_creator();
        let (kept, _) = keep_committed(entities, verdict, category.name());
        let committed = !kept.is_empty();
        for candidate in kept {
            world.force_spawn(candidate, creator)?;
        }
        Ok(committed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AcceptAll, RecordingSink, Verdict};
    use crate::phase::Phase;
    use causeway_world::block::{BlockState, BlockTransaction};
    use causeway_world::entity::{EntityId, EntityKind};
    use causeway_world::state::UserId;
    use causeway_world::transform::{Transform, Vec3, WorldId};

    const W: WorldId = WorldId(0);

    fn world_with_zombie() -> (WorldState, EntityId) {
        let mut world = WorldState::new(W);
        let zombie = world.spawn_direct(EntitySpawn::new(
            EntityKind::Zombie,
            Transform::at(W, Vec3::new(0.0, 64.0, 0.0)),
        ));
        (world, zombie)
    }

    fn orb() -> EntitySpawn {
        EntitySpawn::new(EntityKind::ExperienceOrb, Transform::at(W, Vec3::ZERO))
    }

    // 1. A successful unit of work leaves the stack at its entry depth and
    //    commits captured spawns.
    #[test]
    fn unit_of_work_balances_and_flushes() {
        let (mut world, zombie) = world_with_zombie();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());
        let mut sink = AcceptAll;
        let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(zombie));
        let (_, report) = tracker
            .unit_of_work(ctx, &mut world, &mut sink, |tracker, world, _| {
                tracker.capture_spawn(world, orb())
            })
            .unwrap();
        assert_eq!(report.committed_spawns, 1);
        assert_eq!(tracker.depth(), 0);
        tracker.assert_idle().unwrap();
    }

    // 2. A failing body still restores the stack, and its captures never
    //    reach the world.
    #[test]
    fn failed_unit_of_work_discards_captures() {
        let (mut world, zombie) = world_with_zombie();
        let before = world.entity_count();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());
        let mut sink = AcceptAll;
        let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(zombie));
        let result = tracker.unit_of_work(ctx, &mut world, &mut sink, |tracker, world, _| {
            tracker.capture_spawn(world, orb())?;
            Err::<(), _>(TrackerError::UnbalancedStack)
        });
        assert!(result.is_err());
        assert_eq!(tracker.depth(), 0);
        assert_eq!(world.entity_count(), before);
    }

    // 3. Required categories reject capture with no active phase; optional
    //    categories apply immediately.
    #[test]
    fn no_active_phase_policy() {
        let (mut world, _) = world_with_zombie();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());

        let err = tracker
            .capture_block_change(BlockTransaction::placing(
                W,
                BlockPos::new(0, 64, 0),
                BlockState::named("stone"),
            ))
            .unwrap_err();
        assert!(matches!(err, TrackerError::NoActivePhase { .. }));

        let err = tracker
            .capture_item_stack_drop(ItemStack::single("bone"), Vec3::ZERO)
            .unwrap_err();
        assert!(matches!(err, TrackerError::NoActivePhase { .. }));

        let before = world.entity_count();
        tracker.capture_spawn(&mut world, orb()).unwrap();
        assert_eq!(world.entity_count(), before + 1);
    }

    // 4. Nested units inherit owner and notifier from the outer context and
    //    complete before the outer flush.
    #[test]
    fn nested_unit_inherits_attribution() {
        let (mut world, zombie) = world_with_zombie();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());
        let mut sink = RecordingSink::new();
        let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(zombie))
            .with_owner(UserId(5));
        tracker
            .unit_of_work(ctx, &mut world, &mut sink, |tracker, world, sink| {
                let inner = PhaseContext::new(
                    Phase::Explosion,
                    CauseSource::Block(BlockPos::new(1, 64, 1)),
                );
                let (_, inner_report) =
                    tracker.unit_of_work(inner, world, sink, |tracker, world, _| {
                        tracker.capture_spawn(
                            world,
                            EntitySpawn::new(
                                EntityKind::Arrow,
                                Transform::at(W, Vec3::new(1.5, 64.0, 1.5)),
                            ),
                        )
                    })?;
                // The nested flush completed before the outer one starts.
                assert_eq!(inner_report.committed_spawns, 1);
                Ok(())
            })
            .unwrap();
        // The arrow from the nested context carries the outer owner.
        let arrow = world
            .entity_ids()
            .into_iter()
            .find(|id| world.entity(*id).is_some_and(|r| r.kind == EntityKind::Arrow))
            .unwrap();
        assert_eq!(world.creator_of(arrow), Some(UserId(5)));
    }

    // 5. Depth beyond the configured bound fails fast.
    #[test]
    fn runaway_nesting_fails_fast() {
        let (mut world, zombie) = world_with_zombie();
        let mut tracker = PhaseTracker::new(TrackerConfig { max_depth: 2 });
        let mut sink = AcceptAll;

        fn recurse(
            tracker: &mut PhaseTracker,
            world: &mut WorldState,
            sink: &mut AcceptAll,
            zombie: EntityId,
        ) -> Result<(), TrackerError> {
            let ctx = PhaseContext::new(Phase::Explosion, CauseSource::Entity(zombie));
            tracker
                .unit_of_work(ctx, world, sink, |tracker, world, sink| {
                    recurse(tracker, world, sink, zombie)
                })
                .map(|_| ())
        }

        let err = recurse(&mut tracker, &mut world, &mut sink, zombie).unwrap_err();
        assert!(matches!(err, TrackerError::DepthExceeded { .. }));
        assert_eq!(tracker.depth(), 0);
    }

    // 6. The synchronous single-spawn path returns the sink's decision.
    #[test]
    fn spawn_or_capture_honors_verdict() {
        struct RejectAll;
        impl EventSink for RejectAll {
            fn post(&mut self, _: &mut Notification) -> Verdict {
                Verdict::Cancel
            }
        }

        let (mut world, zombie) = world_with_zombie();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());
        let mut sink = RejectAll;
        let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(zombie));
        let before = world.entity_count();
        tracker
            .unit_of_work(ctx, &mut world, &mut sink, |tracker, world, sink| {
                let committed = tracker.spawn_or_capture(world, sink, orb())?;
                assert!(!committed);
                Ok(())
            })
            .unwrap();
        assert_eq!(world.entity_count(), before);
    }

    // 7. The teleport cause reflects the active phase.
    #[test]
    fn teleport_cause_tracks_active_phase() {
        let (mut world, zombie) = world_with_zombie();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());
        let mut sink = AcceptAll;
        assert!(tracker.teleport_cause().is_none());
        let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(zombie));
        tracker
            .unit_of_work(ctx, &mut world, &mut sink, |tracker, _, _| {
                let cause = tracker.teleport_cause().unwrap();
                assert_eq!(
                    cause.first(crate::cause::factor_names::TELEPORT_TYPE),
                    Some(&crate::cause::CauseFactor::Action("entity_teleport".to_owned()))
                );
                Ok(())
            })
            .unwrap();
    }

    // 8. The outer report absorbs what nested units committed, so a caller
    //    holding only the outer report still sees the full tally.
    #[test]
    fn outer_report_absorbs_nested_commits() {
        let (mut world, zombie) = world_with_zombie();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());
        let mut sink = AcceptAll;
        let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(zombie));
        let (_, report) = tracker
            .unit_of_work(ctx, &mut world, &mut sink, |tracker, world, sink| {
                let inner = PhaseContext::new(
                    Phase::Explosion,
                    CauseSource::Block(BlockPos::new(0, 64, 0)),
                );
                tracker
                    .unit_of_work(inner, world, sink, |tracker, _, _| {
                        tracker.capture_block_change(BlockTransaction::breaking(
                            W,
                            BlockPos::new(0, 64, 0),
                            BlockState::named("stone"),
                        ))
                    })
                    .map(|_| ())
            })
            .unwrap();
        assert_eq!(report.committed_blocks, 1);
        assert!(report.committed_anything());
    }
}
