//! The flush routine: drain, classify, notify, commit.
//!
//! Flush runs once per popped context, in a fixed category order: block
//! transactions, then classified entity spawns, then dropped items, then
//! per-block drop maps, then item-stack drops, and finally (entity ticks
//! only) movement detection. Each non-empty category posts exactly one
//! notification per bucket through the sink; only an uncancelled verdict
//! reaches the world, and each committed effect is applied exactly once.

use std::collections::{BTreeMap, HashSet};

use causeway_world::entity::EntityId;
use causeway_world::state::{EntitySpawn, WorldState};
use causeway_world::transform::Transform;
use causeway_world::WorldError;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cause::{factor_names, Cause, CauseFactor};
use crate::classify::{classify_batch, SpawnCategory};
use crate::context::{CauseSource, PhaseContext};
use crate::event::{EventSink, Notification, Verdict};
use crate::phase::base_cause;
use crate::TrackerError;

// ---------------------------------------------------------------------------
// FlushReport
// ---------------------------------------------------------------------------

/// What one flush committed and discarded.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushReport {
    pub committed_spawns: usize,
    pub cancelled_spawns: usize,
    pub committed_blocks: usize,
    pub cancelled_blocks: usize,
    pub committed_drops: usize,
    pub cancelled_drops: usize,
    /// Set when movement detection ran and found a change.
    pub move_outcome: Option<MoveOutcome>,
}

impl FlushReport {
    /// Fold another flush's counts into this one. An enclosing unit of work
    /// absorbs the reports of units nested inside it this way, so its report
    /// covers everything committed under its scope. This unit's own movement
    /// outcome takes precedence over a nested one.
    pub fn merge(&mut self, other: &FlushReport) {
        self.committed_spawns += other.committed_spawns;
        self.cancelled_spawns += other.cancelled_spawns;
        self.committed_blocks += other.committed_blocks;
        self.cancelled_blocks += other.cancelled_blocks;
        self.committed_drops += other.committed_drops;
        self.cancelled_drops += other.cancelled_drops;
        self.move_outcome = self.move_outcome.or(other.move_outcome);
    }

    /// Whether the flush applied anything to the world.
    pub fn committed_anything(&self) -> bool {
        self.committed_spawns + self.committed_blocks + self.committed_drops > 0
            || matches!(
                self.move_outcome,
                Some(MoveOutcome::Accepted) | Some(MoveOutcome::Overridden)
            )
    }
}

/// How a detected movement was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// The natural post-tick transform stood.
    Accepted,
    /// The sink cancelled; position and rotation were rolled back.
    Reverted,
    /// The sink supplied a replacement transform, which was applied.
    Overridden,
}

// ---------------------------------------------------------------------------
// Verdict application
// ---------------------------------------------------------------------------

/// Split a drained category by the sink's verdict, preserving capture order
/// among the kept items. A movement override on a non-movement category has
/// no meaning and degrades to a plain accept.
pub(crate) fn keep_committed<T>(
    items: Vec<T>,
    verdict: Verdict,
    category: &'static str,
) -> (Vec<T>, usize) {
    match verdict {
        Verdict::Accept => (items, 0),
        Verdict::AcceptMoveTo(_) => {
            warn!(category, "movement override on non-movement notification, accepting as-is");
            (items, 0)
        }
        Verdict::Cancel => {
            let cancelled = items.len();
            (Vec::new(), cancelled)
        }
        Verdict::CancelPartial(indices) => {
            let cancelled: HashSet<usize> = indices.into_iter().collect();
            let total = items.len();
            let kept: Vec<T> = items
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !cancelled.contains(i))
                .map(|(_, item)| item)
                .collect();
            let dropped = total - kept.len();
            (kept, dropped)
        }
    }
}

// ---------------------------------------------------------------------------
// Per-bucket cause chains
// ---------------------------------------------------------------------------

/// The cause chain for one spawn bucket. Experience and breeding carry
/// bucket-specific factors; projectiles and passives use the common chain.
pub(crate) fn spawn_cause(
    ctx: &PhaseContext,
    world: &WorldState,
    category: SpawnCategory,
) -> Cause {
    match category {
        SpawnCategory::Experience => {
            let mut builder = Cause::source(ctx.source().factor());
            // A dead source's orbs are attributed to whatever killed it.
            if let CauseSource::Entity(id) = ctx.source() {
                if let Some(record) = world.entity(*id) {
                    if record.dead {
                        if let Some(damage) = &record.last_damage {
                            builder = builder.named(
                                factor_names::LAST_DAMAGE_SOURCE,
                                CauseFactor::Damage(damage.clone()),
                            );
                        }
                    }
                }
            }
            for extra in ctx.extra_factors() {
                builder = builder.named(&extra.name, extra.factor.clone());
            }
            builder
                .maybe_notifier(ctx.notifier())
                .maybe_owner(ctx.owner())
                .build()
        }
        SpawnCategory::Breeding => {
            // Breeding chains name only the source and its courting
            // partner; attribution users are deliberately absent.
            let mut builder = Cause::source(ctx.source().factor());
            if let CauseSource::Entity(id) = ctx.source() {
                if let Some(partner) = world.entity(*id).and_then(|r| r.courting) {
                    builder =
                        builder.named(factor_names::PARTNER, CauseFactor::User(partner));
                }
            }
            for extra in ctx.extra_factors() {
                builder = builder.named(&extra.name, extra.factor.clone());
            }
            builder.build()
        }
        SpawnCategory::Projectile | SpawnCategory::Passive => base_cause(ctx),
    }
}

// ---------------------------------------------------------------------------
// Flush
// ---------------------------------------------------------------------------

/// Drain every buffer of `ctx` in the fixed category order, posting one
/// notification per non-empty bucket and committing what survives.
pub(crate) fn flush_context<S: EventSink + ?Sized>(
    ctx: &mut PhaseContext,
    world: &mut WorldState,
    sink: &mut S,
) -> Result<FlushReport, TrackerError> {
    let behavior = ctx.phase().behavior();
    let mut report = FlushReport::default();

    // 1. Block transactions.
    let blocks = ctx.blocks.drain();
    if !blocks.is_empty() {
        let mut notification = Notification::ChangeBlocks {
            cause: base_cause(ctx),
            transactions: blocks,
        };
        let verdict = sink.post(&mut notification);
        let Notification::ChangeBlocks { transactions, .. } = notification else {
            unreachable!("sink cannot change a notification's variant");
        };
        let (kept, cancelled) = keep_committed(transactions, verdict, "block_changes");
        report.cancelled_blocks += cancelled;
        for tx in &kept {
            world.force_apply_block(tx)?;
            (behavior.attribute_block_change)(ctx, world, tx)?;
        }
        report.committed_blocks += kept.len();
    }

    // 2. Entity spawns, classified into buckets, notified in bucket order.
    let spawns = ctx.spawns.drain();
    if !spawns.is_empty() {
        let source_kind = match ctx.source() {
            CauseSource::Entity(id) => world.entity(*id).map(|r| r.kind),
            _ => None,
        };
        let classified = classify_batch(source_kind, spawns);
        for category in SpawnCategory::ALL {
            let bucket = classified.bucket(category).to_vec();
            if bucket.is_empty() {
                continue;
            }
            trace!(
                phase = ctx.phase().name(),
                category = category.name(),
                count = bucket.len(),
                "posting spawn bucket"
            );
            let mut notification = Notification::SpawnEntities {
                cause: spawn_cause(ctx, world, category),
                category,
                entities: bucket,
            };
            let verdict = sink.post(&mut notification);
            let Notification::SpawnEntities { entities, .. } = notification else {
                unreachable!("sink cannot change a notification's variant");
            };
            let (kept, cancelled) = keep_committed(entities, verdict, category.name());
            report.cancelled_spawns += cancelled;
            for spawn in kept {
                world.force_spawn(spawn, ctx.effect_creator())?;
                report.committed_spawns += 1;
            }
        }
    }

    // 3. Dropped item entities.
    let item_drops = ctx.item_drops.drain();
    if !item_drops.is_empty() {
        let committed = post_drops(ctx, world, sink, base_cause(ctx), item_drops, &mut report)?;
        report.committed_drops += committed;
    }

    // 4. Per-block drop maps, one notification per position, in position
    //    order.
    let block_item_drops = ctx.block_item_drops.drain();
    if !block_item_drops.is_empty() {
        let mut by_pos: BTreeMap<_, Vec<EntitySpawn>> = BTreeMap::new();
        for (pos, spawn) in block_item_drops {
            by_pos.entry(pos).or_default().push(spawn);
        }
        for (pos, drops) in by_pos {
            let mut builder = Cause::source(ctx.source().factor())
                .named(factor_names::BLOCK_SOURCE, CauseFactor::Block(pos));
            for extra in ctx.extra_factors() {
                builder = builder.named(&extra.name, extra.factor.clone());
            }
            let cause = builder
                .maybe_notifier(ctx.notifier())
                .maybe_owner(ctx.owner())
                .build();
            let committed = post_drops(ctx, world, sink, cause, drops, &mut report)?;
            report.committed_drops += committed;
        }
    }

    // 5. Item-stack drops, converted to live item entities on commit.
    let stack_drops = ctx.stack_drops.drain();
    if !stack_drops.is_empty() {
        let world_id = world.id();
        let candidates: Vec<EntitySpawn> = stack_drops
            .into_iter()
            .map(|(stack, position)| EntitySpawn::item(world_id, position, stack))
            .collect();
        let committed = post_drops(ctx, world, sink, base_cause(ctx), candidates, &mut report)?;
        report.committed_drops += committed;
    }

    // 6. Movement detection, entity ticks only.
    if behavior.detects_movement {
        report.move_outcome = detect_movement(ctx, world, sink)?;
    }

    debug!(
        phase = ctx.phase().name(),
        spawns = report.committed_spawns,
        blocks = report.committed_blocks,
        drops = report.committed_drops,
        "flushed context"
    );
    Ok(report)
}

/// Post one drop notification and commit the surviving candidates.
fn post_drops<S: EventSink + ?Sized>(
    ctx: &PhaseContext,
    world: &mut WorldState,
    sink: &mut S,
    cause: Cause,
    drops: Vec<EntitySpawn>,
    report: &mut FlushReport,
) -> Result<usize, TrackerError> {
    let mut notification = Notification::DropItems {
        cause,
        entities: drops,
    };
    let verdict = sink.post(&mut notification);
    let Notification::DropItems { entities, .. } = notification else {
        unreachable!("sink cannot change a notification's variant");
    };
    let (kept, cancelled) = keep_committed(entities, verdict, "item_drops");
    report.cancelled_drops += cancelled;
    let committed = kept.len();
    for drop in kept {
        world.force_spawn(drop, ctx.effect_creator())?;
    }
    Ok(committed)
}

// ---------------------------------------------------------------------------
// Movement detection
// ---------------------------------------------------------------------------

/// Compare the source entity's pre-tick and post-tick transforms and, if
/// they differ, post a move notification. Projectiles, item entities, and
/// entities already dead never produce one.
fn detect_movement<S: EventSink + ?Sized>(
    ctx: &PhaseContext,
    world: &mut WorldState,
    sink: &mut S,
) -> Result<Option<MoveOutcome>, TrackerError> {
    let id = ctx.source_entity()?;
    let Some(record) = world.entity(id) else {
        // Despawned mid-tick; nothing to move.
        return Ok(None);
    };
    if record.dead || record.kind.is_projectile() || record.kind.is_item() {
        return Ok(None);
    }
    let old = record.last_transform;
    let natural = record.transform;
    if old.position == natural.position && old.rotation == natural.rotation {
        return Ok(None);
    }

    let mut notification = Notification::MoveEntity {
        cause: base_cause(ctx),
        entity: id,
        old,
        new: natural,
    };
    let verdict = sink.post(&mut notification);
    let Notification::MoveEntity { new: requested, .. } = notification else {
        unreachable!("sink cannot change a notification's variant");
    };

    let outcome = match verdict {
        Verdict::Accept => {
            // The sink may have edited the target transform in place.
            let target = sanitize_move_target(world, requested, natural);
            apply_move(world, id, target)?;
            if target == natural {
                MoveOutcome::Accepted
            } else {
                MoveOutcome::Overridden
            }
        }
        Verdict::AcceptMoveTo(target) => {
            let target = sanitize_move_target(world, target, natural);
            apply_move(world, id, target)?;
            if target == natural {
                MoveOutcome::Accepted
            } else {
                MoveOutcome::Overridden
            }
        }
        Verdict::Cancel => {
            apply_move(world, id, old)?;
            MoveOutcome::Reverted
        }
        Verdict::CancelPartial(_) => {
            warn!(entity = %id, "partial cancellation of a move notification, cancelling whole");
            apply_move(world, id, old)?;
            MoveOutcome::Reverted
        }
    };
    Ok(Some(outcome))
}

/// A replacement transform bound to a foreign world cannot be honored; fall
/// back to the natural post-tick value.
fn sanitize_move_target(world: &WorldState, target: Transform, natural: Transform) -> Transform {
    if target.world != world.id() {
        warn!(
            requested = ?target.world,
            actual = ?world.id(),
            "move override targets a foreign world, keeping natural transform"
        );
        natural
    } else {
        target
    }
}

fn apply_move(world: &mut WorldState, id: EntityId, target: Transform) -> Result<(), TrackerError> {
    let record = world
        .entity_mut(id)
        .ok_or(WorldError::MissingEntity { entity: id })?;
    record.transform.position = target.position;
    record.transform.rotation = target.rotation;
    Ok(())
}
