//! Phase variants and their per-variant behavior table.
//!
//! Each unit of work runs under exactly one [`Phase`]. The variants share a
//! single contract (cause building, block-change attribution, nested-context
//! composition, movement detection) but differ in how they fulfil it. That
//! contract is a closed dispatch table of plain function pointers rather
//! than a trait object: the set of phases is fixed, and a `const` table per
//! variant keeps dispatch allocation-free on the tick path.

use causeway_world::block::{BlockChangeKind, BlockTransaction};
use causeway_world::state::WorldState;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cause::{factor_names, Cause, CauseFactor, NamedCause};
use crate::context::PhaseContext;
use crate::TrackerError;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The tagged kind of unit of work a context represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// One entity's tick.
    EntityTick,
    /// One scheduled block update.
    BlockTick,
    /// One discrete player action.
    PlayerAction,
    /// One explosion resolution, usually nested inside a tick.
    Explosion,
    /// Bulk terrain population.
    WorldGeneration,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::EntityTick => "entity_tick",
            Phase::BlockTick => "block_tick",
            Phase::PlayerAction => "player_action",
            Phase::Explosion => "explosion",
            Phase::WorldGeneration => "world_generation",
        }
    }

    /// The behavior table for this variant.
    pub fn behavior(self) -> &'static PhaseBehavior {
        match self {
            Phase::EntityTick => &ENTITY_TICK,
            Phase::BlockTick => &BLOCK_TICK,
            Phase::PlayerAction => &PLAYER_ACTION,
            Phase::Explosion => &EXPLOSION,
            Phase::WorldGeneration => &WORLD_GENERATION,
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseBehavior
// ---------------------------------------------------------------------------

/// Per-variant behavior, dispatched through plain function pointers.
pub struct PhaseBehavior {
    /// Whether flush runs end-of-tick movement detection on the source
    /// entity. Only the entity tick does.
    pub detects_movement: bool,
    /// Build the cause chain attached to a teleport of this context's
    /// source.
    pub teleport_cause: fn(&PhaseContext) -> Cause,
    /// Variant-specific cleanup and attribution run once per committed
    /// block transaction.
    pub attribute_block_change:
        fn(&PhaseContext, &mut WorldState, &BlockTransaction) -> Result<(), TrackerError>,
    /// Seed a freshly pushed nested context from this (outer) context.
    pub compose_nested: fn(&PhaseContext, &mut PhaseContext),
}

static ENTITY_TICK: PhaseBehavior = PhaseBehavior {
    detects_movement: true,
    teleport_cause: entity_teleport_cause,
    attribute_block_change: entity_attribute_block_change,
    compose_nested: default_compose_nested,
};

static BLOCK_TICK: PhaseBehavior = PhaseBehavior {
    detects_movement: false,
    teleport_cause: default_teleport_cause,
    attribute_block_change: default_attribute_block_change,
    compose_nested: default_compose_nested,
};

static PLAYER_ACTION: PhaseBehavior = PhaseBehavior {
    detects_movement: false,
    teleport_cause: default_teleport_cause,
    attribute_block_change: default_attribute_block_change,
    compose_nested: default_compose_nested,
};

static EXPLOSION: PhaseBehavior = PhaseBehavior {
    detects_movement: false,
    teleport_cause: default_teleport_cause,
    attribute_block_change: default_attribute_block_change,
    compose_nested: default_compose_nested,
};

static WORLD_GENERATION: PhaseBehavior = PhaseBehavior {
    detects_movement: false,
    teleport_cause: default_teleport_cause,
    attribute_block_change: default_attribute_block_change,
    compose_nested: default_compose_nested,
};

// ---------------------------------------------------------------------------
// Shared cause assembly
// ---------------------------------------------------------------------------

/// The common cause chain for a context: source first, then any inherited
/// extra factors, then notifier, then owner.
pub(crate) fn base_cause(ctx: &PhaseContext) -> Cause {
    let mut builder = Cause::source(ctx.source().factor());
    for extra in ctx.extra_factors() {
        builder = builder.named(&extra.name, extra.factor.clone());
    }
    builder
        .maybe_notifier(ctx.notifier())
        .maybe_owner(ctx.owner())
        .build()
}

fn default_teleport_cause(ctx: &PhaseContext) -> Cause {
    base_cause(ctx)
}

/// Entity teleports additionally name the teleport kind, so consumers can
/// tell a tick-driven relocation from a portal or command teleport.
fn entity_teleport_cause(ctx: &PhaseContext) -> Cause {
    let mut builder = Cause::source(ctx.source().factor()).named(
        factor_names::TELEPORT_TYPE,
        CauseFactor::Action("entity_teleport".to_owned()),
    );
    for extra in ctx.extra_factors() {
        builder = builder.named(&extra.name, extra.factor.clone());
    }
    builder
        .maybe_notifier(ctx.notifier())
        .maybe_owner(ctx.owner())
        .build()
}

// ---------------------------------------------------------------------------
// Block-change attribution
// ---------------------------------------------------------------------------

/// Stamp creator/notifier tracking on a committed block change.
fn default_attribute_block_change(
    ctx: &PhaseContext,
    world: &mut WorldState,
    tx: &BlockTransaction,
) -> Result<(), TrackerError> {
    if let Some(owner) = ctx.owner() {
        world.set_block_creator(tx.pos, owner);
    }
    if let Some(notifier) = ctx.notifier() {
        world.set_block_notifier(tx.pos, notifier);
    }
    Ok(())
}

/// Entity-tick block breaks additionally detach anything structurally
/// attached to the destroyed block: each hanging entity drops its held
/// stack as a live item and is removed from the world.
fn entity_attribute_block_change(
    ctx: &PhaseContext,
    world: &mut WorldState,
    tx: &BlockTransaction,
) -> Result<(), TrackerError> {
    if tx.kind == BlockChangeKind::Break {
        let hanging: Vec<_> = world
            .hanging_at(tx.pos)
            .into_iter()
            .filter_map(|id| {
                world
                    .entity(id)
                    .map(|r| (id, r.stack.clone(), r.transform.position))
            })
            .collect();
        for (id, stack, position) in hanging {
            debug!(
                entity = %id,
                pos = ?tx.pos,
                "detaching hanging entity from broken block"
            );
            if let Some(stack) = stack {
                world.force_spawn_item(stack, position, ctx.effect_creator())?;
            }
            world.kill(id, None)?;
            world.despawn(id)?;
        }
    }
    default_attribute_block_change(ctx, world, tx)
}

// ---------------------------------------------------------------------------
// Nested composition
// ---------------------------------------------------------------------------

/// Every variant composes nested contexts the same way: attribution flows
/// inward without overwriting what the nested unit declared itself, and the
/// outer source becomes a named parent factor in the nested cause chains.
fn default_compose_nested(outer: &PhaseContext, inner: &mut PhaseContext) {
    inner.inherit_owner(outer.owner());
    inner.inherit_notifier(outer.notifier());
    inner.push_extra_factor(NamedCause::new(
        factor_names::PARENT_SOURCE,
        outer.source().factor(),
    ));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CauseSource;
    use causeway_world::block::{BlockPos, BlockState};
    use causeway_world::entity::{EntityId, EntityKind};
    use causeway_world::item::ItemStack;
    use causeway_world::state::{EntitySpawn, UserId};
    use causeway_world::transform::{Transform, Vec3, WorldId};

    fn ctx(phase: Phase) -> PhaseContext {
        PhaseContext::new(phase, CauseSource::Entity(EntityId::new(0, 7)))
            .with_owner(UserId(1))
            .with_notifier(UserId(2))
    }

    // 1. The base cause orders factors source, extras, notifier, owner.
    #[test]
    fn base_cause_factor_order() {
        let mut context = ctx(Phase::BlockTick);
        context.push_extra_factor(NamedCause::new(
            factor_names::PARENT_SOURCE,
            CauseFactor::Block(BlockPos::new(1, 2, 3)),
        ));
        let cause = base_cause(&context);
        let names: Vec<&str> = cause.factors().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                factor_names::SOURCE,
                factor_names::PARENT_SOURCE,
                factor_names::NOTIFIER,
                factor_names::OWNER,
            ]
        );
    }

    // 2. Entity teleport causes carry the teleport kind right after the
    //    source.
    #[test]
    fn entity_teleport_cause_names_teleport_type() {
        let context = ctx(Phase::EntityTick);
        let cause = (Phase::EntityTick.behavior().teleport_cause)(&context);
        assert_eq!(cause.factors()[1].name, factor_names::TELEPORT_TYPE);
        assert_eq!(
            cause.first(factor_names::TELEPORT_TYPE),
            Some(&CauseFactor::Action("entity_teleport".to_owned()))
        );
    }

    // 3. Nested composition inherits attribution without overwriting and
    //    records the outer source as a parent factor.
    #[test]
    fn compose_nested_inherits_and_parents() {
        let outer = ctx(Phase::EntityTick);
        let mut inner = PhaseContext::new(
            Phase::Explosion,
            CauseSource::Block(BlockPos::new(0, 64, 0)),
        )
        .with_notifier(UserId(9));
        (Phase::EntityTick.behavior().compose_nested)(&outer, &mut inner);
        assert_eq!(inner.owner(), Some(UserId(1)));
        // The nested context's own notifier is preserved.
        assert_eq!(inner.notifier(), Some(UserId(9)));
        assert_eq!(inner.extra_factors().len(), 1);
        assert_eq!(inner.extra_factors()[0].name, factor_names::PARENT_SOURCE);
    }

    // 4. Breaking a block under an entity tick detaches the hanging entity
    //    and drops its held stack.
    #[test]
    fn entity_break_detaches_hanging() {
        let world_id = WorldId(0);
        let mut world = WorldState::new(world_id);
        let pos = BlockPos::new(4, 70, 4);
        world.set_block(pos, BlockState::named("stone"));
        let frame = world.spawn_direct(
            EntitySpawn::new(
                EntityKind::ItemFrame,
                Transform::at(world_id, Vec3::new(4.5, 70.5, 4.5)),
            )
            .attached(pos)
            .holding(ItemStack::single("painting")),
        );

        let context = ctx(Phase::EntityTick);
        let tx = BlockTransaction::breaking(world_id, pos, BlockState::named("stone"));
        (Phase::EntityTick.behavior().attribute_block_change)(&context, &mut world, &tx)
            .unwrap();

        assert!(world.entity(frame).is_none());
        // One item entity now holds the dropped stack, stamped with the
        // context's effect creator.
        let dropped: Vec<_> = world
            .entity_ids()
            .into_iter()
            .filter(|id| world.entity(*id).is_some_and(|r| r.kind.is_item()))
            .collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(world.creator_of(dropped[0]), Some(UserId(2)));
    }

    // 5. Non-break changes leave attached entities alone.
    #[test]
    fn entity_place_keeps_hanging() {
        let world_id = WorldId(0);
        let mut world = WorldState::new(world_id);
        let pos = BlockPos::new(4, 70, 4);
        let frame = world.spawn_direct(
            EntitySpawn::new(
                EntityKind::ItemFrame,
                Transform::at(world_id, Vec3::new(4.5, 70.5, 4.5)),
            )
            .attached(pos),
        );
        let context = ctx(Phase::EntityTick);
        let tx = BlockTransaction::placing(world_id, pos, BlockState::named("torch"));
        (Phase::EntityTick.behavior().attribute_block_change)(&context, &mut world, &tx)
            .unwrap();
        assert!(world.entity(frame).is_some());
        // Owner and notifier tracking still stamped.
        assert_eq!(world.block_creator(pos), Some(UserId(1)));
        assert_eq!(world.block_notifier(pos), Some(UserId(2)));
    }
}
