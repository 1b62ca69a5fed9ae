//! Explosion resolution as a nested unit of work.
//!
//! An explosion usually detonates from inside some other unit of work (a
//! creeper's tick, a block update). Resolution pushes its own explosion
//! context, so the blast's block breaks and drops flush independently, and
//! the outer attribution flows in through nested-context composition: the
//! crater is still credited to whoever set the fuse.
//!
//! Scatter is driven by a seeded PCG stream, so the same spec against the
//! same world always carves the same crater.

use causeway_tracker::context::{CauseSource, PhaseContext};
use causeway_tracker::event::EventSink;
use causeway_tracker::flush::FlushReport;
use causeway_tracker::phase::Phase;
use causeway_tracker::tracker::PhaseTracker;
use causeway_tracker::TrackerError;
use causeway_world::block::{BlockPos, BlockTransaction};
use causeway_world::item::ItemStack;
use causeway_world::state::WorldState;
use causeway_world::transform::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::debug;

// ---------------------------------------------------------------------------
// ExplosionSpec
// ---------------------------------------------------------------------------

/// One explosion to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionSpec {
    /// Blast center.
    pub center: Vec3,
    /// Blast radius in blocks.
    pub radius: f64,
    /// Per-block survival roll: chance in `[0, 1]` that a block inside the
    /// radius breaks.
    pub break_chance: f64,
    /// Chance that a broken block yields its drop.
    pub drop_chance: f64,
    /// Seed for the scatter stream.
    pub seed: u64,
}

impl ExplosionSpec {
    pub fn new(center: Vec3, radius: f64, seed: u64) -> Self {
        Self {
            center,
            radius,
            break_chance: 0.9,
            drop_chance: 0.3,
            seed,
        }
    }

    fn center_pos(&self) -> BlockPos {
        BlockPos::new(
            self.center.x.floor() as i32,
            self.center.y.floor() as i32,
            self.center.z.floor() as i32,
        )
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve one explosion inside its own nested unit of work.
///
/// Every block within the radius rolls against `break_chance`; breaks are
/// captured as block transactions and a fraction of them also capture a
/// per-block item drop. The returned report is the nested context's own
/// flush, already committed (or cancelled) through `sink`.
pub fn resolve_explosion(
    tracker: &mut PhaseTracker,
    world: &mut WorldState,
    sink: &mut dyn EventSink,
    spec: &ExplosionSpec,
) -> Result<FlushReport, TrackerError> {
    let ctx = PhaseContext::new(Phase::Explosion, CauseSource::Block(spec.center_pos()));
    let (_, report) = tracker.unit_of_work(ctx, world, sink, |tracker, world, _| {
        let mut rng = Pcg64::seed_from_u64(spec.seed);
        let world_id = world.id();
        let reach = spec.radius.ceil() as i32;
        let center = spec.center_pos();

        for x in -reach..=reach {
            for y in -reach..=reach {
                for z in -reach..=reach {
                    let pos = BlockPos::new(center.x + x, center.y + y, center.z + z);
                    let offset = Vec3::new(
                        pos.x as f64 + 0.5 - spec.center.x,
                        pos.y as f64 + 0.5 - spec.center.y,
                        pos.z as f64 + 0.5 - spec.center.z,
                    );
                    let distance =
                        (offset.x * offset.x + offset.y * offset.y + offset.z * offset.z).sqrt();
                    if distance > spec.radius {
                        continue;
                    }
                    let state = world.block(pos);
                    if state.is_air() {
                        continue;
                    }
                    // One roll per candidate block, drawn even for survivors
                    // to keep the stream position independent of the world.
                    let break_roll: f64 = rng.gen();
                    let drop_roll: f64 = rng.gen();
                    if break_roll >= spec.break_chance {
                        continue;
                    }
                    tracker.capture_block_change(BlockTransaction::breaking(
                        world_id,
                        pos,
                        state.clone(),
                    ))?;
                    if drop_roll < spec.drop_chance {
                        tracker.capture_block_item_drop(
                            pos,
                            causeway_world::state::EntitySpawn::item(
                                world_id,
                                Vec3::new(pos.x as f64 + 0.5, pos.y as f64 + 0.5, pos.z as f64 + 0.5),
                                ItemStack::single(&state.id),
                            ),
                        )?;
                    }
                }
            }
        }
        Ok(())
    })?;

    debug!(
        center = ?spec.center_pos(),
        radius = spec.radius,
        broken = report.committed_blocks,
        drops = report.committed_drops,
        "explosion resolved"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
