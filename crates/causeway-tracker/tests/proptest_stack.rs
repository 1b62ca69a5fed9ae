//! Property tests for phase stack discipline.
//!
//! These tests use `proptest` to generate arbitrary nesting scripts and
//! verify that the stack is balanced after every unit of work, whatever the
//! bodies capture and however deeply they nest.

use causeway_tracker::prelude::*;
use causeway_world::prelude::*;
use proptest::prelude::*;

const W: WorldId = WorldId(0);

/// A nesting script: each node runs one unit of work, captures `spawns`
/// orbs, then runs its children as nested units.
#[derive(Debug, Clone)]
struct Script {
    spawns: usize,
    children: Vec<Script>,
}

fn script_strategy() -> impl Strategy<Value = Script> {
    let leaf = (0..4usize).prop_map(|spawns| Script {
        spawns,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 24, 3, |inner| {
        (0..4usize, prop::collection::vec(inner, 0..3))
            .prop_map(|(spawns, children)| Script { spawns, children })
    })
}

fn run_script(
    tracker: &mut PhaseTracker,
    world: &mut WorldState,
    sink: &mut AcceptAll,
    source: EntityId,
    script: &Script,
) -> Result<usize, TrackerError> {
    let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(source));
    let (_, report) = tracker.unit_of_work(ctx, world, sink, |tracker, world, sink| {
        for _ in 0..script.spawns {
            tracker.capture_spawn(
                world,
                EntitySpawn::new(EntityKind::ExperienceOrb, Transform::at(W, Vec3::ZERO)),
            )?;
        }
        for child in &script.children {
            run_script(tracker, world, sink, source, child)?;
        }
        Ok(())
    })?;
    // The report absorbs nested units, so this node's count is the whole
    // subtree's count.
    Ok(report.committed_spawns)
}

fn script_spawn_total(script: &Script) -> usize {
    script.spawns + script.children.iter().map(script_spawn_total).sum::<usize>()
}

proptest! {
    /// After any nesting script, the stack is back to idle and every
    /// captured spawn was committed exactly once.
    #[test]
    fn stack_balanced_after_any_script(script in script_strategy()) {
        let mut world = WorldState::new(W);
        let source = world.spawn_direct(EntitySpawn::new(
            EntityKind::Zombie,
            Transform::at(W, Vec3::new(0.0, 64.0, 0.0)),
        ));
        let before = world.entity_count();
        let mut tracker = PhaseTracker::new(TrackerConfig::default());
        let mut sink = AcceptAll;

        let committed = run_script(&mut tracker, &mut world, &mut sink, source, &script).unwrap();

        prop_assert_eq!(tracker.depth(), 0);
        prop_assert!(tracker.assert_idle().is_ok());
        prop_assert_eq!(committed, script_spawn_total(&script));
        prop_assert_eq!(world.entity_count(), before + committed);
    }

    /// Capture buffers hand their contents out exactly once, in insertion
    /// order, and reject captures after the drain.
    #[test]
    fn buffers_drain_once(count in 0..32usize) {
        let mut buffer: CaptureBuffer<usize> =
            CaptureBuffer::new("test", "entity_tick", "entity 0v0".to_owned());
        for i in 0..count {
            buffer.capture(i).unwrap();
        }
        let drained = buffer.drain();
        prop_assert_eq!(drained, (0..count).collect::<Vec<_>>());
        prop_assert!(buffer.drain().is_empty());
        let rejected = matches!(
            buffer.capture(0),
            Err(TrackerError::CaptureAfterDrain { .. })
        );
        prop_assert!(rejected);
    }
}
