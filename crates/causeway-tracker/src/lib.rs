//! Causeway Tracker -- cause-tracking phase system for an imperative simulation.
//!
//! The simulation this crate wraps is not event-sourced: spawns, block changes,
//! and item drops happen inline, deep inside arbitrary call chains. The tracker
//! retrofits causality onto that loop. Before a unit of work (an entity tick, a
//! block tick, a player action) runs, the driver pushes a [`PhaseContext`] onto
//! the [`PhaseStack`]; every world mutation issued while that context is on top
//! is redirected into its capture buffers instead of being applied. When the
//! unit of work ends, the context is popped and flushed: captured effects are
//! classified, attributed with an ordered [`Cause`] chain, announced through
//! the [`EventSink`], and committed only if the sink does not cancel them.
//!
//! Nesting is the only concurrency here: a flush handler may start another
//! unit of work (an explosion during a tick), which pushes its own context and
//! completes fully before control returns to the outer one. The whole stack is
//! single-threaded and must be empty between ticks.
//!
//! # Quick Start
//!
//! ```
//! use causeway_tracker::prelude::*;
//! use causeway_world::prelude::*;
//!
//! let mut world = WorldState::new(WorldId(0));
//! let zombie = world.spawn_direct(EntitySpawn::new(
//!     EntityKind::Zombie,
//!     Transform::at(WorldId(0), Vec3::new(0.0, 64.0, 0.0)),
//! ));
//!
//! let mut tracker = PhaseTracker::new(TrackerConfig::default());
//! let mut sink = AcceptAll;
//!
//! let ctx = PhaseContext::new(Phase::EntityTick, CauseSource::Entity(zombie));
//! let (_, report) = tracker
//!     .unit_of_work(ctx, &mut world, &mut sink, |tracker, world, _sink| {
//!         tracker.capture_spawn(
//!             world,
//!             EntitySpawn::new(EntityKind::ExperienceOrb, Transform::at(WorldId(0), Vec3::ZERO)),
//!         )
//!     })
//!     .unwrap();
//! assert_eq!(report.committed_spawns, 1);
//! ```
//!
//! [`PhaseContext`]: context::PhaseContext
//! [`PhaseStack`]: stack::PhaseStack
//! [`Cause`]: cause::Cause
//! [`EventSink`]: event::EventSink

#![deny(unsafe_code)]

pub mod buffer;
pub mod cause;
pub mod classify;
pub mod context;
pub mod event;
pub mod flush;
pub mod phase;
pub mod stack;
pub mod tracker;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the phase tracker.
///
/// Everything except [`TrackerError::World`] is a contract violation: the
/// simulation misused the capture discipline and the current unit of work
/// must halt rather than continue with corrupted attribution. Sink
/// cancellation is *not* an error; it is a normal verdict handled in flush.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A phase behavior needed a source of a kind the context does not hold
    /// (e.g. the entity-tick flush ran over a block-sourced context).
    #[error("phase '{phase}' expected a {expected} source, got {actual}")]
    WrongSource {
        phase: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// A capture arrived after the owning buffer was drained -- the context
    /// is being reused past its flush.
    #[error(
        "capture into '{category}' after drain in phase '{phase}' (source {source_desc}): \
         context reused after flush"
    )]
    CaptureAfterDrain {
        category: &'static str,
        phase: &'static str,
        source_desc: String,
    },

    /// A required-capture category was used with no phase on the stack.
    #[error("no active phase for required capture category '{category}'")]
    NoActivePhase { category: &'static str },

    /// Nesting depth exceeded the configured bound -- runaway re-entrancy.
    #[error("phase stack depth {depth} exceeds limit {limit}: runaway re-entrancy")]
    DepthExceeded { depth: usize, limit: usize },

    /// Contexts were left on the stack where none should remain.
    #[error("{remaining} phase context(s) leaked on the stack")]
    LeakedContexts { remaining: usize },

    /// Push/pop got out of balance (an internal invariant, surfaced loudly
    /// rather than silently corrupting attribution).
    #[error("phase stack push/pop out of balance")]
    UnbalancedStack,

    /// A committed effect failed to apply to the world.
    #[error(transparent)]
    World(#[from] causeway_world::WorldError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::buffer::CaptureBuffer;
    pub use crate::cause::{factor_names, Cause, CauseFactor, NamedCause};
    pub use crate::classify::{classify_batch, classify_single, ClassifiedSpawns, SpawnCategory};
    pub use crate::context::{CauseSource, PhaseContext};
    pub use crate::event::{AcceptAll, EventSink, Notification, RecordingSink, Verdict};
    pub use crate::flush::{FlushReport, MoveOutcome};
    pub use crate::phase::Phase;
    pub use crate::stack::PhaseStack;
    pub use crate::tracker::{PhaseTracker, TrackerConfig};
    pub use crate::TrackerError;
}
