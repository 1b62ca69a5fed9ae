//! Causeway Engine -- the simulation driver around the phase tracker.
//!
//! This crate owns the outer loop the tracker crate deliberately does not:
//! a [`TickLoop`] that runs registered per-kind entity behaviors and
//! scheduled block updates, each inside its own tracked unit of work, plus
//! explosion resolution and world snapshots for rollback verification.
//!
//! # Quick Start
//!
//! ```
//! use causeway_engine::prelude::*;
//! use causeway_tracker::prelude::*;
//! use causeway_world::prelude::*;
//!
//! let mut world = WorldState::new(WorldId(0));
//! world.spawn_direct(EntitySpawn::new(
//!     EntityKind::Chicken,
//!     Transform::at(WorldId(0), Vec3::new(0.0, 64.0, 0.0)),
//! ));
//!
//! let mut tick_loop = TickLoop::new(world, TickConfig::default());
//! tick_loop.add_entity_behavior("wander", EntityKind::Chicken, |_, world, _, id| {
//!     let record = world.entity_mut(id).ok_or(
//!         causeway_world::WorldError::MissingEntity { entity: id },
//!     )?;
//!     record.transform.position = record.transform.position.add(Vec3::new(0.5, 0.0, 0.0));
//!     Ok(())
//! });
//!
//! let mut sink = AcceptAll;
//! let report = tick_loop.tick(&mut sink).unwrap();
//! assert_eq!(report.ticked_entities, 1);
//! assert_eq!(tick_loop.tick_count(), 1);
//! ```
//!
//! [`TickLoop`]: tick::TickLoop

#![deny(unsafe_code)]

pub mod explosion;
pub mod snapshot;
pub mod tick;

use causeway_tracker::TrackerError;
use causeway_world::WorldError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the simulation driver.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The tracker rejected a capture or a unit of work.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// A direct world access failed.
    #[error(transparent)]
    World(#[from] WorldError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::explosion::{resolve_explosion, ExplosionSpec};
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::tick::{BlockBehavior, EntityBehavior, TickConfig, TickLoop, TickReport};
    pub use crate::EngineError;
}
