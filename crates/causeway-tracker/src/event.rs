//! The outbound notification boundary and its verdicts.
//!
//! The tracker never applies a captured effect without first posting a
//! [`Notification`] through an [`EventSink`]. The sink is an opaque,
//! externally supplied publish point; its [`Verdict`] decides whether the
//! effects commit, and for movement it may carry an override transform.
//! Sink calls are synchronous: any further world mutation the sink performs
//! executes with the nested context (if any) already active, which is what
//! keeps attribution correct under re-entrancy.

use causeway_world::block::BlockTransaction;
use causeway_world::entity::EntityId;
use causeway_world::state::EntitySpawn;
use causeway_world::transform::Transform;
use serde::{Deserialize, Serialize};

use crate::cause::Cause;
use crate::classify::SpawnCategory;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// One outbound notification: a cause chain plus the effects it explains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Entities about to spawn, one notification per non-empty
    /// classification bucket.
    SpawnEntities {
        cause: Cause,
        category: SpawnCategory,
        entities: Vec<EntitySpawn>,
    },
    /// Item entities about to drop.
    DropItems {
        cause: Cause,
        entities: Vec<EntitySpawn>,
    },
    /// Block transactions about to apply.
    ChangeBlocks {
        cause: Cause,
        transactions: Vec<BlockTransaction>,
    },
    /// An entity moved during its tick.
    MoveEntity {
        cause: Cause,
        entity: EntityId,
        old: Transform,
        new: Transform,
    },
}

impl Notification {
    /// The cause chain attached to this notification.
    pub fn cause(&self) -> &Cause {
        match self {
            Notification::SpawnEntities { cause, .. }
            | Notification::DropItems { cause, .. }
            | Notification::ChangeBlocks { cause, .. }
            | Notification::MoveEntity { cause, .. } => cause,
        }
    }

    /// Short name for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Notification::SpawnEntities { .. } => "spawn_entities",
            Notification::DropItems { .. } => "drop_items",
            Notification::ChangeBlocks { .. } => "change_blocks",
            Notification::MoveEntity { .. } => "move_entity",
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The sink's decision about one notification.
///
/// Cancellation is per-notification: cancelling one category's notification
/// never affects the other categories flushed from the same context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// Commit every effect in the notification.
    Accept,
    /// Discard every effect in the notification.
    Cancel,
    /// Discard the effects at the given indices; commit the rest in
    /// capture order.
    CancelPartial(Vec<usize>),
    /// Movement only: commit, but move to this transform instead of the
    /// entity's natural post-tick transform.
    AcceptMoveTo(Transform),
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// The opaque publish point notifications go through.
///
/// Implementations must return synchronously; the flush step that posted the
/// notification blocks on the verdict.
pub trait EventSink {
    fn post(&mut self, notification: &mut Notification) -> Verdict;
}

/// A sink that accepts everything. Useful as a default and in tests.
#[derive(Debug, Default)]
pub struct AcceptAll;

impl EventSink for AcceptAll {
    fn post(&mut self, _notification: &mut Notification) -> Verdict {
        Verdict::Accept
    }
}

/// A sink that accepts everything and records each posted notification.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub posted: Vec<Notification>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn post(&mut self, notification: &mut Notification) -> Verdict {
        self.posted.push(notification.clone());
        Verdict::Accept
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
