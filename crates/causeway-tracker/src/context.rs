//! Per-unit-of-work phase contexts.
//!
//! A [`PhaseContext`] is created immediately before a unit of work begins and
//! destroyed once its flush completes. It holds the causal source (required),
//! optional owner/notifier attribution, and one capture buffer per effect
//! category. Contexts are owned exclusively by the [`PhaseStack`]; nothing may
//! retain one past its pop.
//!
//! [`PhaseStack`]: crate::stack::PhaseStack

use std::fmt;

use causeway_world::block::{BlockPos, BlockTransaction};
use causeway_world::entity::EntityId;
use causeway_world::item::ItemStack;
use causeway_world::state::{EntitySpawn, UserId};
use causeway_world::transform::{Vec3, WorldId};

use crate::buffer::{category, CaptureBuffer};
use crate::cause::{CauseFactor, NamedCause};
use crate::phase::Phase;
use crate::TrackerError;

// ---------------------------------------------------------------------------
// CauseSource
// ---------------------------------------------------------------------------

/// The object whose processing a context represents. Exactly one per context;
/// a context cannot exist without one.
#[derive(Debug, Clone, PartialEq)]
pub enum CauseSource {
    /// A ticking entity.
    Entity(EntityId),
    /// A ticking block.
    Block(BlockPos),
    /// A named player action.
    Action { user: UserId, action: String },
    /// A whole world (world generation).
    World(WorldId),
}

impl CauseSource {
    /// The factor this source contributes to cause chains.
    pub fn factor(&self) -> CauseFactor {
        match self {
            CauseSource::Entity(id) => CauseFactor::Entity(*id),
            CauseSource::Block(pos) => CauseFactor::Block(*pos),
            CauseSource::Action { user, .. } => CauseFactor::User(*user),
            CauseSource::World(id) => CauseFactor::World(*id),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            CauseSource::Entity(_) => "entity",
            CauseSource::Block(_) => "block",
            CauseSource::Action { .. } => "action",
            CauseSource::World(_) => "world",
        }
    }
}

impl fmt::Display for CauseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CauseSource::Entity(id) => write!(f, "entity {id}"),
            CauseSource::Block(pos) => write!(f, "block {pos}"),
            CauseSource::Action { user, action } => write!(f, "action '{action}' by {user}"),
            CauseSource::World(id) => write!(f, "world #{}", id.0),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseContext
// ---------------------------------------------------------------------------

/// Mutable record attached to one pushed phase.
///
/// Mutated only by buffer appends while its unit of work runs, and by the
/// flush routine that drains it afterward. Never refilled after flush.
#[derive(Debug)]
pub struct PhaseContext {
    phase: Phase,
    source: CauseSource,
    owner: Option<UserId>,
    notifier: Option<UserId>,
    /// Extra named factors appended to every cause built from this context
    /// (seeded by the parent when this context is nested).
    extra_factors: Vec<NamedCause>,
    pub(crate) blocks: CaptureBuffer<BlockTransaction>,
    pub(crate) spawns: CaptureBuffer<EntitySpawn>,
    pub(crate) item_drops: CaptureBuffer<EntitySpawn>,
    pub(crate) block_item_drops: CaptureBuffer<(BlockPos, EntitySpawn)>,
    pub(crate) stack_drops: CaptureBuffer<(ItemStack, Vec3)>,
}

impl PhaseContext {
    /// Create a context for `phase` rooted at `source`.
    pub fn new(phase: Phase, source: CauseSource) -> Self {
        let name = phase.name();
        let described = source.to_string();
        Self {
            blocks: CaptureBuffer::new(category::BLOCK_CHANGES, name, described.clone()),
            spawns: CaptureBuffer::new(category::ENTITY_SPAWNS, name, described.clone()),
            item_drops: CaptureBuffer::new(category::ITEM_DROPS, name, described.clone()),
            block_item_drops: CaptureBuffer::new(
                category::BLOCK_ITEM_DROPS,
                name,
                described.clone(),
            ),
            stack_drops: CaptureBuffer::new(category::ITEM_STACK_DROPS, name, described),
            phase,
            source,
            owner: None,
            notifier: None,
            extra_factors: Vec::new(),
        }
    }

    /// Attach the ultimate originator of effects in this context.
    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Attach the most recent influencer of this context's source.
    pub fn with_notifier(mut self, notifier: UserId) -> Self {
        self.notifier = Some(notifier);
        self
    }

    // -- accessors -----------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn source(&self) -> &CauseSource {
        &self.source
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn notifier(&self) -> Option<UserId> {
        self.notifier
    }

    /// The creator stamped on committed effects: the notifier wins over the
    /// owner when both are present.
    pub fn effect_creator(&self) -> Option<UserId> {
        self.notifier.or(self.owner)
    }

    /// Extra named factors this context contributes to its cause chains.
    pub fn extra_factors(&self) -> &[NamedCause] {
        &self.extra_factors
    }

    /// The source as an entity, or a contract violation naming the phase.
    pub fn source_entity(&self) -> Result<EntityId, TrackerError> {
        match &self.source {
            CauseSource::Entity(id) => Ok(*id),
            other => Err(TrackerError::WrongSource {
                phase: self.phase.name(),
                expected: "entity",
                actual: other.kind_name().to_owned(),
            }),
        }
    }

    /// The source as a block position, or a contract violation.
    pub fn source_block(&self) -> Result<BlockPos, TrackerError> {
        match &self.source {
            CauseSource::Block(pos) => Ok(*pos),
            other => Err(TrackerError::WrongSource {
                phase: self.phase.name(),
                expected: "block",
                actual: other.kind_name().to_owned(),
            }),
        }
    }

    /// Whether any buffer holds undrained captures.
    pub fn has_captures(&self) -> bool {
        !self.blocks.is_empty()
            || !self.spawns.is_empty()
            || !self.item_drops.is_empty()
            || !self.block_item_drops.is_empty()
            || !self.stack_drops.is_empty()
    }

    // -- nested-context seeding (used by compose_nested) ---------------------

    pub(crate) fn inherit_owner(&mut self, owner: Option<UserId>) {
        if self.owner.is_none() {
            self.owner = owner;
        }
    }

    pub(crate) fn inherit_notifier(&mut self, notifier: Option<UserId>) {
        if self.notifier.is_none() {
            self.notifier = notifier;
        }
    }

    pub(crate) fn push_extra_factor(&mut self, factor: NamedCause) {
        self.extra_factors.push(factor);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
