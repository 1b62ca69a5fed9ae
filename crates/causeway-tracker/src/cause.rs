//! Ordered cause chains attached to outbound notifications.
//!
//! A [`Cause`] is an ordered sequence of named contributing factors. Order is
//! part of the contract: consumers ask for "the first factor named X", and the
//! builder lays factors out as *source first, then type-specific extras, then
//! notifier, then owner*. Once built, a cause is immutable.

use causeway_world::block::BlockPos;
use causeway_world::entity::{DamageSource, EntityId};
use causeway_world::state::UserId;
use causeway_world::transform::WorldId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Factor names
// ---------------------------------------------------------------------------

/// Well-known factor names used across the tracker.
pub mod factor_names {
    pub const SOURCE: &str = "Source";
    pub const NOTIFIER: &str = "Notifier";
    pub const OWNER: &str = "Owner";
    pub const LAST_DAMAGE_SOURCE: &str = "LastDamageSource";
    pub const PARTNER: &str = "Partner";
    pub const PARENT_SOURCE: &str = "ParentSource";
    pub const TELEPORT_TYPE: &str = "TeleportType";
    pub const BLOCK_SOURCE: &str = "BlockSource";
}

// ---------------------------------------------------------------------------
// CauseFactor
// ---------------------------------------------------------------------------

/// One contributing factor in a cause chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CauseFactor {
    /// A live entity.
    Entity(EntityId),
    /// A player identity (owner, notifier, courting partner).
    User(UserId),
    /// A block position.
    Block(BlockPos),
    /// A recorded damage source.
    Damage(DamageSource),
    /// A named action (player action, teleport type).
    Action(String),
    /// A whole world (world-generation contexts).
    World(WorldId),
}

// ---------------------------------------------------------------------------
// NamedCause
// ---------------------------------------------------------------------------

/// A named contributing factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCause {
    pub name: String,
    pub factor: CauseFactor,
}

impl NamedCause {
    pub fn new(name: &str, factor: CauseFactor) -> Self {
        Self {
            name: name.to_owned(),
            factor,
        }
    }
}

// ---------------------------------------------------------------------------
// Cause
// ---------------------------------------------------------------------------

/// An immutable, ordered cause chain.
///
/// Built via [`Cause::source`] and the [`CauseBuilder`]; the insertion order
/// of the builder calls is the order consumers observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    factors: Vec<NamedCause>,
}

impl Cause {
    /// Start a cause chain rooted at `factor` (named
    /// [`factor_names::SOURCE`]).
    pub fn source(factor: CauseFactor) -> CauseBuilder {
        CauseBuilder {
            factors: vec![NamedCause::new(factor_names::SOURCE, factor)],
        }
    }

    /// All factors in chain order.
    pub fn factors(&self) -> &[NamedCause] {
        &self.factors
    }

    /// The first factor with the given name, if present.
    pub fn first(&self, name: &str) -> Option<&CauseFactor> {
        self.factors
            .iter()
            .find(|nc| nc.name == name)
            .map(|nc| &nc.factor)
    }

    /// The root source factor. Always present by construction.
    pub fn root(&self) -> &CauseFactor {
        &self.factors[0].factor
    }

    /// The first user factor with the given name, if present and a user.
    pub fn first_user(&self, name: &str) -> Option<UserId> {
        match self.first(name) {
            Some(CauseFactor::User(user)) => Some(*user),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CauseBuilder
// ---------------------------------------------------------------------------

/// Accumulates named factors in order. Consumed by [`build`](Self::build).
#[derive(Debug)]
pub struct CauseBuilder {
    factors: Vec<NamedCause>,
}

impl CauseBuilder {
    /// Append a named factor.
    pub fn named(mut self, name: &str, factor: CauseFactor) -> Self {
        self.factors.push(NamedCause::new(name, factor));
        self
    }

    /// Append the notifier factor.
    pub fn notifier(self, user: UserId) -> Self {
        self.named(factor_names::NOTIFIER, CauseFactor::User(user))
    }

    /// Append the notifier factor if present.
    pub fn maybe_notifier(self, user: Option<UserId>) -> Self {
        match user {
            Some(user) => self.notifier(user),
            None => self,
        }
    }

    /// Append the owner factor.
    pub fn owner(self, user: UserId) -> Self {
        self.named(factor_names::OWNER, CauseFactor::User(user))
    }

    /// Append the owner factor if present.
    pub fn maybe_owner(self, user: Option<UserId>) -> Self {
        match user {
            Some(user) => self.owner(user),
            None => self,
        }
    }

    /// Freeze the chain.
    pub fn build(self) -> Cause {
        Cause {
            factors: self.factors,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
