//! Abilities: the units of bending behavior.
//!
//! # Architecture
//!
//! An ability is created from its [`AbilityDescription`] by a factory
//! closure, activated once by user input, then updated every tick by the
//! owning world's [`AbilityManager`] until it reports
//! [`UpdateResult::Remove`], fails, or is destroyed by a collision or an
//! explicit request. Abilities reach the world only through the
//! [`AbilityContext`] they are handed, which also lets them spawn follow-up
//! abilities and [`Updatable`] effects; both are queued and become live at
//! the start of the next update.

pub mod common;
mod description;
mod manager;

pub use description::{
    AbilityDescription, AbilityDescriptionBuilder, AbilityFactory, AbilityKey, AbilityRegistry,
    Activation, Activations, DEFAULT_NAMESPACE,
};
pub use manager::AbilityManager;

use std::fmt;

use bending_geometry::Collider;
use serde::{Deserialize, Serialize};

use crate::collision::Collision;
use crate::context::WorldContext;
use crate::error::AbilityError;
use crate::user::{User, UserId};

/// Identifier of a live ability instance, unique within its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbilityId(pub u64);

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ability({})", self.0)
    }
}

/// Whether an ability or effect keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// Keep updating
    Continue,
    /// Remove and destroy
    Remove,
}

/// A tick-driven effect without an owner (fractures, rising pillars).
pub trait Updatable: Send {
    /// Advance one tick.
    fn update(&mut self, world: &mut WorldContext) -> UpdateResult;
}

/// A live bending ability.
pub trait Ability: Send {
    /// Metadata this instance was created from.
    fn description(&self) -> &std::sync::Arc<AbilityDescription>;

    /// Try to start. Returning false discards the instance.
    fn activate(&mut self, ctx: &mut AbilityContext<'_>, method: Activation) -> bool;

    /// Advance one tick.
    ///
    /// # Errors
    ///
    /// Any error removes and destroys the ability; the error is logged.
    fn update(&mut self, ctx: &mut AbilityContext<'_>) -> Result<UpdateResult, AbilityError>;

    /// Release everything the ability holds. Called exactly once on removal.
    fn on_destroy(&mut self, _world: &mut WorldContext) {}

    /// The ability moved to a new owner. Returning false rejects the move.
    fn on_user_change(&mut self, _user: &User) -> bool {
        true
    }

    /// Current collision shapes.
    fn colliders(&self) -> Vec<Collider> {
        Vec::new()
    }

    /// Another ability's collider touched one of ours.
    fn on_collision(&mut self, _collision: &mut Collision) {}
}

/// A live ability together with its bookkeeping.
pub struct AbilityInstance {
    id: AbilityId,
    user: UserId,
    ability: Box<dyn Ability>,
}

impl AbilityInstance {
    /// Instance ID.
    #[must_use]
    pub fn id(&self) -> AbilityId {
        self.id
    }

    /// Owner.
    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    /// The ability.
    #[must_use]
    pub fn ability(&self) -> &dyn Ability {
        self.ability.as_ref()
    }
}

impl fmt::Debug for AbilityInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityInstance")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("ability", self.ability.description().key())
            .finish()
    }
}

/// Abilities and effects waiting to become live.
#[derive(Default)]
pub struct AddQueue {
    next_id: u64,
    abilities: Vec<AbilityInstance>,
    updatables: Vec<Box<dyn Updatable>>,
}

impl AddQueue {
    fn push(&mut self, user: UserId, ability: Box<dyn Ability>) -> AbilityId {
        self.next_id += 1;
        let id = AbilityId(self.next_id);
        self.abilities.push(AbilityInstance { id, user, ability });
        id
    }

    /// Number of queued abilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty() && self.updatables.is_empty()
    }
}

impl fmt::Debug for AddQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddQueue")
            .field("abilities", &self.abilities)
            .field("updatables", &self.updatables.len())
            .finish_non_exhaustive()
    }
}

/// What an ability sees while activating or updating.
pub struct AbilityContext<'a> {
    user: &'a User,
    world: &'a mut WorldContext,
    queue: &'a mut AddQueue,
}

impl<'a> AbilityContext<'a> {
    pub(crate) fn new(user: &'a User, world: &'a mut WorldContext, queue: &'a mut AddQueue) -> Self {
        Self { user, world, queue }
    }

    /// Owner of the running ability.
    #[must_use]
    pub fn user(&self) -> &'a User {
        self.user
    }

    /// The world.
    pub fn world(&mut self) -> &mut WorldContext {
        &mut *self.world
    }

    /// Read-only view of the world.
    #[must_use]
    pub fn world_ref(&self) -> &WorldContext {
        &*self.world
    }

    /// Queue another ability for the current owner. It becomes live on the
    /// next update.
    pub fn add_ability(&mut self, ability: Box<dyn Ability>) -> AbilityId {
        self.queue.push(self.user.id(), ability)
    }

    /// Queue an effect. It starts updating on the next update.
    pub fn add_updatable(&mut self, updatable: Box<dyn Updatable>) {
        self.queue.updatables.push(updatable);
    }
}
