//! Temporary restrictions on what an entity may do.

use bitflags::bitflags;
use tracing::debug;

use super::{Clock, Revert, TemporalManager, Temporary};
use crate::context::WorldContext;
use crate::user::User;
use crate::world::{EntityId, World};

bitflags! {
    /// Actions an [`ActionLimiter`] can suppress.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ActionType: u8 {
        /// Walking (enforced by disabling AI on mobs)
        const MOVE = 1 << 0;
        /// Using items and blocks
        const INTERACT = 1 << 1;
        /// Activating abilities
        const ABILITY = 1 << 2;
    }
}

/// Suppresses a set of actions for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLimiter {
    entity: EntityId,
    limited: ActionType,
    previous_ai: Option<bool>,
    reverted: bool,
}

impl ActionLimiter {
    /// Builder limiting every action for 5 seconds.
    #[must_use]
    pub fn builder() -> ActionLimiterBuilder {
        ActionLimiterBuilder {
            limited: ActionType::all(),
            duration_millis: 5000,
        }
    }

    /// Limited entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Limited actions.
    #[must_use]
    pub fn limited(&self) -> ActionType {
        self.limited
    }
}

impl<'a> Temporary<dyn World + 'a> for ActionLimiter {
    fn revert(&mut self, world: &mut (dyn World + 'a), _clock: Clock) -> Revert {
        if self.reverted {
            return Revert::Noop;
        }
        self.reverted = true;
        if self.limited.contains(ActionType::MOVE) {
            world.set_entity_ai(self.entity, self.previous_ai);
        }
        Revert::Complete
    }
}

/// Describes an action limiter.
#[derive(Debug, Clone)]
pub struct ActionLimiterBuilder {
    limited: ActionType,
    duration_millis: u64,
}

impl ActionLimiterBuilder {
    /// Only limit `actions`.
    #[must_use]
    pub fn limit(mut self, actions: ActionType) -> Self {
        self.limited = actions;
        self
    }

    /// Lifetime in milliseconds.
    #[must_use]
    pub fn duration(mut self, millis: u64) -> Self {
        self.duration_millis = millis;
        self
    }

    /// Limit `target` on behalf of `source`.
    pub fn build<'w>(
        &self,
        world: &'w mut WorldContext,
        source: &User,
        target: EntityId,
    ) -> Option<&'w ActionLimiter> {
        let WorldContext { host, limiters, .. } = world;
        limiters.build(host.as_mut(), self, source, target)
    }
}

/// Every action limiter of one world.
#[derive(Debug)]
pub struct ActionLimiters {
    manager: TemporalManager<EntityId, ActionLimiter>,
}

impl ActionLimiters {
    /// Create an empty service.
    #[must_use]
    pub fn new(max_ticks: u32, tick_millis: u64) -> Self {
        Self {
            manager: TemporalManager::new("limiters", max_ticks, tick_millis),
        }
    }

    /// Start limiting `target`.
    ///
    /// Returns `None` if the target is already limited, the duration is zero
    /// or nothing would be limited.
    pub fn build(
        &mut self,
        world: &mut dyn World,
        builder: &ActionLimiterBuilder,
        source: &User,
        target: EntityId,
    ) -> Option<&ActionLimiter> {
        if builder.duration_millis == 0 || builder.limited.is_empty() || self.manager.is_temp(&target) {
            return None;
        }
        let previous_ai = if builder.limited.contains(ActionType::MOVE) {
            let previous = world.entity_ai(target);
            world.set_entity_ai(target, Some(false));
            previous
        } else {
            None
        };
        let ticks = self.manager.from_millis(builder.duration_millis);
        self.manager.add_entry(
            target,
            ActionLimiter {
                entity: target,
                limited: builder.limited,
                previous_ai,
                reverted: false,
            },
            ticks,
        );
        debug!(source = %source.id(), %target, actions = ?builder.limited, ticks, "limiting entity");
        self.manager.get(&target)
    }

    /// Whether `entity` is limited in any of `actions` (any action when `None`).
    #[must_use]
    pub fn is_limited(&self, entity: EntityId, actions: Option<ActionType>) -> bool {
        self.manager
            .get(&entity)
            .is_some_and(|l| actions.map_or(true, |a| l.limited.intersects(a)))
    }

    /// Expire due limiters.
    pub fn tick(&mut self, world: &mut dyn World) -> usize {
        self.manager.tick(world)
    }

    /// Lift the limiter on `entity` now.
    pub fn revert(&mut self, world: &mut dyn World, entity: EntityId) -> bool {
        self.manager.revert(&entity, world)
    }

    /// Lift every limiter.
    pub fn revert_all(&mut self, world: &mut dyn World) {
        self.manager.revert_all(world);
    }

    /// Number of live limiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manager.len()
    }

    /// Returns true if nothing is limited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manager.is_empty()
    }
}
