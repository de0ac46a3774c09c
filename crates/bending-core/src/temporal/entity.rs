//! Temporary entities (falling blocks thrown by abilities).

use glam::Vec3;

use super::{Clock, Revert, TemporalManager, Temporary};
use crate::context::WorldContext;
use crate::world::{BlockPos, BlockState, EntityId, World};

/// An entity removed when its lifetime ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempEntity {
    id: EntityId,
    reverted: bool,
}

impl TempEntity {
    /// Builder for a falling block carrying `state`.
    #[must_use]
    pub fn falling_block(state: BlockState) -> FallingBlockBuilder {
        FallingBlockBuilder {
            state,
            velocity: Vec3::ZERO,
            gravity: true,
            duration_millis: 30_000,
        }
    }

    /// Host entity ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }
}

impl<'a> Temporary<dyn World + 'a> for TempEntity {
    fn revert(&mut self, world: &mut (dyn World + 'a), _clock: Clock) -> Revert {
        if self.reverted {
            return Revert::Noop;
        }
        self.reverted = true;
        world.remove_entity(self.id);
        Revert::Complete
    }
}

/// Describes a falling block entity.
#[derive(Debug, Clone)]
pub struct FallingBlockBuilder {
    state: BlockState,
    velocity: Vec3,
    gravity: bool,
    duration_millis: u64,
}

impl FallingBlockBuilder {
    /// Initial velocity.
    #[must_use]
    pub fn velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Whether the entity falls.
    #[must_use]
    pub fn gravity(mut self, gravity: bool) -> Self {
        self.gravity = gravity;
        self
    }

    /// Lifetime in milliseconds.
    #[must_use]
    pub fn duration(mut self, millis: u64) -> Self {
        self.duration_millis = millis;
        self
    }

    /// Spawn at `position` in `world`.
    pub fn build(&self, world: &mut WorldContext, position: Vec3) -> EntityId {
        let WorldContext { host, entities, .. } = world;
        entities.spawn(host.as_mut(), self, position)
    }

    /// Spawn centered on the bottom face of `pos`.
    pub fn build_at(&self, world: &mut WorldContext, pos: BlockPos) -> EntityId {
        self.build(world, pos.corner() + Vec3::new(0.5, 0.0, 0.5))
    }
}

/// Every temporary entity of one world.
#[derive(Debug)]
pub struct TempEntities {
    manager: TemporalManager<EntityId, TempEntity>,
}

impl TempEntities {
    /// Create an empty service.
    #[must_use]
    pub fn new(max_ticks: u32, tick_millis: u64) -> Self {
        Self {
            manager: TemporalManager::new("entities", max_ticks, tick_millis),
        }
    }

    /// Spawn the entity described by `builder` and track it.
    pub fn spawn(
        &mut self,
        world: &mut dyn World,
        builder: &FallingBlockBuilder,
        position: Vec3,
    ) -> EntityId {
        let id = world.spawn_falling_block(position, builder.state, builder.velocity, builder.gravity);
        let ticks = self.manager.from_millis(builder.duration_millis);
        self.manager.add_entry(
            id,
            TempEntity {
                id,
                reverted: false,
            },
            ticks,
        );
        id
    }

    /// Remove entities whose lifetime ended.
    pub fn tick(&mut self, world: &mut dyn World) -> usize {
        self.manager.tick(world)
    }

    /// Remove `id` now.
    pub fn revert(&mut self, world: &mut dyn World, id: EntityId) -> bool {
        self.manager.revert(&id, world)
    }

    /// Remove every temporary entity.
    pub fn revert_all(&mut self, world: &mut dyn World) {
        self.manager.revert_all(world);
    }

    /// Whether `id` is a temporary entity.
    #[must_use]
    pub fn is_temp(&self, id: EntityId) -> bool {
        self.manager.is_temp(&id)
    }

    /// Number of live temporary entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manager.len()
    }

    /// Returns true if no entity is temporary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manager.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{BlockType, MemoryWorld};

    #[test]
    fn entity_is_removed_after_its_lifetime() {
        let mut world = MemoryWorld::new("test");
        let mut entities = TempEntities::new(600, 50);
        let builder = TempEntity::falling_block(BlockState::of(BlockType::Dirt))
            .velocity(Vec3::Y)
            .duration(100);
        let id = entities.spawn(&mut world, &builder, Vec3::ZERO);
        assert!(world.entity_exists(id));
        assert_eq!(world.entity(id).map(|e| e.velocity), Some(Vec3::Y));

        entities.tick(&mut world);
        assert!(world.entity_exists(id));
        entities.tick(&mut world);
        assert!(!world.entity_exists(id));
        assert!(entities.is_empty());
    }

    #[test]
    fn early_revert_removes_once() {
        let mut world = MemoryWorld::new("test");
        let mut entities = TempEntities::new(600, 50);
        let builder = TempEntity::falling_block(BlockState::of(BlockType::Sand));
        let id = entities.spawn(&mut world, &builder, Vec3::ZERO);
        assert!(entities.revert(&mut world, id));
        assert!(!entities.revert(&mut world, id));
        assert_eq!(world.entity_count(), 0);
    }
}
