//! Per-world mutable state shared by abilities and temporal services.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use bending_geometry::Ray;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::ability::common::{fragile, FragileStructures};
use crate::config::BendingConfig;
use crate::temporal::{ActionLimiters, TempBlocks, TempEntities, TempLights};
use crate::world::{BlockPos, EntityId, World, WorldKey};

/// Everything one world's tick mutates.
///
/// Fields are crate-visible so builders can borrow the host and a single
/// service at the same time.
pub struct WorldContext {
    pub(crate) host: Box<dyn World>,
    pub(crate) blocks: TempBlocks,
    pub(crate) entities: TempEntities,
    pub(crate) lights: TempLights,
    pub(crate) limiters: ActionLimiters,
    pub(crate) structures: FragileStructures,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) tick: u64,
    pub(crate) tick_millis: u64,
    pub(crate) earth_revert_millis: u64,
}

impl fmt::Debug for WorldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldContext")
            .field("world", self.host.key())
            .field("tick", &self.tick)
            .field("blocks", &self.blocks.len())
            .field("entities", &self.entities.len())
            .field("lights", &self.lights.len())
            .field("limiters", &self.limiters.len())
            .field("structures", &self.structures.len())
            .finish_non_exhaustive()
    }
}

impl WorldContext {
    /// Wrap `host` with empty temporal services sized by `config`.
    ///
    /// The random generator is seeded from the configured seed and the
    /// world key, so two worlds never share a stream.
    #[must_use]
    pub fn new(host: Box<dyn World>, config: &BendingConfig) -> Self {
        let temporal = &config.temporal;
        let tick_millis = config.tick_millis.max(1);
        let seed = config.seed ^ key_hash(host.key());
        Self {
            blocks: TempBlocks::new(temporal.max_block_ticks, tick_millis),
            entities: TempEntities::new(temporal.max_entity_ticks, tick_millis),
            lights: TempLights::new(
                temporal.max_light_ticks,
                tick_millis,
                config.light.enabled,
                config.light.rate,
                config.light.duration_millis,
            ),
            limiters: ActionLimiters::new(temporal.max_limiter_ticks, tick_millis),
            structures: FragileStructures::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            tick_millis,
            earth_revert_millis: temporal.earth_revert_millis,
            host,
        }
    }

    /// World key.
    #[must_use]
    pub fn key(&self) -> &WorldKey {
        self.host.key()
    }

    /// The host world.
    #[must_use]
    pub fn host(&self) -> &dyn World {
        self.host.as_ref()
    }

    /// The host world, mutably. Writes made here bypass temporary-block
    /// bookkeeping.
    pub fn host_mut(&mut self) -> &mut dyn World {
        self.host.as_mut()
    }

    /// Temporary blocks.
    #[must_use]
    pub fn blocks(&self) -> &TempBlocks {
        &self.blocks
    }

    /// Temporary entities.
    #[must_use]
    pub fn entities(&self) -> &TempEntities {
        &self.entities
    }

    /// Temporary lights.
    #[must_use]
    pub fn lights(&self) -> &TempLights {
        &self.lights
    }

    /// Action limiters.
    #[must_use]
    pub fn limiters(&self) -> &ActionLimiters {
        &self.limiters
    }

    /// Fragile structures.
    #[must_use]
    pub fn structures(&self) -> &FragileStructures {
        &self.structures
    }

    /// Deterministic per-world random generator.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Ticks advanced so far.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Milliseconds per tick.
    #[must_use]
    pub fn tick_millis(&self) -> u64 {
        self.tick_millis
    }

    /// World time in milliseconds, derived from the tick counter.
    #[must_use]
    pub fn now_millis(&self) -> u64 {
        self.tick * self.tick_millis
    }

    /// How long blocks broken by earth effects stay broken.
    #[must_use]
    pub fn earth_revert_millis(&self) -> u64 {
        self.earth_revert_millis
    }

    /// Advance every temporal service by one tick. Returns the number of
    /// entries that reverted or stepped.
    pub fn advance(&mut self) -> usize {
        self.tick += 1;
        let host = self.host.as_mut();
        self.blocks.tick(host)
            + self.entities.tick(host)
            + self.lights.tick(host)
            + self.limiters.tick(host)
    }

    /// Undo the top mutation of the temporary block at `pos`.
    pub fn revert_block(&mut self, pos: BlockPos) -> bool {
        self.blocks.revert(self.host.as_mut(), pos)
    }

    /// Remove a temporary entity now.
    pub fn revert_entity(&mut self, id: EntityId) -> bool {
        self.entities.revert(self.host.as_mut(), id)
    }

    /// Stop the temporary light at `pos` from fading.
    pub fn lock_light(&mut self, pos: BlockPos) -> bool {
        self.lights.lock(pos)
    }

    /// Let the temporary light at `pos` fade out now.
    pub fn unlock_and_revert_light(&mut self, pos: BlockPos) -> bool {
        self.lights.unlock_and_revert(self.host.as_mut(), pos)
    }

    /// Lift the action limiter on `entity`.
    pub fn revert_limiter(&mut self, entity: EntityId) -> bool {
        self.limiters.revert(self.host.as_mut(), entity)
    }

    /// Damage the fragile structure owning the first member among `blocks`.
    ///
    /// Returns true if a structure was found. A `damage` of zero destroys
    /// the structure outright; `ray` aims the falling debris.
    pub fn try_damage_structure(&mut self, blocks: &[BlockPos], damage: u32, ray: Ray) -> bool {
        fragile::try_damage(self, blocks, damage, ray)
    }

    /// Revert every temporary state and forget every structure.
    pub fn revert_all(&mut self) {
        let host = self.host.as_mut();
        self.limiters.revert_all(host);
        self.lights.revert_all(host);
        self.entities.revert_all(host);
        self.blocks.revert_all(host);
        self.structures.clear();
    }
}

fn key_hash(key: &WorldKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::TempBlock;
    use crate::world::{BlockState, BlockType, MemoryWorld};
    use rand::Rng;

    fn context(name: &str, seed: u64) -> WorldContext {
        let config = BendingConfig {
            seed,
            ..BendingConfig::default()
        };
        WorldContext::new(Box::new(MemoryWorld::new(name)), &config)
    }

    #[test]
    fn advance_moves_the_clock() {
        let mut world = context("world", 0);
        assert_eq!(world.now_millis(), 0);
        world.advance();
        world.advance();
        assert_eq!(world.tick(), 2);
        assert_eq!(world.now_millis(), 100);
    }

    #[test]
    fn advance_expires_temporary_blocks() {
        let mut world = context("world", 0);
        let pos = BlockPos::new(0, 64, 0);
        TempBlock::builder(BlockState::of(BlockType::Stone))
            .ticks(2)
            .build(&mut world, pos);
        assert_eq!(world.host().block_type(pos), BlockType::Stone);
        world.advance();
        world.advance();
        assert_eq!(world.host().block_type(pos), BlockType::Air);
        assert!(world.blocks().is_empty());
    }

    #[test]
    fn rng_depends_on_world_and_seed() {
        let a: u64 = context("a", 7).rng_mut().gen();
        let a_again: u64 = context("a", 7).rng_mut().gen();
        let b: u64 = context("b", 7).rng_mut().gen();
        let a_other_seed: u64 = context("a", 8).rng_mut().gen();
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_ne!(a, a_other_seed);
    }

    #[test]
    fn revert_all_restores_everything() {
        let mut world = context("world", 0);
        for x in 0..4 {
            TempBlock::ice().build(&mut world, BlockPos::new(x, 64, 0));
        }
        assert_eq!(world.blocks().len(), 4);
        world.revert_all();
        assert!(world.blocks().is_empty());
        assert_eq!(world.host().block_type(BlockPos::new(2, 64, 0)), BlockType::Air);
    }
}
