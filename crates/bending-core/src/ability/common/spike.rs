//! A dripstone spike growing out of an earth block.

use bending_geometry::{Aabb, Collider};

use super::Cadence;
use crate::ability::{Updatable, UpdateResult};
use crate::context::WorldContext;
use crate::temporal::TempBlock;
use crate::world::{BlockPos, BlockState, BlockType, Direction};

/// A spike that extends one block per step until it reaches its height.
#[derive(Debug)]
pub struct EarthSpike {
    base: BlockPos,
    direction: Direction,
    height: i32,
    placed: i32,
    duration: u64,
    cadence: Cadence,
}

impl EarthSpike {
    /// Start describing a spike rooted at `base`.
    #[must_use]
    pub fn builder(base: BlockPos) -> EarthSpikeBuilder {
        EarthSpikeBuilder {
            base,
            direction: Direction::Up,
            height: 3,
            interval: 70,
            duration: None,
        }
    }

    /// Target height.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Blocks grown so far.
    #[must_use]
    pub fn placed(&self) -> i32 {
        self.placed
    }

    /// Box around the grown part, or `None` before the first block.
    #[must_use]
    pub fn collider(&self) -> Option<Collider> {
        if self.placed == 0 {
            return None;
        }
        let first = self.base.relative(self.direction);
        let tip = self.base.offset(self.direction, self.placed);
        Some(Collider::Aabb(
            Aabb::block(first.corner()).union(&Aabb::block(tip.corner())),
        ))
    }
}

impl Updatable for EarthSpike {
    fn update(&mut self, world: &mut WorldContext) -> UpdateResult {
        if self.placed >= self.height {
            return UpdateResult::Remove;
        }
        if !self.cadence.ready(world.now_millis()) {
            return UpdateResult::Continue;
        }
        let next = self.base.offset(self.direction, self.placed + 1);
        if !world.host.block_type(next).is_transparent() {
            return UpdateResult::Remove;
        }
        TempBlock::builder(BlockState::of(BlockType::PointedDripstone))
            .duration(self.duration)
            .build(world, next);
        self.placed += 1;
        UpdateResult::Continue
    }
}

/// Builder for [`EarthSpike`].
#[derive(Debug, Clone)]
pub struct EarthSpikeBuilder {
    base: BlockPos,
    direction: Direction,
    height: u32,
    interval: u64,
    duration: Option<u64>,
}

impl EarthSpikeBuilder {
    /// Growth direction (default up).
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Blocks to grow.
    #[must_use]
    pub fn height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    /// Milliseconds between growth steps.
    #[must_use]
    pub fn interval(mut self, millis: u64) -> Self {
        self.interval = millis;
        self
    }

    /// Lifetime of the spike blocks. Defaults to the world's earth revert time.
    #[must_use]
    pub fn duration(mut self, millis: u64) -> Self {
        self.duration = Some(millis);
        self
    }

    /// Build the spike, capped at the free space in front of the base.
    ///
    /// Returns `None` if the base is not bendable earth or there is no room.
    #[must_use]
    pub fn build(&self, world: &WorldContext) -> Option<EarthSpike> {
        let base = world.host.block_type(self.base);
        if !base.is_earth_bendable() || !world.blocks.is_bendable(self.base) {
            return None;
        }
        let max = i32::try_from(self.height).unwrap_or(i32::MAX);
        let height = (1..=max)
            .find(|&i| !world.host.block_type(self.base.offset(self.direction, i)).is_transparent())
            .map_or(max, |blocked| blocked - 1);
        if height < 1 {
            return None;
        }
        Some(EarthSpike {
            base: self.base,
            direction: self.direction,
            height,
            placed: 0,
            duration: self.duration.unwrap_or(world.earth_revert_millis),
            cadence: Cadence::new(self.interval),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BendingConfig;
    use crate::world::{MemoryWorld, World};

    fn world() -> WorldContext {
        let mut host = MemoryWorld::new("world");
        host.set_block_state(BlockPos::new(0, 64, 0), BlockState::of(BlockType::Stone));
        host.set_block_state(BlockPos::new(0, 68, 0), BlockState::of(BlockType::Stone));
        host.set_block_state(BlockPos::new(5, 64, 0), BlockState::of(BlockType::Water));
        WorldContext::new(Box::new(host), &BendingConfig::default())
    }

    #[test]
    fn grows_one_block_per_step() {
        let mut world = world();
        let mut spike = EarthSpike::builder(BlockPos::new(0, 64, 0)).build(&world).unwrap();
        assert!(spike.collider().is_none());

        assert_eq!(spike.update(&mut world), UpdateResult::Continue);
        assert_eq!(spike.placed(), 1);
        // Not due yet
        world.advance();
        assert_eq!(spike.update(&mut world), UpdateResult::Continue);
        assert_eq!(spike.placed(), 1);

        while spike.update(&mut world) == UpdateResult::Continue {
            world.advance();
        }
        assert_eq!(spike.placed(), 3);
        for y in 65..=67 {
            assert_eq!(
                world.host().block_type(BlockPos::new(0, y, 0)),
                BlockType::PointedDripstone
            );
        }
        assert!(spike.collider().is_some());
    }

    #[test]
    fn height_is_capped_by_obstruction() {
        let world = world();
        let spike = EarthSpike::builder(BlockPos::new(0, 64, 0))
            .height(10)
            .build(&world)
            .unwrap();
        assert_eq!(spike.height(), 3);
    }

    #[test]
    fn needs_an_earth_base() {
        let world = world();
        assert!(EarthSpike::builder(BlockPos::new(5, 64, 0)).build(&world).is_none());
        assert!(EarthSpike::builder(BlockPos::new(9, 64, 0)).build(&world).is_none());
    }

    #[test]
    fn stops_when_blocked_mid_growth() {
        let mut world = world();
        let mut spike = EarthSpike::builder(BlockPos::new(0, 64, 0)).build(&world).unwrap();
        world
            .host_mut()
            .set_block_state(BlockPos::new(0, 66, 0), BlockState::of(BlockType::Dirt));
        while spike.update(&mut world) == UpdateResult::Continue {
            world.advance();
        }
        assert_eq!(spike.placed(), 1);
    }
}
