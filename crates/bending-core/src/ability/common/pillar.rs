//! A column of earth pushed out of the ground one block at a time.

use std::fmt;

use bending_geometry::{Aabb, Collider};
use glam::Vec3;

use super::{predicate, BlockPredicate, Cadence};
use crate::ability::{Updatable, UpdateResult};
use crate::context::WorldContext;
use crate::temporal::TempBlock;
use crate::user::User;
use crate::world::{BlockPos, BlockState, Direction};

/// Default milliseconds between growth steps.
pub const DEFAULT_INTERVAL: u64 = 125;

/// How far the collider reaches past the pillar's tip.
const TIP_REACH: f32 = 0.65;

/// A rising pillar.
///
/// Each step shifts every block of the column one position in `direction`,
/// copying the solid type of the block behind it, and leaves air at the
/// base. The pillar stops when it has travelled `distance` blocks or the
/// next block is obstructed.
pub struct Pillar {
    origin: BlockPos,
    direction: Direction,
    length: i32,
    distance: i32,
    duration: u64,
    predicate: BlockPredicate,
    cadence: Cadence,
    current_distance: i32,
    blocks: Vec<BlockPos>,
}

impl fmt::Debug for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pillar")
            .field("origin", &self.origin)
            .field("direction", &self.direction)
            .field("length", &self.length)
            .field("distance", &self.distance)
            .field("current_distance", &self.current_distance)
            .finish_non_exhaustive()
    }
}

impl Pillar {
    /// Start describing a pillar growing out of `origin`.
    #[must_use]
    pub fn builder(origin: BlockPos) -> PillarBuilder {
        PillarBuilder {
            origin,
            direction: Direction::Up,
            interval: DEFAULT_INTERVAL,
            duration: None,
            predicate: predicate(|_| true),
        }
    }

    /// Block the pillar grows from.
    #[must_use]
    pub fn origin(&self) -> BlockPos {
        self.origin
    }

    /// Growth direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Column length in blocks.
    #[must_use]
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Blocks travelled so far.
    #[must_use]
    pub fn current_distance(&self) -> i32 {
        self.current_distance
    }

    /// Tip positions reached, in order.
    #[must_use]
    pub fn pillar_blocks(&self) -> &[BlockPos] {
        &self.blocks
    }

    /// Box around the moving column, reaching a little past the tip.
    #[must_use]
    pub fn collider(&self) -> Collider {
        let start = self.origin.offset(self.direction, self.current_distance + 1);
        let finish = start.offset(self.direction.opposite(), self.length - 1);
        let column = Aabb::block(start.corner()).union(&Aabb::block(finish.corner()));
        let reach = self.direction.as_vec3() * TIP_REACH;
        Collider::Aabb(Aabb {
            min: column.min + reach.min(Vec3::ZERO),
            max: column.max + reach.max(Vec3::ZERO),
        })
    }

    /// Shift the column so its tip is at `tip`.
    fn advance_to(&mut self, world: &mut WorldContext, tip: BlockPos) -> bool {
        let kind = world.host.block_type(tip);
        if kind.is_lava() || !(kind.is_transparent() || kind.is_water()) {
            return false;
        }
        let behind = self.direction.opposite();
        for i in 0..self.length {
            let forward = tip.offset(behind, i);
            let backward = forward.relative(behind);
            if !(self.predicate)(world.host.block_state(backward)) {
                TempBlock::air().duration(self.duration).build(world, forward);
                return false;
            }
            let solid = world
                .blocks
                .last_valid_type(world.host.as_ref(), backward)
                .solid_type();
            TempBlock::builder(BlockState::of(solid))
                .bendable(true)
                .duration(self.duration)
                .build(world, forward);
        }
        self.blocks.push(tip);
        TempBlock::air()
            .duration(self.duration)
            .build(world, tip.offset(behind, self.length));
        true
    }
}

impl Updatable for Pillar {
    fn update(&mut self, world: &mut WorldContext) -> UpdateResult {
        if self.current_distance >= self.distance {
            return UpdateResult::Remove;
        }
        if !self.cadence.ready(world.now_millis()) {
            return UpdateResult::Continue;
        }
        self.current_distance += 1;
        let tip = self.origin.offset(self.direction, self.current_distance);
        if self.advance_to(world, tip) {
            UpdateResult::Continue
        } else {
            UpdateResult::Remove
        }
    }
}

/// Builder for [`Pillar`].
#[derive(Clone)]
pub struct PillarBuilder {
    origin: BlockPos,
    direction: Direction,
    interval: u64,
    duration: Option<u64>,
    predicate: BlockPredicate,
}

impl fmt::Debug for PillarBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PillarBuilder")
            .field("origin", &self.origin)
            .field("direction", &self.direction)
            .field("interval", &self.interval)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl PillarBuilder {
    /// Growth direction (default up).
    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Milliseconds between growth steps.
    #[must_use]
    pub fn interval(mut self, millis: u64) -> Self {
        self.interval = millis;
        self
    }

    /// Lifetime of the moved blocks. Defaults to the world's earth revert time.
    #[must_use]
    pub fn duration(mut self, millis: u64) -> Self {
        self.duration = Some(millis);
        self
    }

    /// Which blocks may be part of the column.
    #[must_use]
    pub fn predicate(mut self, predicate: BlockPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Build a pillar that travels as far as it is long.
    #[must_use]
    pub fn build(&self, user: &User, world: &WorldContext, length: u32) -> Option<Pillar> {
        self.build_with_distance(user, world, length, length)
    }

    /// Build a pillar, shortened to what `user` may move.
    ///
    /// Returns `None` if not even one block can move or travel.
    #[must_use]
    pub fn build_with_distance(
        &self,
        user: &User,
        world: &WorldContext,
        length: u32,
        distance: u32,
    ) -> Option<Pillar> {
        let length = self.validate_length(user, world, clamp_i32(length));
        if length < 1 {
            return None;
        }
        let distance = self.validate_distance(user, clamp_i32(distance));
        if distance < 1 {
            return None;
        }
        Some(Pillar {
            origin: self.origin,
            direction: self.direction,
            length,
            distance: distance.min(length),
            duration: self.duration.unwrap_or(world.earth_revert_millis),
            predicate: self.predicate.clone(),
            cadence: Cadence::new(self.interval),
            current_distance: 0,
            blocks: Vec::with_capacity(usize::try_from(length).unwrap_or_default()),
        })
    }

    /// Number of blocks behind the origin (inclusive) that may move.
    fn validate_length(&self, user: &User, world: &WorldContext, max: i32) -> i32 {
        let behind = self.direction.opposite();
        (0..max)
            .find(|&i| {
                let pos = self.origin.offset(behind, i);
                !world.blocks.is_bendable(pos)
                    || !user.can_build(pos)
                    || !(self.predicate)(world.host.block_state(pos))
            })
            .unwrap_or(max)
    }

    /// Number of blocks ahead of the origin `user` may build in.
    fn validate_distance(&self, user: &User, max: i32) -> i32 {
        (0..max)
            .find(|&i| !user.can_build(self.origin.offset(self.direction, i + 1)))
            .unwrap_or(max)
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BendingConfig;
    use crate::tests::helpers::test_user;
    use crate::world::{BlockType, MemoryWorld};

    fn ground() -> WorldContext {
        let mut host = MemoryWorld::new("test");
        host.fill(
            BlockPos::new(-4, 60, -4),
            BlockPos::new(4, 64, 4),
            BlockState::of(BlockType::Dirt),
        );
        WorldContext::new(Box::new(host), &BendingConfig::default())
    }

    fn grow(pillar: &mut Pillar, world: &mut WorldContext) -> usize {
        let mut steps = 0;
        while pillar.update(world) == UpdateResult::Continue {
            world.advance();
            steps += 1;
            assert!(steps < 1_000, "pillar never stopped");
        }
        steps
    }

    #[test]
    fn rises_out_of_the_ground() {
        let mut world = ground();
        let user = test_user(1, "test");
        let origin = BlockPos::new(0, 64, 0);
        let mut pillar = Pillar::builder(origin).build(&user, &world, 3).unwrap();
        grow(&mut pillar, &mut world);

        assert_eq!(pillar.current_distance(), 3);
        for y in 65..=67 {
            assert_eq!(world.host().block_type(BlockPos::new(0, y, 0)), BlockType::Dirt);
            assert!(world.blocks().get(BlockPos::new(0, y, 0)).unwrap().is_bendable());
        }
        for y in 62..=64 {
            assert_eq!(world.host().block_type(BlockPos::new(0, y, 0)), BlockType::Air);
        }
        assert_eq!(pillar.pillar_blocks().len(), 3);
    }

    #[test]
    fn length_stops_at_rejected_blocks() {
        let world = ground();
        let user = test_user(1, "test");
        let pillar = Pillar::builder(BlockPos::new(0, 64, 0))
            .predicate(predicate(|state| state.kind.is_earth_bendable()))
            .build(&user, &world, 10)
            .unwrap();
        assert_eq!(pillar.length(), 5);
    }

    #[test]
    fn nothing_to_move_builds_nothing() {
        let world = ground();
        let user = test_user(1, "test");
        let air = BlockPos::new(0, 70, 0);
        let built = Pillar::builder(air)
            .predicate(predicate(|state| state.kind.is_earth_bendable()))
            .build(&user, &world, 3);
        assert!(built.is_none());
    }

    #[test]
    fn obstruction_stops_growth() {
        let mut world = ground();
        world
            .host_mut()
            .set_block_state(BlockPos::new(0, 66, 0), BlockState::of(BlockType::Stone));
        let user = test_user(1, "test");
        let mut pillar = Pillar::builder(BlockPos::new(0, 64, 0)).build(&user, &world, 3).unwrap();
        grow(&mut pillar, &mut world);
        assert_eq!(pillar.pillar_blocks().len(), 1);
        assert_eq!(world.host().block_type(BlockPos::new(0, 66, 0)), BlockType::Stone);
    }

    #[test]
    fn collider_reaches_past_the_tip() {
        let world = ground();
        let user = test_user(1, "test");
        let pillar = Pillar::builder(BlockPos::new(0, 64, 0))
            .build(&user, &world, 2)
            .unwrap();
        let Collider::Aabb(aabb) = pillar.collider() else {
            panic!("pillar collider is a box");
        };
        assert_eq!(aabb.min, Vec3::new(0.0, 64.0, 0.0));
        assert_eq!((aabb.max.x, aabb.max.z), (1.0, 1.0));
        assert!((aabb.max.y - 66.65).abs() < 1e-4);
    }

    #[test]
    fn interval_spaces_out_steps() {
        let mut world = ground();
        let user = test_user(1, "test");
        let mut pillar = Pillar::builder(BlockPos::new(0, 64, 0))
            .interval(500)
            .build(&user, &world, 2)
            .unwrap();
        let steps = grow(&mut pillar, &mut world);
        assert!(steps >= 10);
    }
}
