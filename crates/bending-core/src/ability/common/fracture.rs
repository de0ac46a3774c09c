//! Progressive cracking of a wall, bottom row first.

use std::collections::HashMap;

use bending_geometry::Ray;
use rand::Rng;

use super::{Cadence, FragileStructureBuilder};
use crate::ability::{Updatable, UpdateResult};
use crate::context::WorldContext;
use crate::temporal::TempBlock;
use crate::world::{BlockPos, BlockState, BlockType};

/// Crack stages shown before a block gives way.
const MAX_PROGRESS: u8 = 9;

/// Delay between the last block weakening and the structure collapsing.
const SETTLE_MILLIS: u64 = 200;

/// Cracks blocks row by row into magma, then optionally collapses them as a
/// fragile structure.
#[derive(Debug)]
pub struct Fracture {
    wall: Vec<BlockPos>,
    progress: HashMap<BlockPos, u8>,
    weakened: Vec<BlockPos>,
    fragile: Option<FragileStructureBuilder>,
    cadence: Option<Cadence>,
    collapse_at: Option<u64>,
}

impl Fracture {
    /// Start describing a fracture.
    #[must_use]
    pub fn builder() -> FractureBuilder {
        FractureBuilder::default()
    }

    /// Blocks still standing.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.wall.len()
    }

    /// Blocks already turned to magma.
    #[must_use]
    pub fn weakened(&self) -> &[BlockPos] {
        &self.weakened
    }

    /// Advance the crack on `pos`. Returns true once it gives way.
    fn crack(&mut self, world: &mut WorldContext, pos: BlockPos) -> bool {
        let progress = self.progress.entry(pos).or_insert(0);
        if *progress < MAX_PROGRESS {
            *progress += 1;
            world.host.send_block_damage(pos, *progress);
            return false;
        }
        true
    }
}

impl Updatable for Fracture {
    fn update(&mut self, world: &mut WorldContext) -> UpdateResult {
        let now = world.now_millis();
        if let Some(collapse_at) = self.collapse_at {
            if now < collapse_at {
                return UpdateResult::Continue;
            }
            world.try_damage_structure(&self.weakened, 0, Ray::ZERO);
            return UpdateResult::Remove;
        }
        if let Some(cadence) = self.cadence.as_mut() {
            if !cadence.ready(now) {
                return UpdateResult::Continue;
            }
        }

        let Some(lowest) = self.wall.first().map(|pos| pos.y()) else {
            return UpdateResult::Remove;
        };
        let mut index = 0;
        while index < self.wall.len() {
            let pos = self.wall[index];
            let reach = if world.rng.gen_bool(0.5) { lowest } else { lowest + 1 };
            if pos.y() <= reach && self.crack(world, pos) {
                self.wall.remove(index);
                self.progress.remove(&pos);
                TempBlock::builder(BlockState::of(BlockType::MagmaBlock)).build(world, pos);
                self.weakened.push(pos);
                continue;
            }
            if pos.y() > lowest + 1 {
                break;
            }
            index += 1;
        }

        if !self.wall.is_empty() {
            return UpdateResult::Continue;
        }
        let collapses = self
            .fragile
            .as_ref()
            .and_then(|builder| builder.build(world, self.weakened.iter().copied()))
            .is_some();
        if collapses {
            self.collapse_at = Some(now + SETTLE_MILLIS);
            UpdateResult::Continue
        } else {
            UpdateResult::Remove
        }
    }
}

/// Builder for [`Fracture`].
#[derive(Debug, Default)]
pub struct FractureBuilder {
    blocks: Vec<BlockPos>,
    fragile: Option<FragileStructureBuilder>,
    interval: u64,
}

impl FractureBuilder {
    /// Add blocks to crack.
    #[must_use]
    pub fn add(mut self, blocks: impl IntoIterator<Item = BlockPos>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    /// Minimum milliseconds between steps. Intervals no longer than a tick
    /// step every tick.
    #[must_use]
    pub fn interval(mut self, millis: u64) -> Self {
        self.interval = millis;
        self
    }

    /// Collapse the weakened blocks as a structure once every block cracked.
    #[must_use]
    pub fn fragile(mut self, builder: FragileStructureBuilder) -> Self {
        self.fragile = Some(builder);
        self
    }

    /// Build the effect. Returns `None` without blocks.
    #[must_use]
    pub fn build(self, tick_millis: u64) -> Option<Fracture> {
        if self.blocks.is_empty() {
            return None;
        }
        let mut wall = self.blocks;
        wall.sort();
        wall.dedup();
        Some(Fracture {
            wall,
            progress: HashMap::new(),
            weakened: Vec::new(),
            fragile: self.fragile,
            cadence: (self.interval > tick_millis).then(|| Cadence::new(self.interval)),
            collapse_at: None,
        })
    }
}
