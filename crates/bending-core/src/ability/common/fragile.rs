//! Block groups that share one health pool.
//!
//! A [`FragileStructure`] owns no blocks. Each member position carries a
//! back-reference to its structure in [`FragileStructures`], so damaging any
//! member finds and mutates the shared health. A position belongs to at most
//! one structure: registering it again moves it to the newer structure.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use bending_geometry::Ray;
use glam::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BlockPredicate;
use crate::context::WorldContext;
use crate::temporal::{TempBlock, TempEntity};
use crate::world::BlockPos;

/// Health given to structures that do not set one.
pub const DEFAULT_HEALTH: u32 = 10;

/// Identifier of a registered structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u64);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Structure({})", self.0)
    }
}

/// A set of blocks destroyed together.
#[derive(Clone)]
pub struct FragileStructure {
    id: StructureId,
    blocks: BTreeSet<BlockPos>,
    predicate: BlockPredicate,
    falling_blocks: bool,
    health: u32,
}

impl fmt::Debug for FragileStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragileStructure")
            .field("id", &self.id)
            .field("blocks", &self.blocks.len())
            .field("falling_blocks", &self.falling_blocks)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl FragileStructure {
    /// Start describing a structure. Blocks are only broken on destruction
    /// if `predicate` still accepts their state.
    #[must_use]
    pub fn builder(predicate: BlockPredicate) -> FragileStructureBuilder {
        FragileStructureBuilder {
            predicate,
            falling_blocks: false,
            health: DEFAULT_HEALTH,
        }
    }

    /// Structure ID.
    #[must_use]
    pub fn id(&self) -> StructureId {
        self.id
    }

    /// Remaining health.
    #[must_use]
    pub fn health(&self) -> u32 {
        self.health
    }

    /// Member positions.
    pub fn blocks(&self) -> impl Iterator<Item = BlockPos> + '_ {
        self.blocks.iter().copied()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if every member has been claimed by another structure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Builder for [`FragileStructure`].
#[derive(Clone)]
pub struct FragileStructureBuilder {
    predicate: BlockPredicate,
    falling_blocks: bool,
    health: u32,
}

impl fmt::Debug for FragileStructureBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragileStructureBuilder")
            .field("falling_blocks", &self.falling_blocks)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl FragileStructureBuilder {
    /// Starting health, at least 1.
    #[must_use]
    pub fn health(mut self, health: u32) -> Self {
        self.health = health.max(1);
        self
    }

    /// Throw falling-block debris when destroyed.
    #[must_use]
    pub fn falling_blocks(mut self, falling_blocks: bool) -> Self {
        self.falling_blocks = falling_blocks;
        self
    }

    /// Register a structure over `blocks`. Returns `None` if `blocks` is empty.
    pub fn build<I>(&self, world: &mut WorldContext, blocks: I) -> Option<StructureId>
    where
        I: IntoIterator<Item = BlockPos>,
    {
        world.structures.insert(self, blocks)
    }
}

/// Every fragile structure of one world, with the per-block back-references.
#[derive(Debug, Default)]
pub struct FragileStructures {
    next_id: u64,
    structures: BTreeMap<StructureId, FragileStructure>,
    members: HashMap<BlockPos, StructureId>,
}

impl FragileStructures {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert<I>(&mut self, builder: &FragileStructureBuilder, blocks: I) -> Option<StructureId>
    where
        I: IntoIterator<Item = BlockPos>,
    {
        let blocks: BTreeSet<BlockPos> = blocks.into_iter().collect();
        if blocks.is_empty() {
            return None;
        }
        self.next_id += 1;
        let id = StructureId(self.next_id);
        for &pos in &blocks {
            if let Some(previous) = self.members.insert(pos, id) {
                self.release(previous, pos);
            }
        }
        self.structures.insert(
            id,
            FragileStructure {
                id,
                blocks,
                predicate: builder.predicate.clone(),
                falling_blocks: builder.falling_blocks,
                health: builder.health,
            },
        );
        Some(id)
    }

    /// Drop `pos` from an older structure that lost it.
    fn release(&mut self, previous: StructureId, pos: BlockPos) {
        if let Some(structure) = self.structures.get_mut(&previous) {
            structure.blocks.remove(&pos);
            if structure.blocks.is_empty() {
                self.structures.remove(&previous);
            }
        }
    }

    /// Structure by ID.
    #[must_use]
    pub fn get(&self, id: StructureId) -> Option<&FragileStructure> {
        self.structures.get(&id)
    }

    /// Structure owning `pos`.
    #[must_use]
    pub fn at(&self, pos: BlockPos) -> Option<&FragileStructure> {
        self.members.get(&pos).and_then(|id| self.structures.get(id))
    }

    /// Whether `pos` is a member of any structure.
    #[must_use]
    pub fn is_member(&self, pos: BlockPos) -> bool {
        self.members.contains_key(&pos)
    }

    /// Unregister a structure and clear its back-references.
    pub fn remove(&mut self, id: StructureId) -> Option<FragileStructure> {
        let structure = self.structures.remove(&id)?;
        for pos in &structure.blocks {
            self.members.remove(pos);
        }
        Some(structure)
    }

    /// Apply `damage`. Returns the structure if it was destroyed.
    ///
    /// Health only drops while it stays above zero; a zero `damage` or a
    /// hit for at least the remaining health destroys the structure.
    fn damage(&mut self, id: StructureId, damage: u32) -> Option<FragileStructure> {
        let structure = self.structures.get_mut(&id)?;
        if damage > 0 && structure.health > damage {
            structure.health -= damage;
            return None;
        }
        self.remove(id)
    }

    /// Forget every structure.
    pub fn clear(&mut self) {
        self.structures.clear();
        self.members.clear();
    }

    /// Number of structures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Returns true if there are no structures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }
}

/// Damage the structure owning the first member among `blocks`.
pub(crate) fn try_damage(world: &mut WorldContext, blocks: &[BlockPos], damage: u32, ray: Ray) -> bool {
    let Some(id) = blocks
        .iter()
        .find_map(|pos| world.structures.members.get(pos).copied())
    else {
        return false;
    };
    if let Some(structure) = world.structures.damage(id, damage) {
        debug!(structure = %id, blocks = structure.len(), "fragile structure destroyed");
        shatter(world, &structure, ray);
    }
    true
}

fn shatter(world: &mut WorldContext, structure: &FragileStructure, ray: Ray) {
    let revert = world.earth_revert_millis;
    let target = ray.origin + ray.direction.normalize_or_zero() * 8.0;
    for pos in structure.blocks() {
        let state = world.host.block_state(pos);
        if !(structure.predicate)(state) {
            continue;
        }
        TempBlock::air().duration(revert).build(world, pos);
        if structure.falling_blocks {
            let aim = (target - pos.center()).normalize_or_zero() * 0.3;
            let velocity = gaussian_offset(&mut world.rng, aim, 0.05);
            TempEntity::falling_block(state)
                .velocity(velocity)
                .duration(5_000)
                .build_at(world, pos);
        }
    }
}

/// `base` jittered per axis by a normal distribution with deviation `sigma`.
fn gaussian_offset(rng: &mut ChaCha8Rng, base: Vec3, sigma: f32) -> Vec3 {
    let mut jitter = || rng.sample::<f32, _>(StandardNormal);
    base + Vec3::new(jitter(), jitter(), jitter()) * sigma
}
