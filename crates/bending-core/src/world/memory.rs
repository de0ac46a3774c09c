//! In-memory host world.

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::Vec3;

use super::{BlockPos, BlockState, Dimension, EntityId, World, WorldKey};

/// An entity tracked by [`MemoryWorld`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntity {
    /// Position
    pub position: Vec3,
    /// Velocity
    pub velocity: Vec3,
    /// Block carried by a falling-block entity
    pub block: Option<BlockState>,
    /// Whether gravity applies
    pub gravity: bool,
    /// AI flag (living entities only)
    pub ai: Option<bool>,
}

/// A [`World`] backed by hash maps.
///
/// Every block not explicitly set is air. Chunks are loaded unless
/// [`unload_chunk`](Self::unload_chunk) was called; [`World::load_chunk`]
/// requests are queued and complete on [`finish_chunk_loads`](Self::finish_chunk_loads).
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    key: WorldKey,
    dimension: Dimension,
    blocks: HashMap<BlockPos, BlockState>,
    unloaded: HashSet<(i32, i32)>,
    load_requests: HashSet<(i32, i32)>,
    tile_entities: HashSet<BlockPos>,
    light: HashMap<BlockPos, u8>,
    fake_blocks: HashMap<BlockPos, BlockState>,
    block_damage: HashMap<BlockPos, u8>,
    entities: BTreeMap<EntityId, MemoryEntity>,
    next_entity: u64,
}

impl MemoryWorld {
    /// Create an empty overworld.
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self {
            key: WorldKey::new(key),
            ..Self::default()
        }
    }

    /// Builder-style dimension override.
    #[must_use]
    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = dimension;
        self
    }

    /// Fill an inclusive box with `state`.
    pub fn fill(&mut self, min: BlockPos, max: BlockPos, state: BlockState) {
        for y in min.y()..=max.y() {
            for x in min.x()..=max.x() {
                for z in min.z()..=max.z() {
                    self.set_block_state(BlockPos::new(x, y, z), state);
                }
            }
        }
    }

    /// Mark `pos` as holding a tile entity.
    pub fn add_tile_entity(&mut self, pos: BlockPos) {
        self.tile_entities.insert(pos);
    }

    /// Set the real light level at `pos`.
    pub fn set_light_level(&mut self, pos: BlockPos, level: u8) {
        self.light.insert(pos, level);
    }

    /// Unload the chunk holding `pos`.
    pub fn unload_chunk(&mut self, pos: BlockPos) {
        self.unloaded.insert(pos.chunk());
    }

    /// Complete every pending chunk load request.
    pub fn finish_chunk_loads(&mut self) {
        for chunk in self.load_requests.drain() {
            self.unloaded.remove(&chunk);
        }
    }

    /// Number of pending chunk load requests.
    #[must_use]
    pub fn pending_chunk_loads(&self) -> usize {
        self.load_requests.len()
    }

    /// Spawn a living entity with the given AI flag.
    pub fn spawn_living(&mut self, position: Vec3, ai: Option<bool>) -> EntityId {
        self.insert_entity(MemoryEntity {
            position,
            velocity: Vec3::ZERO,
            block: None,
            gravity: true,
            ai,
        })
    }

    /// Entity by ID.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&MemoryEntity> {
        self.entities.get(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Fake block currently shown at `pos`, if any.
    #[must_use]
    pub fn fake_block(&self, pos: BlockPos) -> Option<BlockState> {
        self.fake_blocks.get(&pos).copied()
    }

    /// Last crack progress sent for `pos`.
    #[must_use]
    pub fn block_damage(&self, pos: BlockPos) -> Option<u8> {
        self.block_damage.get(&pos).copied()
    }

    fn insert_entity(&mut self, entity: MemoryEntity) -> EntityId {
        self.next_entity += 1;
        let id = EntityId::new(self.next_entity);
        self.entities.insert(id, entity);
        id
    }
}

impl World for MemoryWorld {
    fn key(&self) -> &WorldKey {
        &self.key
    }

    fn dimension(&self) -> Dimension {
        self.dimension
    }

    fn block_state(&self, pos: BlockPos) -> BlockState {
        self.blocks.get(&pos).copied().unwrap_or_default()
    }

    fn set_block_state(&mut self, pos: BlockPos, state: BlockState) {
        if state.kind.is_air() && state.waterlogged.is_none() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, state);
        }
    }

    fn is_chunk_loaded(&self, pos: BlockPos) -> bool {
        !self.unloaded.contains(&pos.chunk())
    }

    fn load_chunk(&mut self, pos: BlockPos) {
        if !self.is_chunk_loaded(pos) {
            self.load_requests.insert(pos.chunk());
        }
    }

    fn is_tile_entity(&self, pos: BlockPos) -> bool {
        self.tile_entities.contains(&pos)
    }

    fn light_level(&self, pos: BlockPos) -> u8 {
        self.light.get(&pos).copied().unwrap_or(0)
    }

    fn send_fake_block(&mut self, pos: BlockPos, state: Option<BlockState>) {
        match state {
            Some(state) => self.fake_blocks.insert(pos, state),
            None => self.fake_blocks.remove(&pos),
        };
    }

    fn send_block_damage(&mut self, pos: BlockPos, progress: u8) {
        self.block_damage.insert(pos, progress);
    }

    fn spawn_falling_block(
        &mut self,
        position: Vec3,
        state: BlockState,
        velocity: Vec3,
        gravity: bool,
    ) -> EntityId {
        self.insert_entity(MemoryEntity {
            position,
            velocity,
            block: Some(state),
            gravity,
            ai: None,
        })
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.entities.remove(&id);
    }

    fn entity_exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn entity_ai(&self, id: EntityId) -> Option<bool> {
        self.entities.get(&id).and_then(|e| e.ai)
    }

    fn set_entity_ai(&mut self, id: EntityId, enabled: Option<bool>) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.ai = enabled;
        }
    }
}
