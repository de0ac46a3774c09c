//! World model: positions, identifiers and the host boundary.
//!
//! # Architecture
//!
//! The engine never talks to a game server directly. Everything it needs from
//! the host goes through the narrow [`World`] trait: read and write block
//! states, spawn and remove entities, toggle entity AI and send client-side
//! fake blocks. [`MemoryWorld`] implements it over plain maps and is what the
//! test suite and benchmarks run against.

mod block;
mod memory;

pub use block::{BlockState, BlockType};
pub use memory::{MemoryEntity, MemoryWorld};

use std::fmt;
use std::sync::Arc;

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a world (dimension instance) hosted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldKey(Arc<str>);

impl WorldKey {
    /// Create a new world key.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for WorldKey {
    fn default() -> Self {
        Self::new("world")
    }
}

impl From<&str> for WorldKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Host entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create a new entity ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw ID.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// World environment. Affects a few material rules (ice melts faster in the Nether).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dimension {
    /// Surface world
    #[default]
    Overworld,
    /// Nether
    Nether,
    /// The End
    End,
}

// ============================================================================
// Positions
// ============================================================================

/// One of the six block faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +Y
    Up,
    /// -Y
    Down,
    /// -Z
    North,
    /// +Z
    South,
    /// +X
    East,
    /// -X
    West,
}

impl Direction {
    /// All six faces.
    pub const ALL: [Self; 6] = [
        Self::Up,
        Self::Down,
        Self::North,
        Self::South,
        Self::East,
        Self::West,
    ];

    /// The four horizontal faces.
    pub const HORIZONTAL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Unit offset of this face.
    #[must_use]
    pub const fn offset(self) -> IVec3 {
        match self {
            Self::Up => IVec3::new(0, 1, 0),
            Self::Down => IVec3::new(0, -1, 0),
            Self::North => IVec3::new(0, 0, -1),
            Self::South => IVec3::new(0, 0, 1),
            Self::East => IVec3::new(1, 0, 0),
            Self::West => IVec3::new(-1, 0, 0),
        }
    }

    /// Opposite face.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Unit vector of this face.
    #[must_use]
    pub fn as_vec3(self) -> Vec3 {
        self.offset().as_vec3()
    }

    /// Face whose axis best matches `v` (the largest absolute component wins).
    #[must_use]
    pub fn dominant(v: Vec3) -> Self {
        let abs = v.abs();
        if abs.x >= abs.y && abs.x >= abs.z {
            if v.x >= 0.0 {
                Self::East
            } else {
                Self::West
            }
        } else if abs.y >= abs.z {
            if v.y >= 0.0 {
                Self::Up
            } else {
                Self::Down
            }
        } else if v.z >= 0.0 {
            Self::South
        } else {
            Self::North
        }
    }
}

/// Integer block coordinates.
///
/// Ordered by `(y, x, z)` so sorted collections walk bottom-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos(pub IVec3);

impl Ord for BlockPos {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0.y, self.0.x, self.0.z).cmp(&(other.0.y, other.0.x, other.0.z))
    }
}

impl PartialOrd for BlockPos {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl BlockPos {
    /// Create a new block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    /// Block containing a world-space point.
    #[must_use]
    pub fn containing(point: Vec3) -> Self {
        Self(point.floor().as_ivec3())
    }

    /// X coordinate.
    #[must_use]
    pub const fn x(self) -> i32 {
        self.0.x
    }

    /// Y coordinate.
    #[must_use]
    pub const fn y(self) -> i32 {
        self.0.y
    }

    /// Z coordinate.
    #[must_use]
    pub const fn z(self) -> i32 {
        self.0.z
    }

    /// Block `distance` steps along `direction` (negative steps go backwards).
    #[must_use]
    pub fn offset(self, direction: Direction, distance: i32) -> Self {
        Self(self.0 + direction.offset() * distance)
    }

    /// Adjacent block across `direction`.
    #[must_use]
    pub fn relative(self, direction: Direction) -> Self {
        self.offset(direction, 1)
    }

    /// Block directly above.
    #[must_use]
    pub fn above(self) -> Self {
        self.relative(Direction::Up)
    }

    /// Block directly below.
    #[must_use]
    pub fn below(self) -> Self {
        self.relative(Direction::Down)
    }

    /// Minimum corner in world space.
    #[must_use]
    pub fn corner(self) -> Vec3 {
        self.0.as_vec3()
    }

    /// Center in world space.
    #[must_use]
    pub fn center(self) -> Vec3 {
        self.corner() + Vec3::splat(0.5)
    }

    /// Chunk column `(x >> 4, z >> 4)` containing this block.
    #[must_use]
    pub const fn chunk(self) -> (i32, i32) {
        (self.0.x >> 4, self.0.z >> 4)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0.x, self.0.y, self.0.z)
    }
}

impl From<IVec3> for BlockPos {
    fn from(v: IVec3) -> Self {
        Self(v)
    }
}

// ============================================================================
// Host boundary
// ============================================================================

/// The host world as seen by the engine.
///
/// Implementations must be `Send`: world instances are updated in parallel,
/// each on a single thread at a time.
pub trait World: Send {
    /// Key of this world.
    fn key(&self) -> &WorldKey;

    /// Environment of this world.
    fn dimension(&self) -> Dimension {
        Dimension::Overworld
    }

    /// Current state at `pos`.
    fn block_state(&self, pos: BlockPos) -> BlockState;

    /// Replace the state at `pos` without triggering physics.
    fn set_block_state(&mut self, pos: BlockPos, state: BlockState);

    /// Whether the chunk holding `pos` is loaded and writable.
    fn is_chunk_loaded(&self, _pos: BlockPos) -> bool {
        true
    }

    /// Request an asynchronous load of the chunk holding `pos`.
    fn load_chunk(&mut self, _pos: BlockPos) {}

    /// Whether `pos` holds a block with attached host data (chests, signs).
    fn is_tile_entity(&self, _pos: BlockPos) -> bool {
        false
    }

    /// Real light level at `pos`, 0..=15.
    fn light_level(&self, _pos: BlockPos) -> u8 {
        0
    }

    /// Show `state` at `pos` to clients without changing the world.
    /// `None` resends the real block.
    fn send_fake_block(&mut self, pos: BlockPos, state: Option<BlockState>);

    /// Show crack progress (0..=9) on the block at `pos`.
    fn send_block_damage(&mut self, _pos: BlockPos, _progress: u8) {}

    /// Spawn a falling-block entity and return its ID.
    fn spawn_falling_block(
        &mut self,
        position: Vec3,
        state: BlockState,
        velocity: Vec3,
        gravity: bool,
    ) -> EntityId;

    /// Remove an entity. Unknown IDs are ignored.
    fn remove_entity(&mut self, id: EntityId);

    /// Whether the entity is still present.
    fn entity_exists(&self, id: EntityId) -> bool;

    /// AI flag of a living entity: `None` if unset or the entity is unknown.
    fn entity_ai(&self, id: EntityId) -> Option<bool>;

    /// Set (or unset, with `None`) the AI flag of a living entity.
    fn set_entity_ai(&mut self, id: EntityId, enabled: Option<bool>);

    /// Block type at `pos`.
    fn block_type(&self, pos: BlockPos) -> BlockType {
        self.block_state(pos).kind
    }
}
