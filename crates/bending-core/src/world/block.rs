//! Block materials and states.
//!
//! The core only needs a handful of semantic predicates about materials
//! (is it air, does it fall, can water flow into it). Host bindings map their
//! full block registries onto [`BlockType`], using [`BlockType::Other`] for
//! everything the core has no opinion about.

use serde::{Deserialize, Serialize};

/// Block material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockType {
    /// Regular air
    Air,
    /// Air generated in caves
    CaveAir,
    /// Air below the world
    VoidAir,
    /// Water (source or flowing, see [`BlockState::level`])
    Water,
    /// Lava
    Lava,
    /// Ice
    Ice,
    /// Packed ice
    PackedIce,
    /// Blue ice
    BlueIce,
    /// Snow layer
    Snow,
    /// Stone
    Stone,
    /// Cobblestone
    Cobblestone,
    /// Dirt
    Dirt,
    /// Grass block
    GrassBlock,
    /// Sand (falls)
    Sand,
    /// Red sand (falls)
    RedSand,
    /// Gravel (falls)
    Gravel,
    /// Sandstone
    Sandstone,
    /// Red sandstone
    RedSandstone,
    /// Fire
    Fire,
    /// Magma block
    MagmaBlock,
    /// Pointed dripstone
    PointedDripstone,
    /// Invisible light source block
    Light,
    /// Any other host material, identified by a host-defined id
    Other(u32),
}

impl BlockType {
    /// Air of any kind.
    #[must_use]
    pub const fn is_air(self) -> bool {
        matches!(self, Self::Air | Self::CaveAir | Self::VoidAir)
    }

    /// Water.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Water)
    }

    /// Lava.
    #[must_use]
    pub const fn is_lava(self) -> bool {
        matches!(self, Self::Lava)
    }

    /// Water or lava.
    #[must_use]
    pub const fn is_liquid(self) -> bool {
        matches!(self, Self::Water | Self::Lava)
    }

    /// Materials affected by gravity.
    #[must_use]
    pub const fn has_gravity(self) -> bool {
        matches!(self, Self::Sand | Self::RedSand | Self::Gravel)
    }

    /// Materials an entity or ability can pass through.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        self.is_air() || matches!(self, Self::Fire | Self::Light | Self::Snow)
    }

    /// Ice variants waterbenders can manipulate.
    #[must_use]
    pub const fn is_ice_bendable(self) -> bool {
        matches!(self, Self::Ice | Self::PackedIce | Self::BlueIce)
    }

    /// Materials earthbenders can manipulate.
    #[must_use]
    pub const fn is_earth_bendable(self) -> bool {
        matches!(
            self,
            Self::Stone
                | Self::Cobblestone
                | Self::Dirt
                | Self::GrassBlock
                | Self::Sand
                | Self::RedSand
                | Self::Gravel
                | Self::Sandstone
                | Self::RedSandstone
        )
    }

    /// Solid replacement for gravity-affected materials, so raised earth
    /// does not collapse under the physics engine.
    #[must_use]
    pub const fn solid_type(self) -> Self {
        match self {
            Self::Sand => Self::Sandstone,
            Self::RedSand => Self::RedSandstone,
            Self::Gravel => Self::Stone,
            other => other,
        }
    }

    /// Default state of this material.
    #[must_use]
    pub const fn default_state(self) -> BlockState {
        BlockState::of(self)
    }
}

/// A material plus the properties the core reads.
///
/// `level` is present for liquids and light blocks; `waterlogged` is present
/// for blocks that can hold water. Two states match when every field is equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    /// Material
    pub kind: BlockType,
    /// Liquid or light level
    pub level: Option<u8>,
    /// Waterlogged flag, for blocks that support it
    pub waterlogged: Option<bool>,
}

impl BlockState {
    /// Plain air.
    pub const AIR: Self = Self::of(BlockType::Air);

    /// Default state of `kind`: liquids are sources, nothing is waterlogged.
    #[must_use]
    pub const fn of(kind: BlockType) -> Self {
        let level = match kind {
            BlockType::Water | BlockType::Lava => Some(0),
            BlockType::Light => Some(15),
            _ => None,
        };
        Self {
            kind,
            level,
            waterlogged: None,
        }
    }

    /// Water with the given level (0 = source, 8+ = falling).
    #[must_use]
    pub const fn water(level: u8) -> Self {
        Self {
            kind: BlockType::Water,
            level: Some(level),
            waterlogged: None,
        }
    }

    /// Light block with the given level.
    #[must_use]
    pub const fn light(level: u8, waterlogged: bool) -> Self {
        Self {
            kind: BlockType::Light,
            level: Some(level),
            waterlogged: Some(waterlogged),
        }
    }

    /// A state that supports the waterlogged property.
    #[must_use]
    pub const fn waterloggable(kind: BlockType, waterlogged: bool) -> Self {
        Self {
            kind,
            level: None,
            waterlogged: Some(waterlogged),
        }
    }

    /// Same state with the waterlogged property changed, if present.
    #[must_use]
    pub const fn with_waterlogged(self, waterlogged: bool) -> Self {
        match self.waterlogged {
            Some(_) => Self {
                waterlogged: Some(waterlogged),
                ..self
            },
            None => self,
        }
    }

    /// Water source block.
    #[must_use]
    pub fn is_water_source(&self) -> bool {
        self.kind.is_water() && self.level.unwrap_or(0) == 0
    }

    /// Water, or a block holding water.
    #[must_use]
    pub fn contains_water(&self) -> bool {
        self.kind.is_water() || self.waterlogged == Some(true)
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::AIR
    }
}

impl From<BlockType> for BlockState {
    fn from(kind: BlockType) -> Self {
        Self::of(kind)
    }
}
