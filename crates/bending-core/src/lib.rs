//! # Bending Core
//!
//! Tick-driven ability engine for elemental bending.
//!
//! This crate holds everything that does not depend on a particular game
//! server: the lifecycle of live abilities, collisions between them, combo
//! input, and the temporary, reversible world mutations abilities leave
//! behind. A host binding implements [`world::World`] and
//! [`user::UserCapabilities`] and drives a [`Game`].
//!
//! ## Architecture
//!
//! - **Temporal**: [`temporal::TemporalManager`] schedules reverts by tick;
//!   temp blocks, falling-block entities, lights and action limiters build
//!   on it
//! - **Abilities**: [`ability::AbilityManager`] owns live instances per world
//!   and updates them every tick; [`ability::common`] holds reusable
//!   building blocks (pillars, fractures, fragile structures)
//! - **Collisions**: [`collision::CollisionManager`] tests registered ability
//!   pairs with the broad phase from `bending-geometry`
//! - **Sequences**: [`sequence::SequenceManager`] matches combo input
//!
//! Each world ticks on its own and in a fixed order, so a world replays
//! identically from the same seed and input.
//!
//! ## Usage
//!
//! ```
//! use bending_core::world::{BlockPos, BlockState, BlockType, MemoryWorld};
//! use bending_core::temporal::TempBlock;
//! use bending_core::{BendingConfig, Game, WorldKey};
//!
//! let mut game = Game::new(BendingConfig::default()).unwrap();
//! game.add_world(Box::new(MemoryWorld::new("overworld"))).unwrap();
//!
//! let world = game.world_mut(&WorldKey::new("overworld")).unwrap();
//! let pos = BlockPos::new(0, 64, 0);
//! TempBlock::builder(BlockState::of(BlockType::Ice))
//!     .duration(100)
//!     .build(world.context_mut(), pos);
//! assert_eq!(world.context().host().block_type(pos), BlockType::Ice);
//!
//! game.tick();
//! game.tick();
//! let world = game.world(&WorldKey::new("overworld")).unwrap();
//! assert_eq!(world.context().host().block_type(pos), BlockType::Air);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ability;
pub mod collision;
pub mod config;
pub mod context;
pub mod error;
pub mod game;
pub mod sequence;
pub mod temporal;
pub mod user;
pub mod world;
pub mod world_manager;

pub use ability::{AbilityDescription, AbilityId, AbilityKey, Activation};
pub use config::BendingConfig;
pub use context::WorldContext;
pub use error::{AbilityError, BendingError, Result};
pub use game::{Game, Registries};
pub use user::{User, UserId};
pub use world::{BlockPos, World, WorldKey};
pub use world_manager::{WorldInstance, WorldManager};

#[cfg(test)]
mod tests;
