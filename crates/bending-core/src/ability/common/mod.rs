//! Reusable tick-driven building blocks for concrete abilities.
//!
//! Every primitive follows the same update contract:
//!
//! 1. Check termination first and stop without touching the world.
//! 2. Check the rate-limit deadline; if it has not passed, keep going
//!    without advancing.
//! 3. Do exactly one unit of work (one block of growth, movement or
//!    break progress), then set the next deadline.
//!
//! Deadlines are world time ([`WorldContext::now_millis`]), so primitives
//! behave the same at any tick length.
//!
//! [`WorldContext::now_millis`]: crate::context::WorldContext::now_millis

mod chain;
pub(crate) mod fragile;
mod fracture;
mod pillar;
mod spike;
mod travelling;

pub use chain::{State, StateChain, StateStep};
pub use fragile::{FragileStructure, FragileStructureBuilder, FragileStructures, StructureId};
pub use fracture::{Fracture, FractureBuilder};
pub use pillar::{Pillar, PillarBuilder};
pub use spike::{EarthSpike, EarthSpikeBuilder};
pub use travelling::TravellingSource;

use std::sync::Arc;

use crate::world::BlockState;

/// Shared block filter used by structures and pillars.
pub type BlockPredicate = Arc<dyn Fn(BlockState) -> bool + Send + Sync>;

/// Wrap a closure as a [`BlockPredicate`].
pub fn predicate<F>(f: F) -> BlockPredicate
where
    F: Fn(BlockState) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Rate limiter shared by the primitives: a deadline in world milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cadence {
    interval: u64,
    next: u64,
}

impl Cadence {
    pub(crate) fn new(interval: u64) -> Self {
        Self { interval, next: 0 }
    }

    /// Returns true, and moves the deadline, if work is due at `now`.
    pub(crate) fn ready(&mut self, now: u64) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.interval;
        true
    }
}
