//! A source block that travels toward its owner.

use super::{Cadence, State, StateStep};
use crate::ability::AbilityContext;
use crate::context::WorldContext;
use crate::temporal::TempBlock;
use crate::world::{BlockPos, BlockState, Direction};

/// Default milliseconds between moves.
pub const DEFAULT_INTERVAL: u64 = 50;

/// Moves the last stored block toward the user one block at a time.
///
/// The source block is cleared to air when it starts moving; the travelling
/// block is a non-bendable temporary block. Completes once within
/// `min_distance` of the user, leaving the final position in the store, and
/// fails when the user gets further than `max_distance` away or the path is
/// blocked both ahead and above.
#[derive(Debug)]
pub struct TravellingSource {
    state: BlockState,
    min_distance: f32,
    max_distance: f32,
    cadence: Cadence,
    origin: Option<BlockPos>,
    current: Option<BlockPos>,
    placed: bool,
}

impl TravellingSource {
    /// Create a source that travels as `state`.
    #[must_use]
    pub fn new(state: BlockState, min_distance: f32, max_distance: f32) -> Self {
        Self {
            state,
            min_distance,
            max_distance,
            cadence: Cadence::new(DEFAULT_INTERVAL),
            origin: None,
            current: None,
            placed: false,
        }
    }

    /// Milliseconds between moves.
    #[must_use]
    pub fn interval(mut self, millis: u64) -> Self {
        self.cadence = Cadence::new(millis);
        self
    }

    /// Current position of the travelling block.
    #[must_use]
    pub fn position(&self) -> Option<BlockPos> {
        self.current
    }

    fn passable(world: &WorldContext, pos: BlockPos) -> bool {
        let kind = world.host.block_type(pos);
        (kind.is_transparent() || kind.is_water())
            && !world.host.is_tile_entity(pos)
            && world.blocks.is_bendable(pos)
    }

    /// Undo whatever the travelling block left at `pos`.
    fn leave(&mut self, world: &mut WorldContext, pos: BlockPos) {
        if self.origin == Some(pos) {
            self.origin = None;
            TempBlock::air().build(world, pos);
        } else if self.placed {
            world.revert_block(pos);
        }
        self.placed = false;
    }
}

impl State for TravellingSource {
    fn start(&mut self, store: &mut Vec<BlockPos>) -> bool {
        let Some(source) = store.pop() else {
            return false;
        };
        store.clear();
        self.origin = Some(source);
        self.current = Some(source);
        true
    }

    fn update(&mut self, ctx: &mut AbilityContext<'_>, store: &mut Vec<BlockPos>) -> StateStep {
        let Some(current) = self.current else {
            return StateStep::Fail;
        };
        let target = ctx.user().location();
        let distance = current.center().distance(target);
        if distance > self.max_distance {
            return StateStep::Fail;
        }
        if distance < self.min_distance {
            store.push(current);
            return StateStep::Complete;
        }
        let world = ctx.world();
        if !self.cadence.ready(world.now_millis()) {
            return StateStep::Continue;
        }

        let ahead = current.relative(Direction::dominant(target - current.center()));
        let next = if Self::passable(world, ahead) {
            ahead
        } else if Self::passable(world, current.above()) {
            current.above()
        } else {
            return StateStep::Fail;
        };
        self.leave(world, current);
        self.placed = TempBlock::builder(self.state)
            .bendable(false)
            .build(world, next)
            .is_some();
        self.current = Some(next);
        StateStep::Continue
    }

    fn abort(&mut self, world: &mut WorldContext) {
        if let Some(current) = self.current.take() {
            if self.placed {
                world.revert_block(current);
                self.placed = false;
            }
        }
    }
}
