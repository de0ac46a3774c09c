//! Temporary block states.
//!
//! Every position keeps a stack of frames. A frame records the block state
//! that was present *before* one mutation, the flags of that mutation and when
//! it expires. Reverting pops frames from the top; once only the first frame
//! is left the block returns to the state it had before any temporary change.

use std::collections::HashSet;

use tracing::debug;

use super::{Clock, Revert, TemporalManager, Temporary};
use crate::ability::AbilityKey;
use crate::context::WorldContext;
use crate::user::UserId;
use crate::world::{BlockPos, BlockState, BlockType, Dimension, Direction, World};

/// Who placed a temporary block, for kill attribution (fire, magma).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DamageSource {
    /// Owner of the ability
    pub user: UserId,
    /// Ability that placed the block
    pub ability: AbilityKey,
}

/// A block state plus the flags of the mutation it belongs to.
///
/// Stack frames record the state from before their mutation;
/// [`TempBlocks::snapshot`] records the live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    state: BlockState,
    bendable: bool,
    weak: bool,
    source: Option<DamageSource>,
}

impl Snapshot {
    /// Recorded block state.
    #[must_use]
    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Whether the mutated block may be bent by other abilities.
    #[must_use]
    pub fn bendable(&self) -> bool {
        self.bendable
    }

    /// Whether the mutation may be overwritten in place.
    #[must_use]
    pub fn weak(&self) -> bool {
        self.weak
    }

    /// Attribution of the mutation.
    #[must_use]
    pub fn source(&self) -> Option<&DamageSource> {
        self.source.as_ref()
    }
}

#[derive(Debug, Clone)]
struct Frame {
    snapshot: Snapshot,
    expires_at: u64,
}

/// Revert context for [`TempBlock`]: the host world plus the service's
/// bookkeeping that reverts have to keep in sync.
pub struct BlockHost<'a> {
    world: &'a mut dyn World,
    gravity: &'a mut HashSet<BlockPos>,
    deferred: &'a mut Vec<(BlockPos, BlockState)>,
}

impl BlockHost<'_> {
    /// Write `state`, or queue it if the chunk is not loaded.
    fn apply(&mut self, pos: BlockPos, state: BlockState) {
        if self.world.is_chunk_loaded(pos) {
            self.world.set_block_state(pos, state);
            if state.kind.has_gravity() {
                self.gravity.insert(pos);
            } else {
                self.gravity.remove(&pos);
            }
        } else {
            self.world.load_chunk(pos);
            self.deferred.retain(|(queued, _)| *queued != pos);
            self.deferred.push((pos, state));
            debug!(%pos, ?state.kind, "deferred block write until chunk loads");
        }
    }
}

/// A temporarily mutated block.
#[derive(Debug, Clone)]
pub struct TempBlock {
    pos: BlockPos,
    frames: Vec<Frame>,
    current: Snapshot,
    reverted: bool,
}

impl TempBlock {
    fn new(pos: BlockPos, before: BlockState) -> Self {
        Self {
            pos,
            frames: Vec::new(),
            current: Snapshot {
                state: before,
                bendable: false,
                weak: false,
                source: None,
            },
            reverted: false,
        }
    }

    /// Builder for an arbitrary state.
    #[must_use]
    pub fn builder(state: BlockState) -> TempBlockBuilder {
        TempBlockBuilder::new(state)
    }

    /// Builder for bendable air.
    #[must_use]
    pub fn air() -> TempBlockBuilder {
        TempBlockBuilder::new(BlockState::AIR).bendable(true)
    }

    /// Builder for a water source.
    #[must_use]
    pub fn water() -> TempBlockBuilder {
        TempBlockBuilder::new(BlockState::of(BlockType::Water))
    }

    /// Builder for bendable ice.
    #[must_use]
    pub fn ice() -> TempBlockBuilder {
        TempBlockBuilder::new(BlockState::of(BlockType::Ice)).bendable(true)
    }

    /// Builder for bendable fire.
    #[must_use]
    pub fn fire() -> TempBlockBuilder {
        TempBlockBuilder::new(BlockState::of(BlockType::Fire)).bendable(true)
    }

    /// Position of the block.
    #[must_use]
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    /// Flags of the live mutation.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.current
    }

    /// Whether other abilities may bend this block.
    #[must_use]
    pub fn is_bendable(&self) -> bool {
        self.current.bendable
    }

    /// Whether the live mutation may be overwritten in place.
    #[must_use]
    pub fn is_weak(&self) -> bool {
        self.current.weak
    }

    /// Attribution of the live mutation.
    #[must_use]
    pub fn damage_source(&self) -> Option<&DamageSource> {
        self.current.source.as_ref()
    }

    /// State the block had before any temporary change.
    #[must_use]
    pub fn original_state(&self) -> Option<BlockState> {
        self.frames.first().map(|f| f.snapshot.state)
    }

    /// Number of stacked mutations.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether the block has been fully reverted.
    #[must_use]
    pub fn is_reverted(&self) -> bool {
        self.reverted
    }

    /// Push a mutation and write `state`.
    fn add_state(
        &mut self,
        host: &mut BlockHost<'_>,
        state: BlockState,
        expires_at: u64,
        builder: &TempBlockBuilder,
        now: u64,
    ) {
        self.clean_states(now);
        if self.frames.is_empty() || !self.current.weak {
            let snapshot = Snapshot {
                state: host.world.block_state(self.pos),
                bendable: builder.bendable,
                weak: builder.weak,
                source: builder.source.clone(),
            };
            self.frames.push(Frame {
                snapshot: snapshot.clone(),
                expires_at,
            });
            self.current = snapshot;
        } else {
            self.current.weak = builder.weak;
            if let Some(top) = self.frames.last_mut() {
                top.snapshot.weak = builder.weak;
                top.expires_at = top.expires_at.max(expires_at);
            }
        }
        host.apply(self.pos, state);
    }

    /// Drop expired frames above the first one.
    fn clean_states(&mut self, now: u64) {
        let mut index = 0;
        self.frames.retain(|frame| {
            index += 1;
            index == 1 || frame.expires_at >= now
        });
    }

    fn revert_fully(&mut self, host: &mut BlockHost<'_>) {
        if self.reverted {
            return;
        }
        self.reverted = true;
        if let Some(first) = self.frames.first() {
            let original = first.snapshot.state;
            host.apply(self.pos, original);
        }
        self.frames.clear();
        host.gravity.remove(&self.pos);
    }
}

impl Temporary<BlockHost<'_>> for TempBlock {
    fn revert(&mut self, host: &mut BlockHost<'_>, clock: Clock) -> Revert {
        if self.reverted {
            return Revert::Noop;
        }
        if clock.clearing {
            self.revert_fully(host);
            return Revert::Complete;
        }
        let Some(mut popped) = self.frames.pop() else {
            self.reverted = true;
            return Revert::Noop;
        };
        while self
            .frames
            .last()
            .is_some_and(|frame| frame.expires_at <= clock.now)
        {
            if let Some(frame) = self.frames.pop() {
                popped = frame;
            }
        }
        match self.frames.last() {
            None => {
                self.frames.push(popped);
                self.revert_fully(host);
                Revert::Complete
            }
            Some(top) => {
                let remaining = top.expires_at.saturating_sub(clock.now);
                self.current = top.snapshot.clone();
                host.apply(self.pos, popped.snapshot.state);
                Revert::Partial(u32::try_from(remaining).unwrap_or(u32::MAX).max(1))
            }
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifetime {
    Millis(u64),
    Ticks(u32),
}

/// Describes a temporary block mutation.
///
/// ```
/// use bending_core::temporal::{TempBlock, TempBlocks};
/// use bending_core::world::{BlockPos, BlockState, BlockType, MemoryWorld, World};
///
/// let mut world = MemoryWorld::new("docs");
/// let mut blocks = TempBlocks::new(600, 50);
/// let pos = BlockPos::new(0, 64, 0);
/// world.set_block_state(pos, BlockState::of(BlockType::Stone));
///
/// blocks.build(&mut world, &TempBlock::air().ticks(2), pos);
/// assert!(world.block_type(pos).is_air());
///
/// blocks.tick(&mut world);
/// blocks.tick(&mut world);
/// assert_eq!(world.block_type(pos), BlockType::Stone);
/// ```
#[derive(Debug, Clone)]
pub struct TempBlockBuilder {
    state: BlockState,
    bendable: bool,
    weak: bool,
    fix_water: Option<bool>,
    lifetime: Lifetime,
    source: Option<DamageSource>,
}

impl TempBlockBuilder {
    fn new(state: BlockState) -> Self {
        Self {
            state,
            bendable: false,
            weak: false,
            fix_water: None,
            lifetime: Lifetime::Millis(0),
            source: None,
        }
    }

    /// Whether other abilities may bend the block.
    #[must_use]
    pub fn bendable(mut self, bendable: bool) -> Self {
        self.bendable = bendable;
        self
    }

    /// Whether a later mutation may overwrite this one in place.
    #[must_use]
    pub fn weak(mut self, weak: bool) -> Self {
        self.weak = weak;
        self
    }

    /// Replace air with water where the surroundings would refill it anyway.
    /// Defaults to true when placing air.
    #[must_use]
    pub fn fix_water(mut self, fix_water: bool) -> Self {
        self.fix_water = Some(fix_water);
        self
    }

    /// Lifetime in milliseconds. Zero means the longest allowed lifetime.
    #[must_use]
    pub fn duration(mut self, millis: u64) -> Self {
        self.lifetime = Lifetime::Millis(millis);
        self
    }

    /// Lifetime in ticks.
    #[must_use]
    pub fn ticks(mut self, ticks: u32) -> Self {
        self.lifetime = Lifetime::Ticks(ticks);
        self
    }

    /// Attribution for damage caused by the block.
    #[must_use]
    pub fn source(mut self, source: DamageSource) -> Self {
        self.source = Some(source);
        self
    }

    /// State this builder places.
    #[must_use]
    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Apply the mutation in `world`.
    pub fn build<'w>(&self, world: &'w mut WorldContext, pos: BlockPos) -> Option<&'w TempBlock> {
        let WorldContext { host, blocks, .. } = world;
        blocks.build(host.as_mut(), self, pos)
    }

    fn ticks_in(&self, dimension: Dimension, manager: &TemporalManager<BlockPos, TempBlock>) -> u32 {
        let halve = dimension == Dimension::Nether && self.state.kind.is_ice_bendable();
        match self.lifetime {
            Lifetime::Ticks(ticks) if halve => (ticks / 2).max(1),
            Lifetime::Ticks(ticks) => ticks,
            Lifetime::Millis(millis) if halve => manager.from_millis(millis / 2),
            Lifetime::Millis(millis) => manager.from_millis(millis),
        }
    }

    /// The state actually written at `pos`, after water corrections.
    fn corrected_state(&self, world: &dyn World, pos: BlockPos) -> BlockState {
        let mut state = self.state;
        let mut infinite = false;
        if self.fix_water.unwrap_or(self.state.kind.is_air()) {
            infinite = is_infinite_water(world, pos);
            let above = world.block_state(pos.above());
            state = if infinite {
                BlockState::of(BlockType::Water)
            } else if above.kind.is_water() {
                BlockState::water(falling_level(above))
            } else {
                BlockState::AIR
            };
        }
        let old = world.block_state(pos);
        match old.waterlogged {
            Some(true) if state.kind.is_air() => old.with_waterlogged(false),
            Some(waterlogged) if infinite || (!waterlogged && state.kind.is_water()) => {
                old.with_waterlogged(true)
            }
            _ => state,
        }
    }
}

/// Level of water flowing down from `above`.
fn falling_level(above: BlockState) -> u8 {
    match above.level {
        Some(level) if level <= 7 => level + 8,
        Some(level) => level,
        None => 8,
    }
}

/// Two or more horizontal water sources would refill `pos`.
fn is_infinite_water(world: &dyn World, pos: BlockPos) -> bool {
    Direction::HORIZONTAL
        .iter()
        .filter(|&&dir| world.block_state(pos.relative(dir)).is_water_source())
        .count()
        >= 2
}

// ============================================================================
// Service
// ============================================================================

/// Every temporary block of one world.
#[derive(Debug)]
pub struct TempBlocks {
    manager: TemporalManager<BlockPos, TempBlock>,
    gravity: HashSet<BlockPos>,
    deferred: Vec<(BlockPos, BlockState)>,
}

impl TempBlocks {
    /// Create an empty service.
    #[must_use]
    pub fn new(max_ticks: u32, tick_millis: u64) -> Self {
        Self {
            manager: TemporalManager::new("blocks", max_ticks, tick_millis),
            gravity: HashSet::new(),
            deferred: Vec::new(),
        }
    }

    fn split<'a>(
        &'a mut self,
        world: &'a mut dyn World,
    ) -> (&'a mut TemporalManager<BlockPos, TempBlock>, BlockHost<'a>) {
        (
            &mut self.manager,
            BlockHost {
                world,
                gravity: &mut self.gravity,
                deferred: &mut self.deferred,
            },
        )
    }

    /// Apply `builder` at `pos`.
    ///
    /// # Returns
    ///
    /// The live temporary block, or `None` when nothing changed: the block
    /// holds a tile entity, already has the requested state, or the request
    /// restored the original state (which fully reverts the block).
    pub fn build(
        &mut self,
        world: &mut dyn World,
        builder: &TempBlockBuilder,
        pos: BlockPos,
    ) -> Option<&TempBlock> {
        if world.is_tile_entity(pos) {
            return None;
        }
        let state = builder.corrected_state(world, pos);
        if world.block_state(pos) == state {
            return None;
        }
        let ticks = builder.ticks_in(world.dimension(), &self.manager);
        let (manager, mut host) = self.split(world);
        let now = manager.current_tick();
        let expires_at = now + u64::from(ticks);

        if let Some(existing) = manager.get_mut(&pos) {
            if existing.original_state() == Some(state) {
                existing.revert_fully(&mut host);
            }
            if existing.reverted {
                manager.remove_entry(&pos);
                return None;
            }
            existing.add_state(&mut host, state, expires_at, builder, now);
            manager.reschedule(&pos, ticks);
        } else {
            let mut block = TempBlock::new(pos, host.world.block_state(pos));
            block.add_state(&mut host, state, expires_at, builder, now);
            manager.add_entry(pos, block, ticks);
        }
        self.manager.get(&pos)
    }

    /// Advance one tick: flush deferred writes, then revert due blocks.
    pub fn tick(&mut self, world: &mut dyn World) -> usize {
        self.flush_deferred(world);
        let (manager, mut host) = self.split(world);
        manager.tick(&mut host)
    }

    /// Undo the top mutation at `pos` now. Returns true if the block is back
    /// to its original state.
    pub fn revert(&mut self, world: &mut dyn World, pos: BlockPos) -> bool {
        let (manager, mut host) = self.split(world);
        manager.revert(&pos, &mut host)
    }

    /// Fully revert every temporary block.
    pub fn revert_all(&mut self, world: &mut dyn World) {
        let (manager, mut host) = self.split(world);
        manager.revert_all(&mut host);
        self.flush_deferred(world);
    }

    /// Forget `pos` and leave the world as it is.
    pub fn remove_without_reverting(&mut self, pos: BlockPos) -> bool {
        self.gravity.remove(&pos);
        self.manager.remove_entry(&pos).is_some()
    }

    /// Restore `pos` to a previously taken snapshot, or revert the top
    /// mutation when `snapshot` is `None`.
    pub fn revert_to_snapshot(
        &mut self,
        world: &mut dyn World,
        pos: BlockPos,
        snapshot: Option<&Snapshot>,
    ) {
        let Some(snapshot) = snapshot else {
            self.revert(world, pos);
            return;
        };
        let (manager, mut host) = self.split(world);
        if let Some(block) = manager.get_mut(&pos) {
            block.current.bendable = snapshot.bendable;
        }
        host.apply(pos, snapshot.state);
    }

    /// The block at `pos` as it stands now, with the live mutation's flags.
    /// `None` unless `pos` is temporary.
    #[must_use]
    pub fn snapshot(&self, world: &dyn World, pos: BlockPos) -> Option<Snapshot> {
        self.manager.get(&pos).map(|block| Snapshot {
            state: world.block_state(pos),
            ..block.current.clone()
        })
    }

    /// Temporary block at `pos`.
    #[must_use]
    pub fn get(&self, pos: BlockPos) -> Option<&TempBlock> {
        self.manager.get(&pos)
    }

    /// Whether `pos` holds a temporary block.
    #[must_use]
    pub fn is_temp(&self, pos: BlockPos) -> bool {
        self.manager.is_temp(&pos)
    }

    /// Whether `pos` may be bent. Real blocks always may.
    #[must_use]
    pub fn is_bendable(&self, pos: BlockPos) -> bool {
        self.manager.get(&pos).map_or(true, TempBlock::is_bendable)
    }

    /// Whether the physics engine should leave `pos` alone.
    #[must_use]
    pub fn should_ignore_physics(&self, pos: BlockPos) -> bool {
        self.gravity.contains(&pos)
    }

    /// Type at `pos`, looking through a weak mutation to the state below it.
    #[must_use]
    pub fn last_valid_type(&self, world: &dyn World, pos: BlockPos) -> BlockType {
        match self.manager.get(&pos) {
            Some(block) if block.current.weak => block.current.state.kind,
            _ => world.block_type(pos),
        }
    }

    /// Expiry tick of the block at `pos`.
    #[must_use]
    pub fn expiry(&self, pos: BlockPos) -> Option<u64> {
        self.manager.expiry(&pos)
    }

    /// Writes waiting for their chunk to load.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.deferred.len()
    }

    /// Number of temporary blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manager.len()
    }

    /// Returns true if no block is temporary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manager.is_empty()
    }

    /// Current tick of the block clock.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.manager.current_tick()
    }

    /// Convert milliseconds to block-clock ticks.
    #[must_use]
    pub fn from_millis(&self, millis: u64) -> u32 {
        self.manager.from_millis(millis)
    }

    fn flush_deferred(&mut self, world: &mut dyn World) {
        if self.deferred.is_empty() {
            return;
        }
        self.deferred.retain(|&(pos, state)| {
            if world.is_chunk_loaded(pos) {
                world.set_block_state(pos, state);
                false
            } else {
                true
            }
        });
    }
}
