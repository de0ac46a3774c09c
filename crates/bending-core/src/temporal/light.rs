//! Temporary client-side light sources.
//!
//! Lights are rendered as fake light blocks and fade by `rate` levels every
//! two ticks once their duration passes. A locked light does not fade.

use super::{Clock, Revert, TemporalManager, Temporary};
use crate::context::WorldContext;
use crate::world::{BlockPos, BlockState, World};

/// Brightest fake light. Level 15 is left to real light sources.
pub const MAX_LEVEL: u8 = 14;

/// Ticks between fade steps.
const FADE_INTERVAL: u32 = 2;

/// Where a light may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Air,
    Water,
    Invalid,
}

fn placement(world: &dyn World, pos: BlockPos, level: u8) -> Placement {
    if world.light_level(pos) >= level {
        return Placement::Invalid;
    }
    let state = world.block_state(pos);
    if state.kind.is_air() {
        Placement::Air
    } else if state.is_water_source() {
        Placement::Water
    } else {
        Placement::Invalid
    }
}

/// A fading light.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempLight {
    pos: BlockPos,
    level: u8,
    rate: u8,
    locked: bool,
    reverted: bool,
}

impl TempLight {
    /// Builder for a light of `level` (clamped to `1..=14`).
    #[must_use]
    pub fn builder(level: u8) -> TempLightBuilder {
        TempLightBuilder {
            level: level.clamp(1, MAX_LEVEL),
            rate: None,
            duration_millis: None,
        }
    }

    /// Position.
    #[must_use]
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Whether fading is suspended.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn render(&self, world: &mut dyn World, placement: Placement) {
        world.send_fake_block(
            self.pos,
            Some(BlockState::light(self.level, placement == Placement::Water)),
        );
    }
}

impl<'a> Temporary<dyn World + 'a> for TempLight {
    fn revert(&mut self, world: &mut (dyn World + 'a), clock: Clock) -> Revert {
        if self.reverted {
            return Revert::Noop;
        }
        if self.locked && !clock.clearing {
            return Revert::Partial(FADE_INTERVAL);
        }
        self.level = self.level.saturating_sub(self.rate);
        let placement = placement(world, self.pos, self.level);
        if clock.clearing || self.level == 0 || placement == Placement::Invalid {
            self.reverted = true;
            world.send_fake_block(self.pos, None);
            return Revert::Complete;
        }
        self.render(world, placement);
        Revert::Partial(FADE_INTERVAL)
    }
}

/// Describes a temporary light.
#[derive(Debug, Clone)]
pub struct TempLightBuilder {
    level: u8,
    rate: Option<u8>,
    duration_millis: Option<u64>,
}

impl TempLightBuilder {
    /// Levels lost per fade step.
    #[must_use]
    pub fn rate(mut self, rate: u8) -> Self {
        self.rate = Some(rate.max(1));
        self
    }

    /// Time before fading starts.
    #[must_use]
    pub fn duration(mut self, millis: u64) -> Self {
        self.duration_millis = Some(millis);
        self
    }

    /// Show the light at `pos` in `world`.
    pub fn build<'w>(&self, world: &'w mut WorldContext, pos: BlockPos) -> Option<&'w TempLight> {
        let WorldContext { host, lights, .. } = world;
        lights.build(host.as_mut(), self, pos)
    }
}

/// Every temporary light of one world.
#[derive(Debug)]
pub struct TempLights {
    manager: TemporalManager<BlockPos, TempLight>,
    enabled: bool,
    default_rate: u8,
    default_duration: u64,
}

impl TempLights {
    /// Create an empty service.
    #[must_use]
    pub fn new(max_ticks: u32, tick_millis: u64, enabled: bool, rate: u8, duration_millis: u64) -> Self {
        Self {
            manager: TemporalManager::new("lights", max_ticks, tick_millis),
            enabled,
            default_rate: rate.max(1),
            default_duration: duration_millis,
        }
    }

    /// Show a light.
    ///
    /// A brighter request at an existing light raises its level in place.
    /// Returns `None` when lights are disabled or `pos` cannot hold a light.
    pub fn build(
        &mut self,
        world: &mut dyn World,
        builder: &TempLightBuilder,
        pos: BlockPos,
    ) -> Option<&TempLight> {
        if !self.enabled {
            return None;
        }
        let placement = placement(world, pos, builder.level);
        if placement == Placement::Invalid {
            return None;
        }
        let ticks = self
            .manager
            .from_millis(builder.duration_millis.unwrap_or(self.default_duration));
        if let Some(light) = self.manager.get_mut(&pos) {
            if builder.level > light.level {
                light.level = builder.level;
                light.render(world, placement);
            }
        } else {
            let light = TempLight {
                pos,
                level: builder.level,
                rate: builder.rate.unwrap_or(self.default_rate),
                locked: false,
                reverted: false,
            };
            light.render(world, placement);
            self.manager.add_entry(pos, light, ticks);
        }
        self.manager.get(&pos)
    }

    /// Fade due lights.
    pub fn tick(&mut self, world: &mut dyn World) -> usize {
        self.manager.tick(world)
    }

    /// Stop the light at `pos` from fading.
    pub fn lock(&mut self, pos: BlockPos) -> bool {
        self.set_locked(pos, true)
    }

    /// Let the light at `pos` fade again.
    pub fn unlock(&mut self, pos: BlockPos) -> bool {
        self.set_locked(pos, false)
    }

    fn set_locked(&mut self, pos: BlockPos, locked: bool) -> bool {
        match self.manager.get_mut(&pos) {
            Some(light) => {
                light.locked = locked;
                true
            }
            None => false,
        }
    }

    /// Unlock and fade one step now.
    pub fn unlock_and_revert(&mut self, world: &mut dyn World, pos: BlockPos) -> bool {
        self.unlock(pos);
        self.manager.revert(&pos, world)
    }

    /// Remove every light.
    pub fn revert_all(&mut self, world: &mut dyn World) {
        self.manager.revert_all(world);
    }

    /// Light at `pos`.
    #[must_use]
    pub fn get(&self, pos: BlockPos) -> Option<&TempLight> {
        self.manager.get(&pos)
    }

    /// Number of live lights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manager.len()
    }

    /// Returns true if no light is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manager.is_empty()
    }
}
