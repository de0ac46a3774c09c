//! Test helpers: users, stub abilities and ready-made worlds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use glam::Vec3;

use crate::ability::common::{predicate, EarthSpike, Pillar};
use crate::ability::{Ability, AbilityContext, AbilityDescription, Activation, UpdateResult};
use crate::error::AbilityError;
use crate::user::{Element, FixedCapabilities, User, UserId, UserKind};
use crate::world::{BlockPos, BlockState, BlockType, EntityId, MemoryWorld, World, WorldKey};

// =============================================================================
// Users
// =============================================================================

/// A non-player bender with every permission and no elements, standing at
/// the world origin on top of the default test ground.
pub fn test_user(id: u64, world: &str) -> User {
    test_user_at(id, world, Vec3::new(0.5, 65.0, 0.5))
}

/// Like [`test_user`], at `location`.
pub fn test_user_at(id: u64, world: &str, location: Vec3) -> User {
    User::new(
        UserId::new(id),
        EntityId::new(1_000 + id),
        format!("bender{id}"),
        WorldKey::new(world),
        UserKind::NonPlayer,
        Arc::new(FixedCapabilities {
            location,
            direction: Vec3::X,
        }),
    )
}

/// A test user who can bend every element.
pub fn avatar(id: u64, world: &str) -> User {
    let mut user = test_user(id, world);
    user.add_elements(Element::all());
    user
}

/// Install a test-writer subscriber. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// =============================================================================
// Worlds
// =============================================================================

/// Flat ground: dirt from y=60 to y=64 over a 17x17 area centered on the
/// origin, with a water pool at (5, 64, 5).
pub fn test_ground(name: &str) -> MemoryWorld {
    let mut world = MemoryWorld::new(name);
    world.fill(
        BlockPos::new(-8, 60, -8),
        BlockPos::new(8, 64, 8),
        BlockState::of(BlockType::Dirt),
    );
    world.set_block_state(BlockPos::new(5, 64, 5), BlockState::of(BlockType::Water));
    world
}

// =============================================================================
// Abilities
// =============================================================================

/// Does nothing until destroyed.
pub struct Noop {
    description: Arc<AbilityDescription>,
}

impl Noop {
    /// Factory for [`AbilityDescription::builder`].
    pub fn factory(description: &Arc<AbilityDescription>) -> Box<dyn Ability> {
        Box::new(Self {
            description: Arc::clone(description),
        })
    }
}

impl Ability for Noop {
    fn description(&self) -> &Arc<AbilityDescription> {
        &self.description
    }

    fn activate(&mut self, _ctx: &mut AbilityContext<'_>, _method: Activation) -> bool {
        true
    }

    fn update(&mut self, _ctx: &mut AbilityContext<'_>) -> Result<UpdateResult, AbilityError> {
        Ok(UpdateResult::Continue)
    }
}

/// A left-click [`Noop`] ability of `element`.
pub fn noop_description(name: &str, element: Element) -> AbilityDescription {
    AbilityDescription::builder(name, Noop::factory)
        .element(element)
        .activation(Activation::Attack)
        .build()
        .unwrap()
}

/// Shared record of what test abilities did.
#[derive(Debug, Default)]
pub struct Recorder {
    /// Update calls across every instance
    pub updates: AtomicUsize,
    /// Destroy calls across every instance
    pub destroyed: AtomicUsize,
    /// Names of instances in the order they were updated
    pub order: Mutex<Vec<String>>,
}

impl Recorder {
    /// Update calls so far.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Destroy calls so far.
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// How a [`Scripted`] ability behaves on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Keep running
    Forever,
    /// Remove itself after this many updates
    Countdown(usize),
    /// Return an error
    Fail,
    /// Panic
    Panic,
    /// Queue a [`Script::Forever`] ability on the first update
    Spawn,
}

/// An ability driven by a [`Script`] that reports to a [`Recorder`].
pub struct Scripted {
    description: Arc<AbilityDescription>,
    script: Script,
    recorder: Arc<Recorder>,
    updates: usize,
}

impl Ability for Scripted {
    fn description(&self) -> &Arc<AbilityDescription> {
        &self.description
    }

    fn activate(&mut self, _ctx: &mut AbilityContext<'_>, _method: Activation) -> bool {
        true
    }

    fn update(&mut self, ctx: &mut AbilityContext<'_>) -> Result<UpdateResult, AbilityError> {
        self.recorder.updates.fetch_add(1, Ordering::SeqCst);
        self.recorder
            .order
            .lock()
            .unwrap()
            .push(self.description.display_name().to_owned());
        self.updates += 1;
        match self.script {
            Script::Forever => Ok(UpdateResult::Continue),
            Script::Countdown(n) if self.updates >= n => Ok(UpdateResult::Remove),
            Script::Countdown(_) => Ok(UpdateResult::Continue),
            Script::Fail => Err(AbilityError::Failed("scripted failure".into())),
            Script::Panic => panic!("scripted panic"),
            Script::Spawn => {
                if self.updates == 1 {
                    ctx.add_ability(Box::new(Self {
                        description: Arc::clone(&self.description),
                        script: Script::Forever,
                        recorder: Arc::clone(&self.recorder),
                        updates: 0,
                    }));
                }
                Ok(UpdateResult::Continue)
            }
        }
    }

    fn on_destroy(&mut self, _world: &mut crate::context::WorldContext) {
        self.recorder.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A left-click ability following `script`.
pub fn scripted(name: &str, script: Script, recorder: &Arc<Recorder>) -> AbilityDescription {
    scripted_with(name, script, recorder, Activation::Attack)
}

/// A scripted ability activated by `activation`.
pub fn scripted_with(
    name: &str,
    script: Script,
    recorder: &Arc<Recorder>,
    activation: Activation,
) -> AbilityDescription {
    let recorder = Arc::clone(recorder);
    AbilityDescription::builder(name, move |description| {
        Box::new(Scripted {
            description: Arc::clone(description),
            script,
            recorder: Arc::clone(&recorder),
            updates: 0,
        })
    })
    .element(Element::EARTH)
    .activation(activation)
    .build()
    .unwrap()
}

/// Raises a three-block pillar under the user, then lets it run as an
/// ownerless effect.
pub struct EarthRise {
    description: Arc<AbilityDescription>,
}

impl EarthRise {
    /// Factory for [`AbilityDescription::builder`].
    pub fn factory(description: &Arc<AbilityDescription>) -> Box<dyn Ability> {
        Box::new(Self {
            description: Arc::clone(description),
        })
    }

    /// Sneak-activated earth ability description.
    pub fn description() -> AbilityDescription {
        AbilityDescription::builder("EarthRise", Self::factory)
            .element(Element::EARTH)
            .activation(Activation::Sneak)
            .build()
            .unwrap()
    }
}

impl Ability for EarthRise {
    fn description(&self) -> &Arc<AbilityDescription> {
        &self.description
    }

    fn activate(&mut self, ctx: &mut AbilityContext<'_>, _method: Activation) -> bool {
        let user = ctx.user();
        let base = user.block().below();
        let pillar = Pillar::builder(base)
            .interval(0)
            .predicate(predicate(|state| state.kind.is_earth_bendable()))
            .build(user, ctx.world_ref(), 3);
        match pillar {
            Some(pillar) => {
                ctx.add_updatable(Box::new(pillar));
                true
            }
            None => false,
        }
    }

    fn update(&mut self, _ctx: &mut AbilityContext<'_>) -> Result<UpdateResult, AbilityError> {
        Ok(UpdateResult::Remove)
    }
}

/// Sequence-activated ability that grows a spike next to the user.
pub struct SpikeCombo {
    description: Arc<AbilityDescription>,
}

impl SpikeCombo {
    /// Factory for [`AbilityDescription::builder`].
    pub fn factory(description: &Arc<AbilityDescription>) -> Box<dyn Ability> {
        Box::new(Self {
            description: Arc::clone(description),
        })
    }

    /// Combo ability description.
    pub fn description() -> AbilityDescription {
        AbilityDescription::builder("SpikeCombo", Self::factory)
            .element(Element::EARTH)
            .activation(Activation::Sequence)
            .build()
            .unwrap()
    }
}

impl Ability for SpikeCombo {
    fn description(&self) -> &Arc<AbilityDescription> {
        &self.description
    }

    fn activate(&mut self, ctx: &mut AbilityContext<'_>, _method: Activation) -> bool {
        let base = ctx.user().block().below().offset(crate::world::Direction::East, 2);
        let Some(spike) = EarthSpike::builder(base).interval(0).build(ctx.world_ref()) else {
            return false;
        };
        ctx.add_updatable(Box::new(spike));
        true
    }

    fn update(&mut self, _ctx: &mut AbilityContext<'_>) -> Result<UpdateResult, AbilityError> {
        Ok(UpdateResult::Remove)
    }
}
