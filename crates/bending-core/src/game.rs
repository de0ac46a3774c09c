//! The engine entry point a host binding drives.
//!
//! A [`Game`] is built once at startup from a [`BendingConfig`]. The host
//! registers abilities, sequences and collision pairs, loads worlds and
//! registers benders, then calls [`Game::tick`] once per server tick and
//! forwards user input through [`Game::on_action`].
//!
//! ```
//! use bending_core::world::MemoryWorld;
//! use bending_core::{BendingConfig, Game};
//!
//! let mut game = Game::new(BendingConfig::default()).unwrap();
//! game.add_world(Box::new(MemoryWorld::new("overworld"))).unwrap();
//! game.tick();
//! assert_eq!(game.now_millis(), 50);
//! game.shutdown();
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::ability::{AbilityDescription, AbilityId, AbilityKey, AbilityRegistry, Activation};
use crate::collision::{CollisionPair, CollisionPairBuilder, CollisionRegistry};
use crate::config::BendingConfig;
use crate::error::{BendingError, Result};
use crate::sequence::{Sequence, SequenceManager, SequenceRegistry, SequenceStep};
use crate::temporal::ActionType;
use crate::user::{BenderRegistry, User, UserId};
use crate::world::{World, WorldKey};
use crate::world_manager::{WorldInstance, WorldManager};

/// Process-wide registries, built at startup and shared by every world.
#[derive(Debug, Default)]
pub struct Registries {
    /// Ability descriptions
    pub abilities: AbilityRegistry,
    /// Combo definitions
    pub sequences: SequenceRegistry,
    /// Collision pairs
    pub collisions: CollisionRegistry,
    /// Registered benders
    pub benders: BenderRegistry,
}

/// The bending engine.
#[derive(Debug)]
pub struct Game {
    config: BendingConfig,
    registries: Registries,
    worlds: WorldManager,
    sequences: SequenceManager,
    tick: u64,
}

impl Game {
    /// Create an engine with no worlds.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: BendingConfig) -> Result<Self> {
        config.validate()?;
        let mut registries = Registries::default();
        for key in config.disabled_keys() {
            registries.abilities.disable(key);
        }
        Ok(Self {
            sequences: SequenceManager::new(&config.sequence),
            config,
            registries,
            worlds: WorldManager::new(),
            tick: 0,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BendingConfig {
        &self.config
    }

    /// Shared registries.
    #[must_use]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Loaded worlds.
    #[must_use]
    pub fn worlds(&self) -> &WorldManager {
        &self.worlds
    }

    /// Loaded world by key.
    #[must_use]
    pub fn world(&self, key: &WorldKey) -> Option<&WorldInstance> {
        self.worlds.get(key)
    }

    /// Mutable loaded world by key.
    pub fn world_mut(&mut self, key: &WorldKey) -> Option<&mut WorldInstance> {
        self.worlds.get_mut(key)
    }

    /// Engine ticks since start.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Engine time in milliseconds.
    #[must_use]
    pub fn now_millis(&self) -> u64 {
        self.tick * self.config.tick_millis
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register an ability.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::DuplicateAbility`] if the key is taken.
    pub fn register_ability(&mut self, description: AbilityDescription) -> Result<Arc<AbilityDescription>> {
        self.registries.abilities.register(description)
    }

    /// Register the combo that activates `key`.
    ///
    /// # Errors
    ///
    /// Fails if `key` is unknown, the steps are invalid, or a step names an
    /// unknown or disabled ability.
    pub fn register_sequence(&mut self, key: &AbilityKey, steps: Vec<SequenceStep>) -> Result<()> {
        let description = self
            .registries
            .abilities
            .get(key)
            .cloned()
            .ok_or_else(|| BendingError::UnknownAbility(key.clone()))?;
        let sequence = Sequence::new(description, steps)?;
        self.registries
            .sequences
            .register(sequence, &self.registries.abilities)
    }

    /// Start describing collision pairs against the registered abilities.
    #[must_use]
    pub fn collision_pairs(&self) -> CollisionPairBuilder<'_> {
        CollisionPairBuilder::new(&self.registries.abilities)
    }

    /// Add collision pairs built with [`collision_pairs`](Self::collision_pairs).
    ///
    /// # Errors
    ///
    /// Fails without registering anything if a pair names an unknown or
    /// disabled ability.
    pub fn register_collisions(&mut self, pairs: Vec<CollisionPair>) -> Result<()> {
        let Registries {
            abilities,
            collisions,
            ..
        } = &mut self.registries;
        collisions.register(pairs, abilities)
    }

    // ========================================================================
    // Worlds and users
    // ========================================================================

    /// Load a world.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::DuplicateWorld`] if its key is already loaded.
    pub fn add_world(&mut self, host: Box<dyn World>) -> Result<()> {
        self.worlds
            .add(WorldInstance::new(host, &self.config))
            .map(|_| ())
    }

    /// Unload a world, reverting everything done to it.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownWorld`] if it is not loaded.
    pub fn remove_world(&mut self, key: &WorldKey) -> Result<WorldInstance> {
        self.worlds
            .remove(key)
            .ok_or_else(|| BendingError::UnknownWorld(key.clone()))
    }

    /// Register a bender and create their passives.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownWorld`] if the user's world is not
    /// loaded, or [`BendingError::DuplicateUser`].
    pub fn register_user(&mut self, user: User) -> Result<UserId> {
        let Self {
            registries, worlds, ..
        } = self;
        let world = worlds
            .get_mut(user.world())
            .ok_or_else(|| BendingError::UnknownWorld(user.world().clone()))?;
        let user = registries.benders.register(user)?;
        let (abilities, context) = world.split_mut();
        let passives = abilities.create_passives(user, &registries.abilities, context);
        debug!(user = %user.id(), world = %user.world(), passives, "user registered");
        Ok(user.id())
    }

    /// Remove a bender, destroying their abilities and lifting their limiter.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownUser`].
    pub fn remove_user(&mut self, id: UserId) -> Result<User> {
        let user = self
            .registries
            .benders
            .remove(id)
            .ok_or(BendingError::UnknownUser(id))?;
        if let Some(world) = self.worlds.get_mut(user.world()) {
            let (abilities, context) = world.split_mut();
            context.revert_limiter(user.entity());
            abilities.destroy_all_user_instances(id, context);
        }
        self.sequences.remove_user(id);
        debug!(user = %id, "user removed");
        Ok(user)
    }

    /// Registered bender.
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.registries.benders.get(id)
    }

    /// Mutable registered bender, for binds and elements. Call
    /// [`refresh_passives`](Self::refresh_passives) after changing elements.
    pub fn user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.registries.benders.get_mut(id)
    }

    /// Recreate `id`'s passives. Returns how many were created.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownUser`] or [`BendingError::UnknownWorld`].
    pub fn refresh_passives(&mut self, id: UserId) -> Result<usize> {
        let Self {
            registries, worlds, ..
        } = self;
        let user = registries
            .benders
            .get(id)
            .ok_or(BendingError::UnknownUser(id))?;
        let world = worlds
            .get_mut(user.world())
            .ok_or_else(|| BendingError::UnknownWorld(user.world().clone()))?;
        let (abilities, context) = world.split_mut();
        Ok(abilities.create_passives(user, &registries.abilities, context))
    }

    /// Move a bender to another world.
    ///
    /// Everything the user had running in the old world is destroyed, their
    /// combo buffer is dropped and their passives start in the new world.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownUser`] or [`BendingError::UnknownWorld`].
    pub fn change_world(&mut self, id: UserId, key: &WorldKey) -> Result<()> {
        if !self.worlds.contains(key) {
            return Err(BendingError::UnknownWorld(key.clone()));
        }
        let Self {
            registries,
            worlds,
            sequences,
            ..
        } = self;
        let user = registries
            .benders
            .get_mut(id)
            .ok_or(BendingError::UnknownUser(id))?;
        if user.world() == key {
            return Ok(());
        }
        if let Some(old) = worlds.get_mut(user.world()) {
            let (abilities, context) = old.split_mut();
            context.revert_limiter(user.entity());
            abilities.destroy_all_user_instances(id, context);
        }
        debug!(user = %id, from = %user.world(), to = %key, "user changed world");
        user.set_world(key.clone());
        sequences.remove_user(id);

        if let Some(new) = worlds.get_mut(key) {
            let (abilities, context) = new.split_mut();
            abilities.create_passives(user, &registries.abilities, context);
        }
        Ok(())
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Activate the ability in `id`'s selected slot.
    ///
    /// Returns `None` if the slot is empty, the ability is disabled or not
    /// activated by `method`, the user may not bend it or build where they
    /// stand, the user is ability-limited, or the ability declined.
    pub fn activate_ability(&mut self, id: UserId, method: Activation) -> Option<AbilityId> {
        let Self {
            registries, worlds, ..
        } = self;
        let user = registries.benders.get(id)?;
        let description = user
            .selected_ability()
            .and_then(|key| registries.abilities.get(key))?;
        let world = worlds.get_mut(user.world())?;
        try_activate(&registries.abilities, user, world, description, method)
    }

    /// Handle one input action: feed the combo buffer, then activate the
    /// selected ability. Returns every ability instance created.
    pub fn on_action(&mut self, id: UserId, method: Activation) -> Vec<AbilityId> {
        let now = self.now_millis();
        let Self {
            registries,
            worlds,
            sequences,
            ..
        } = self;
        let mut activated = Vec::new();
        let Some(user) = registries.benders.get(id) else {
            return activated;
        };
        let Some(world) = worlds.get_mut(user.world()) else {
            return activated;
        };
        let combo = sequences.register_action(
            user,
            method,
            now,
            &registries.sequences,
            &registries.abilities,
        );
        if let Some(description) = combo {
            activated.extend(try_activate(
                &registries.abilities,
                user,
                world,
                &description,
                Activation::Sequence,
            ));
        }
        let selected = user
            .selected_ability()
            .and_then(|key| registries.abilities.get(key));
        if let Some(description) = selected {
            activated.extend(try_activate(&registries.abilities, user, world, description, method));
        }
        activated
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Advance every world by one tick.
    pub fn tick(&mut self) {
        self.tick += 1;
        self.worlds
            .update(&self.registries.benders, &self.registries.collisions);
        let now = self.now_millis();
        self.sequences.expire(now);
    }

    /// Destroy every ability and revert every temporary in every world.
    pub fn shutdown(&mut self) {
        self.worlds.shutdown();
        self.sequences.clear();
        self.registries.collisions.clear();
        info!(worlds = self.worlds.len(), tick = self.tick, "bending shut down");
    }
}

/// Activate `description` for `user` if every precondition holds.
fn try_activate(
    abilities: &AbilityRegistry,
    user: &User,
    world: &mut WorldInstance,
    description: &Arc<AbilityDescription>,
    method: Activation,
) -> Option<AbilityId> {
    if !description.is_activated_by(method)
        || !abilities.is_enabled(description.key())
        || !user.can_bend(description)
        || !user.can_build(user.block())
    {
        return None;
    }
    if world
        .context()
        .limiters()
        .is_limited(user.entity(), Some(ActionType::ABILITY))
    {
        return None;
    }
    world.activate(user, description, method)
}
