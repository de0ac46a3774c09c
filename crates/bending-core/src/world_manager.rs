//! Loaded worlds and their per-tick update.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::ability::{AbilityDescription, AbilityId, AbilityManager, Activation};
use crate::collision::{CollisionManager, CollisionRegistry};
use crate::config::BendingConfig;
use crate::context::WorldContext;
use crate::error::{BendingError, Result};
use crate::user::{BenderRegistry, User};
use crate::world::{World, WorldKey};

/// Everything the engine keeps for one world.
#[derive(Debug)]
pub struct WorldInstance {
    context: WorldContext,
    abilities: AbilityManager,
    collisions: CollisionManager,
}

impl WorldInstance {
    /// Wrap a host world.
    #[must_use]
    pub fn new(host: Box<dyn World>, config: &BendingConfig) -> Self {
        let context = WorldContext::new(host, config);
        let abilities = AbilityManager::new(context.key().clone());
        Self {
            context,
            abilities,
            collisions: CollisionManager::new(config.collision.interval_ticks),
        }
    }

    /// World key.
    #[must_use]
    pub fn key(&self) -> &WorldKey {
        self.context.key()
    }

    /// World state and temporal services.
    #[must_use]
    pub fn context(&self) -> &WorldContext {
        &self.context
    }

    /// Mutable world state and temporal services.
    pub fn context_mut(&mut self) -> &mut WorldContext {
        &mut self.context
    }

    /// Live abilities.
    #[must_use]
    pub fn abilities(&self) -> &AbilityManager {
        &self.abilities
    }

    /// Mutable live abilities together with the world they act on.
    pub fn split_mut(&mut self) -> (&mut AbilityManager, &mut WorldContext) {
        (&mut self.abilities, &mut self.context)
    }

    /// Activate `description` for `user`. Permission checks are the caller's.
    pub fn activate(
        &mut self,
        user: &User,
        description: &Arc<AbilityDescription>,
        method: Activation,
    ) -> Option<AbilityId> {
        self.abilities
            .activate(user, description, method, &mut self.context)
    }

    /// Advance one tick: temporal services first, then abilities, then the
    /// collision pass.
    pub fn update(&mut self, benders: &BenderRegistry, collisions: &CollisionRegistry) {
        let reverted = self.context.advance();
        if reverted > 0 {
            debug!(world = %self.context.key(), reverted, "temporary state reverted");
        }
        self.abilities.update(benders, &mut self.context);
        self.collisions
            .update(collisions, &mut self.abilities, &mut self.context);
    }

    /// Destroy every ability and revert every temporary.
    pub fn shutdown(&mut self) {
        self.abilities.destroy_all_instances(&mut self.context);
        self.context.revert_all();
    }
}

/// Every loaded world, in key order.
#[derive(Debug, Default)]
pub struct WorldManager {
    worlds: BTreeMap<WorldKey, WorldInstance>,
}

impl WorldManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a world.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::DuplicateWorld`] if its key is already loaded.
    pub fn add(&mut self, instance: WorldInstance) -> Result<&mut WorldInstance> {
        let key = instance.key().clone();
        if self.worlds.contains_key(&key) {
            return Err(BendingError::DuplicateWorld(key));
        }
        info!(world = %key, "world added");
        Ok(self.worlds.entry(key).or_insert(instance))
    }

    /// Unload a world, reverting everything done to it.
    pub fn remove(&mut self, key: &WorldKey) -> Option<WorldInstance> {
        let mut instance = self.worlds.remove(key)?;
        instance.shutdown();
        info!(world = %key, "world removed");
        Some(instance)
    }

    /// World by key.
    #[must_use]
    pub fn get(&self, key: &WorldKey) -> Option<&WorldInstance> {
        self.worlds.get(key)
    }

    /// Mutable world by key.
    pub fn get_mut(&mut self, key: &WorldKey) -> Option<&mut WorldInstance> {
        self.worlds.get_mut(key)
    }

    /// Whether `key` is loaded.
    #[must_use]
    pub fn contains(&self, key: &WorldKey) -> bool {
        self.worlds.contains_key(key)
    }

    /// Loaded worlds in key order.
    pub fn iter(&self) -> impl Iterator<Item = &WorldInstance> + '_ {
        self.worlds.values()
    }

    /// Advance every world by one tick. Worlds update in parallel.
    pub fn update(&mut self, benders: &BenderRegistry, collisions: &CollisionRegistry) {
        self.worlds
            .par_iter_mut()
            .for_each(|(_, world)| world.update(benders, collisions));
    }

    /// Shut every world down. The worlds stay loaded.
    pub fn shutdown(&mut self) {
        for world in self.worlds.values_mut() {
            world.shutdown();
        }
    }

    /// Number of loaded worlds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    /// Returns true if no world is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }
}
