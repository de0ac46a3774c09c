//! Per-world ability lifecycle.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{
    Ability, AbilityContext, AbilityDescription, AbilityId, AbilityInstance, AbilityKey,
    AbilityRegistry, Activation, AddQueue, Updatable, UpdateResult,
};
use crate::context::WorldContext;
use crate::user::{BenderRegistry, User, UserId};
use crate::world::WorldKey;

/// Owns every live ability of one world.
///
/// Instances are grouped by owner in a `BTreeMap`, so updates run in a
/// deterministic order: by user ID, then by activation order.
pub struct AbilityManager {
    world: WorldKey,
    instances: BTreeMap<UserId, Vec<AbilityInstance>>,
    queue: AddQueue,
    updatables: Vec<Box<dyn Updatable>>,
}

impl fmt::Debug for AbilityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityManager")
            .field("world", &self.world)
            .field("instances", &self.instances)
            .field("queue", &self.queue)
            .field("updatables", &self.updatables.len())
            .finish()
    }
}

impl AbilityManager {
    /// Create an empty manager for `world`.
    #[must_use]
    pub fn new(world: WorldKey) -> Self {
        Self {
            world,
            instances: BTreeMap::new(),
            queue: AddQueue::default(),
            updatables: Vec::new(),
        }
    }

    /// World this manager belongs to.
    #[must_use]
    pub fn world(&self) -> &WorldKey {
        &self.world
    }

    /// Queue an activated ability for `user`.
    ///
    /// Returns `None` (and drops the ability) if the user is in another world.
    pub fn add_ability(&mut self, user: &User, ability: Box<dyn Ability>) -> Option<AbilityId> {
        if user.world() != &self.world {
            warn!(
                user = %user.id(),
                world = %self.world,
                ability = %ability.description().key(),
                "refusing ability for user in another world"
            );
            return None;
        }
        Some(self.queue.push(user.id(), ability))
    }

    /// Queue an ownerless effect.
    pub fn add_updatable(&mut self, updatable: Box<dyn Updatable>) {
        self.queue.updatables.push(updatable);
    }

    /// Create, activate and queue `description` for `user`.
    ///
    /// The caller is responsible for permission checks.
    pub fn activate(
        &mut self,
        user: &User,
        description: &Arc<AbilityDescription>,
        method: Activation,
        world: &mut WorldContext,
    ) -> Option<AbilityId> {
        let mut ability = description.create_ability();
        let mut ctx = AbilityContext::new(user, world, &mut self.queue);
        if !ability.activate(&mut ctx, method) {
            return None;
        }
        self.add_ability(user, ability)
    }

    /// Run one update: promote queued work, update effects, then update
    /// every ability.
    ///
    /// Abilities that return [`UpdateResult::Remove`], return an error,
    /// panic, or whose owner is gone are removed and destroyed. One failing
    /// ability never stops the others.
    pub fn update(&mut self, users: &BenderRegistry, world: &mut WorldContext) {
        for instance in self.queue.abilities.drain(..) {
            self.instances.entry(instance.user).or_default().push(instance);
        }
        self.updatables.append(&mut self.queue.updatables);
        self.updatables
            .retain_mut(|updatable| run_updatable(updatable.as_mut(), world) == UpdateResult::Continue);

        let queue = &mut self.queue;
        for (user_id, list) in &mut self.instances {
            let user = users.get(*user_id);
            list.retain_mut(|instance| {
                let result = match user {
                    Some(user) => run_update(instance, user, world, queue),
                    None => {
                        debug!(user = %user_id, id = %instance.id, "owner is gone");
                        UpdateResult::Remove
                    }
                };
                if result == UpdateResult::Remove {
                    instance.ability.on_destroy(world);
                    false
                } else {
                    true
                }
            });
        }
        self.instances.retain(|_, list| !list.is_empty());
    }

    /// Move a live ability to another owner in the same world.
    ///
    /// Returns false if the ability is unknown, already owned by `user`,
    /// `user` is in another world, or the ability rejects the change.
    pub fn change_owner(&mut self, id: AbilityId, user: &User) -> bool {
        if user.world() != &self.world {
            return false;
        }
        let Some((owner, index)) = self.locate(id) else {
            return false;
        };
        if owner == user.id() {
            return false;
        }
        let Some(list) = self.instances.get_mut(&owner) else {
            return false;
        };
        let mut instance = list.remove(index);
        if list.is_empty() {
            self.instances.remove(&owner);
        }
        let accepted = instance.ability.on_user_change(user);
        if accepted {
            instance.user = user.id();
        }
        self.instances.entry(instance.user).or_default().push(instance);
        accepted
    }

    /// Create every enabled passive `user` can bend, replacing existing ones.
    pub fn create_passives(
        &mut self,
        user: &User,
        registry: &AbilityRegistry,
        world: &mut WorldContext,
    ) -> usize {
        let mut created = 0;
        for description in registry.passives() {
            self.destroy_instance_type(user.id(), description.key(), world);
            if user.can_bend(description)
                && self
                    .activate(user, description, Activation::Passive, world)
                    .is_some()
            {
                created += 1;
            }
        }
        created
    }

    /// Destroy `user`'s instances of `key`. Returns true if any existed.
    pub fn destroy_instance_type(
        &mut self,
        user: UserId,
        key: &AbilityKey,
        world: &mut WorldContext,
    ) -> bool {
        self.destroy_user_instances(user, |ability| ability.description().key() == key, world)
    }

    /// Destroy `user`'s instances matching `predicate`, live or queued.
    /// Returns true if any matched.
    pub fn destroy_user_instances<P>(&mut self, user: UserId, predicate: P, world: &mut WorldContext) -> bool
    where
        P: Fn(&dyn Ability) -> bool,
    {
        let mut destroyed = false;
        let mut destroy = |instance: &mut AbilityInstance| {
            if instance.user == user && predicate(instance.ability.as_ref()) {
                instance.ability.on_destroy(world);
                destroyed = true;
                false
            } else {
                true
            }
        };
        if let Some(list) = self.instances.get_mut(&user) {
            list.retain_mut(&mut destroy);
            if list.is_empty() {
                self.instances.remove(&user);
            }
        }
        self.queue.abilities.retain_mut(destroy);
        destroyed
    }

    /// Destroy every instance owned by `user`.
    pub fn destroy_all_user_instances(&mut self, user: UserId, world: &mut WorldContext) {
        self.destroy_user_instances(user, |_| true, world);
    }

    /// Destroy a single instance. Returns false if it is not live.
    pub fn destroy_instance(&mut self, id: AbilityId, world: &mut WorldContext) -> bool {
        let Some((owner, index)) = self.locate(id) else {
            return false;
        };
        let Some(list) = self.instances.get_mut(&owner) else {
            return false;
        };
        let mut instance = list.remove(index);
        if list.is_empty() {
            self.instances.remove(&owner);
        }
        instance.ability.on_destroy(world);
        true
    }

    /// Destroy everything, including queued work.
    pub fn destroy_all_instances(&mut self, world: &mut WorldContext) {
        let live = std::mem::take(&mut self.instances).into_values().flatten();
        let queued = self.queue.abilities.drain(..);
        for mut instance in live.chain(queued) {
            instance.ability.on_destroy(world);
        }
        self.queue.updatables.clear();
        self.updatables.clear();
    }

    /// Whether `user` has a live instance of `key`.
    #[must_use]
    pub fn has_ability(&self, user: UserId, key: &AbilityKey) -> bool {
        self.user_instances(user)
            .any(|instance| instance.ability.description().key() == key)
    }

    /// Live instances owned by `user`.
    pub fn user_instances(&self, user: UserId) -> impl Iterator<Item = &AbilityInstance> + '_ {
        self.instances.get(&user).into_iter().flatten()
    }

    /// Every live instance, by owner then activation order.
    pub fn instances(&self) -> impl Iterator<Item = &AbilityInstance> + '_ {
        self.instances.values().flatten()
    }

    /// Live instance by ID.
    #[must_use]
    pub fn get(&self, id: AbilityId) -> Option<&AbilityInstance> {
        self.instances().find(|instance| instance.id == id)
    }

    pub(crate) fn ability_mut(&mut self, id: AbilityId) -> Option<&mut (dyn Ability + 'static)> {
        self.instances
            .values_mut()
            .flatten()
            .find(|instance| instance.id == id)
            .map(|instance| instance.ability.as_mut())
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.values().map(Vec::len).sum()
    }

    /// Returns true if nothing is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Number of live effects.
    #[must_use]
    pub fn updatable_count(&self) -> usize {
        self.updatables.len()
    }

    fn locate(&self, id: AbilityId) -> Option<(UserId, usize)> {
        self.instances.iter().find_map(|(owner, list)| {
            list.iter()
                .position(|instance| instance.id == id)
                .map(|index| (*owner, index))
        })
    }
}

/// Update one instance, turning errors and panics into removal.
fn run_update(
    instance: &mut AbilityInstance,
    user: &User,
    world: &mut WorldContext,
    queue: &mut AddQueue,
) -> UpdateResult {
    let mut ctx = AbilityContext::new(user, world, queue);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| instance.ability.update(&mut ctx)));
    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            error!(
                user = %instance.user,
                id = %instance.id,
                ability = %instance.ability.description().key(),
                %err,
                "ability update failed"
            );
            UpdateResult::Remove
        }
        Err(payload) => {
            error!(
                user = %instance.user,
                id = %instance.id,
                ability = %instance.ability.description().key(),
                panic = %panic_message(payload.as_ref()),
                "ability update panicked"
            );
            UpdateResult::Remove
        }
    }
}

/// Update one effect, turning a panic into removal.
fn run_updatable(updatable: &mut dyn Updatable, world: &mut WorldContext) -> UpdateResult {
    match panic::catch_unwind(AssertUnwindSafe(|| updatable.update(world))) {
        Ok(result) => result,
        Err(payload) => {
            error!(
                world = %world.key(),
                panic = %panic_message(payload.as_ref()),
                "effect update panicked"
            );
            UpdateResult::Remove
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::BendingConfig;
    use crate::tests::helpers::{avatar, scripted, Recorder, Script};
    use crate::world::MemoryWorld;

    struct Setup {
        world: WorldContext,
        manager: AbilityManager,
        users: BenderRegistry,
    }

    fn setup() -> Setup {
        let mut users = BenderRegistry::new();
        users.register(avatar(1, "world")).unwrap();
        users.register(avatar(2, "world")).unwrap();
        Setup {
            world: WorldContext::new(Box::new(MemoryWorld::new("world")), &BendingConfig::default()),
            manager: AbilityManager::new(WorldKey::new("world")),
            users,
        }
    }

    impl Setup {
        fn user(&self, id: u64) -> &User {
            self.users.get(UserId::new(id)).unwrap()
        }

        fn activate(&mut self, id: u64, description: &Arc<AbilityDescription>) -> AbilityId {
            let user = self.users.get(UserId::new(id)).unwrap();
            self.manager
                .activate(user, description, Activation::Attack, &mut self.world)
                .unwrap()
        }

        fn update(&mut self) {
            self.manager.update(&self.users, &mut self.world);
        }

        fn ids(&self, id: u64) -> Vec<AbilityId> {
            self.manager
                .user_instances(UserId::new(id))
                .map(AbilityInstance::id)
                .collect()
        }
    }

    fn forever(name: &str, recorder: &Arc<Recorder>) -> Arc<AbilityDescription> {
        Arc::new(scripted(name, Script::Forever, recorder))
    }

    #[test]
    fn change_owner_moves_the_instance() {
        let mut setup = setup();
        let recorder = Arc::new(Recorder::default());
        let shield = forever("shield", &recorder);
        let id = setup.activate(1, &shield);
        setup.update();
        assert_eq!(setup.ids(1), vec![id]);

        let new_owner = setup.user(2).clone();
        assert!(setup.manager.change_owner(id, &new_owner));
        assert!(setup.ids(1).is_empty());
        assert_eq!(setup.ids(2), vec![id]);
        assert_eq!(setup.manager.get(id).map(AbilityInstance::user), Some(UserId::new(2)));

        // Already owned by user 2.
        assert!(!setup.manager.change_owner(id, &new_owner));
        setup.update();
        assert_eq!(recorder.updates(), 2);
    }

    #[test]
    fn destroying_by_type_spares_other_types_and_users() {
        let mut setup = setup();
        let (blast_recorder, wall_recorder) = (Arc::new(Recorder::default()), Arc::new(Recorder::default()));
        let blast = forever("blast", &blast_recorder);
        let wall = forever("wall", &wall_recorder);
        setup.activate(1, &blast);
        setup.activate(1, &wall);
        let others = setup.activate(2, &blast);
        setup.update();

        let Setup {
            world, manager, ..
        } = &mut setup;
        assert!(manager.destroy_instance_type(UserId::new(1), blast.key(), world));
        assert_eq!(blast_recorder.destroyed(), 1);
        assert_eq!(wall_recorder.destroyed(), 0);
        assert!(manager.has_ability(UserId::new(1), wall.key()));
        assert!(!manager.has_ability(UserId::new(1), blast.key()));
        assert!(manager.get(others).is_some());
        assert!(!manager.destroy_instance_type(UserId::new(1), blast.key(), world));
    }

    #[test]
    fn predicate_destroys_matching_live_and_queued_instances() {
        let mut setup = setup();
        let (blast_recorder, wall_recorder) = (Arc::new(Recorder::default()), Arc::new(Recorder::default()));
        let blast = forever("blast", &blast_recorder);
        let wall = forever("wall", &wall_recorder);
        setup.activate(1, &blast);
        let wall_id = setup.activate(1, &wall);
        let others = setup.activate(2, &blast);
        setup.update();
        // Still queued until the next update.
        setup.activate(1, &blast);

        let key = blast.key().clone();
        let Setup {
            world, manager, ..
        } = &mut setup;
        assert!(manager.destroy_user_instances(
            UserId::new(1),
            |ability| ability.description().key() == &key,
            world,
        ));
        assert_eq!(blast_recorder.destroyed(), 2);
        assert_eq!(wall_recorder.destroyed(), 0);

        setup.update();
        assert_eq!(setup.ids(1), vec![wall_id]);
        assert_eq!(setup.ids(2), vec![others]);
    }

    struct Exploding;

    impl Updatable for Exploding {
        fn update(&mut self, _world: &mut WorldContext) -> UpdateResult {
            panic!("effect exploded");
        }
    }

    struct Ticking(Arc<AtomicUsize>);

    impl Updatable for Ticking {
        fn update(&mut self, _world: &mut WorldContext) -> UpdateResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            UpdateResult::Continue
        }
    }

    #[test]
    fn panicking_effect_is_removed_without_stopping_the_tick() {
        let mut setup = setup();
        let recorder = Arc::new(Recorder::default());
        let shield = forever("shield", &recorder);
        let ticks = Arc::new(AtomicUsize::new(0));
        setup.manager.add_updatable(Box::new(Exploding));
        setup.manager.add_updatable(Box::new(Ticking(Arc::clone(&ticks))));
        setup.activate(1, &shield);

        setup.update();
        setup.update();
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert_eq!(setup.manager.updatable_count(), 1);
        assert_eq!(recorder.updates(), 2);
    }
}
