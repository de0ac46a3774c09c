//! Per-world collision pass.

use std::collections::{BTreeMap, BTreeSet};

use bending_geometry::{Bvh, Collider};
use tracing::trace;

use super::{Collision, CollisionRegistry};
use crate::ability::{AbilityId, AbilityKey, AbilityManager};
use crate::context::WorldContext;
use crate::user::UserId;

/// Colliders of one ability, gathered once per pass.
struct Participant {
    id: AbilityId,
    user: UserId,
    key: AbilityKey,
    colliders: Vec<Collider>,
}

/// Detects overlapping abilities and dispatches their collision callbacks.
///
/// Every `interval` ticks the manager gathers the colliders of every live
/// ability that appears in a registered pair, finds overlapping bounds with
/// a [`Bvh`], confirms them with [`Collider::intersects`] and notifies both
/// abilities. Abilities of the same user never collide. Each pair of
/// abilities is reported at most once per pass, even when several of their
/// colliders touch.
#[derive(Debug)]
pub struct CollisionManager {
    interval: u64,
    counter: u64,
}

impl CollisionManager {
    /// Create a manager that runs every `interval_ticks` ticks (at least 1).
    #[must_use]
    pub fn new(interval_ticks: u64) -> Self {
        Self {
            interval: interval_ticks.max(1),
            counter: 0,
        }
    }

    /// Ticks between passes.
    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Run one tick. Returns the number of collisions dispatched.
    pub fn update(
        &mut self,
        registry: &CollisionRegistry,
        abilities: &mut AbilityManager,
        world: &mut WorldContext,
    ) -> usize {
        self.counter += 1;
        if self.counter % self.interval != 0 || registry.is_empty() {
            return 0;
        }
        self.run(registry, abilities, world)
    }

    /// Run a pass immediately, ignoring the interval.
    pub fn run(
        &mut self,
        registry: &CollisionRegistry,
        abilities: &mut AbilityManager,
        world: &mut WorldContext,
    ) -> usize {
        let participants: Vec<Participant> = abilities
            .instances()
            .filter(|instance| registry.participates(instance.ability().description().key()))
            .map(|instance| Participant {
                id: instance.id(),
                user: instance.user(),
                key: instance.ability().description().key().clone(),
                colliders: instance.ability().colliders(),
            })
            .filter(|participant| !participant.colliders.is_empty())
            .collect();
        if participants.len() < 2 {
            return 0;
        }

        let contacts = find_contacts(registry, &participants);
        trace!(
            world = %world.key(),
            participants = participants.len(),
            contacts = contacts.len(),
            "collision pass"
        );

        let mut removed = BTreeSet::new();
        let mut dispatched = 0;
        for ((a, b), (ca, cb)) in contacts {
            let (first, second) = (&participants[a], &participants[b]);
            if removed.contains(&first.id) || removed.contains(&second.id) {
                continue;
            }
            let Some((remove_first, remove_second)) = registry.flags(&first.key, &second.key) else {
                continue;
            };
            let mut collision = Collision {
                ability: first.id,
                other: second.id,
                other_key: second.key.clone(),
                collider: first.colliders[ca],
                other_collider: second.colliders[cb],
                remove_self: remove_first,
                remove_other: remove_second,
            };
            if let Some(ability) = abilities.ability_mut(first.id) {
                ability.on_collision(&mut collision);
            }
            let mut mirrored = collision.symmetric(first.key.clone());
            if let Some(ability) = abilities.ability_mut(second.id) {
                ability.on_collision(&mut mirrored);
            }
            dispatched += 1;

            if mirrored.remove_other && abilities.destroy_instance(first.id, world) {
                removed.insert(first.id);
            }
            if mirrored.remove_self && abilities.destroy_instance(second.id, world) {
                removed.insert(second.id);
            }
        }
        dispatched
    }
}

/// Touching participant pairs, keyed by participant indices (lower first),
/// with the first touching collider pair found for each.
fn find_contacts(
    registry: &CollisionRegistry,
    participants: &[Participant],
) -> BTreeMap<(usize, usize), (usize, usize)> {
    let leaves = participants.iter().enumerate().flat_map(|(p, participant)| {
        participant
            .colliders
            .iter()
            .enumerate()
            .map(move |(c, collider)| (collider.bounds(), (p, c)))
    });
    let bvh = Bvh::build(leaves);

    let mut contacts = BTreeMap::new();
    for (&(pa, ca), &(pb, cb)) in bvh.query_all() {
        if pa == pb {
            continue;
        }
        let ((a, ca), (b, cb)) = if pa < pb {
            ((pa, ca), (pb, cb))
        } else {
            ((pb, cb), (pa, ca))
        };
        if contacts.contains_key(&(a, b)) {
            continue;
        }
        let (first, second) = (&participants[a], &participants[b]);
        if first.user == second.user || registry.flags(&first.key, &second.key).is_none() {
            continue;
        }
        if first.colliders[ca].intersects(&second.colliders[cb]) {
            contacts.insert((a, b), (ca, cb));
        }
    }
    contacts
}
