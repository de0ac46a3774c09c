//! Ability-versus-ability collisions.
//!
//! Which abilities interact, and who is removed when they do, is declared up
//! front as a set of [`CollisionPair`]s. [`CollisionPairBuilder`] expands
//! layered declarations into pairs: abilities in the same layer cancel each
//! other, and a higher layer overpowers every lower one.

mod manager;

pub use manager::CollisionManager;

use std::collections::{BTreeSet, HashMap};

use bending_geometry::Collider;
use tracing::warn;

use crate::ability::{AbilityId, AbilityKey, AbilityRegistry};
use crate::error::{BendingError, Result};

/// An unordered pair of abilities that collide, with removal flags.
///
/// Two pairs are equal when they name the same abilities, in either order,
/// with the flags swapped to match.
#[derive(Debug, Clone)]
pub struct CollisionPair {
    first: AbilityKey,
    second: AbilityKey,
    remove_first: bool,
    remove_second: bool,
}

impl CollisionPair {
    /// Create a pair.
    #[must_use]
    pub fn new(first: AbilityKey, second: AbilityKey, remove_first: bool, remove_second: bool) -> Self {
        Self {
            first,
            second,
            remove_first,
            remove_second,
        }
    }

    /// First ability.
    #[must_use]
    pub fn first(&self) -> &AbilityKey {
        &self.first
    }

    /// Second ability.
    #[must_use]
    pub fn second(&self) -> &AbilityKey {
        &self.second
    }

    /// Whether `first` is removed on collision.
    #[must_use]
    pub fn remove_first(&self) -> bool {
        self.remove_first
    }

    /// Whether `second` is removed on collision.
    #[must_use]
    pub fn remove_second(&self) -> bool {
        self.remove_second
    }

    /// Removal flags oriented as `(a, b)`, if this pair names `a` and `b`.
    #[must_use]
    pub fn flags_for(&self, a: &AbilityKey, b: &AbilityKey) -> Option<(bool, bool)> {
        if &self.first == a && &self.second == b {
            Some((self.remove_first, self.remove_second))
        } else if &self.first == b && &self.second == a {
            Some((self.remove_second, self.remove_first))
        } else {
            None
        }
    }

    /// Order-independent identity of the pair.
    fn id(&self) -> (AbilityKey, AbilityKey) {
        if self.first <= self.second {
            (self.first.clone(), self.second.clone())
        } else {
            (self.second.clone(), self.first.clone())
        }
    }
}

impl PartialEq for CollisionPair {
    fn eq(&self, other: &Self) -> bool {
        other.flags_for(&self.first, &self.second) == Some((self.remove_first, self.remove_second))
    }
}

impl Eq for CollisionPair {}

/// Expands layered and explicit declarations into [`CollisionPair`]s.
///
/// ```
/// use std::sync::Arc;
/// use bending_core::ability::{AbilityKey, AbilityRegistry};
/// use bending_core::collision::CollisionPairBuilder;
///
/// let registry = AbilityRegistry::new();
/// let pairs = CollisionPairBuilder::new(&registry).build();
/// assert!(pairs.unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct CollisionPairBuilder<'r> {
    registry: &'r AbilityRegistry,
    layers: Vec<Vec<AbilityKey>>,
    simple: Vec<CollisionPair>,
}

impl<'r> CollisionPairBuilder<'r> {
    /// Start building against the abilities in `registry`.
    #[must_use]
    pub fn new(registry: &'r AbilityRegistry) -> Self {
        Self {
            registry,
            layers: Vec::new(),
            simple: Vec::new(),
        }
    }

    /// Add a layer above every layer added so far.
    ///
    /// Abilities in the layer remove each other (including two instances of
    /// the same ability); they remove anything in a lower layer and survive it.
    #[must_use]
    pub fn layer(mut self, keys: &[AbilityKey]) -> Self {
        self.layers.push(keys.to_vec());
        self
    }

    /// Add an explicit pair. Explicit pairs win over layer-derived ones.
    #[must_use]
    pub fn add(mut self, first: &AbilityKey, second: &AbilityKey, remove_first: bool, remove_second: bool) -> Self {
        self.simple
            .push(CollisionPair::new(first.clone(), second.clone(), remove_first, remove_second));
        self
    }

    /// Add `first` against each of `others` with the same flags.
    #[must_use]
    pub fn add_many(mut self, first: &AbilityKey, others: &[AbilityKey], remove_first: bool, remove_second: bool) -> Self {
        for other in others {
            self = self.add(first, other, remove_first, remove_second);
        }
        self
    }

    /// Validate every key and produce the deduplicated pair set.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownAbility`] or
    /// [`BendingError::DisabledAbility`] for the first key that is not
    /// registered and enabled.
    pub fn build(self) -> Result<Vec<CollisionPair>> {
        let mut pairs = Vec::new();
        pairs.extend(self.simple);
        for (index, layer) in self.layers.iter().enumerate() {
            for (i, first) in layer.iter().enumerate() {
                for second in &layer[i..] {
                    pairs.push(CollisionPair::new(first.clone(), second.clone(), true, true));
                }
            }
            for lower in &self.layers[..index] {
                for weak in lower {
                    for strong in layer {
                        pairs.push(CollisionPair::new(weak.clone(), strong.clone(), true, false));
                    }
                }
            }
        }

        check_enabled(&pairs, self.registry)?;
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if seen.insert(pair.id()) {
                unique.push(pair);
            }
        }
        Ok(unique)
    }
}

/// The active collision pair set, indexed for lookup by ability key.
#[derive(Debug, Default)]
pub struct CollisionRegistry {
    pairs: HashMap<(AbilityKey, AbilityKey), CollisionPair>,
    participants: BTreeSet<AbilityKey>,
}

impl CollisionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add pairs after checking every key against `abilities`.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownAbility`] or
    /// [`BendingError::DisabledAbility`]; no pair is added in that case.
    pub fn register(&mut self, pairs: Vec<CollisionPair>, abilities: &AbilityRegistry) -> Result<()> {
        check_enabled(&pairs, abilities)?;
        self.register_all(pairs);
        Ok(())
    }

    /// Add pairs without validation. A pair naming the same abilities as an
    /// existing one is ignored.
    pub fn register_all(&mut self, pairs: impl IntoIterator<Item = CollisionPair>) {
        for pair in pairs {
            self.participants.insert(pair.first.clone());
            self.participants.insert(pair.second.clone());
            self.pairs.entry(pair.id()).or_insert(pair);
        }
    }

    /// Replace the whole set.
    pub fn rebuild(&mut self, pairs: impl IntoIterator<Item = CollisionPair>) {
        self.clear();
        self.register_all(pairs);
    }

    /// Removal flags for `a` colliding with `b`, oriented as `(a, b)`.
    #[must_use]
    pub fn flags(&self, a: &AbilityKey, b: &AbilityKey) -> Option<(bool, bool)> {
        let id = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        self.pairs.get(&id).and_then(|pair| pair.flags_for(a, b))
    }

    /// Whether `key` appears in any pair.
    #[must_use]
    pub fn participates(&self, key: &AbilityKey) -> bool {
        self.participants.contains(key)
    }

    /// Remove every pair.
    pub fn clear(&mut self) {
        self.pairs.clear();
        self.participants.clear();
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no pair is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Every key of every pair must name a registered, enabled ability.
fn check_enabled(pairs: &[CollisionPair], abilities: &AbilityRegistry) -> Result<()> {
    for pair in pairs {
        for key in [&pair.first, &pair.second] {
            if let Err(err) = abilities.enabled(key) {
                warn!(first = %pair.first, second = %pair.second, %err, "rejected collision pair");
                return Err(err);
            }
        }
    }
    Ok(())
}

/// A detected collision, as seen from one side.
///
/// Both sides' `on_collision` callbacks may change the removal flags; the
/// second side sees the first side's decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    /// Ability receiving the callback
    pub ability: AbilityId,
    /// The other ability
    pub other: AbilityId,
    /// Key of the other ability
    pub other_key: AbilityKey,
    /// Our collider that was hit
    pub collider: Collider,
    /// The other ability's collider
    pub other_collider: Collider,
    /// Whether we are removed
    pub remove_self: bool,
    /// Whether the other ability is removed
    pub remove_other: bool,
}

impl Collision {
    /// The same collision seen from the other side.
    #[must_use]
    pub fn symmetric(&self, own_key: AbilityKey) -> Self {
        Self {
            ability: self.other,
            other: self.ability,
            other_key: own_key,
            collider: self.other_collider,
            other_collider: self.collider,
            remove_self: self.remove_other,
            remove_other: self.remove_self,
        }
    }
}
