//! Combo input: ordered actions that trigger a sequence ability.
//!
//! Every input action a user makes (the ability in their selected slot plus
//! how it was used) is appended to a short per-user buffer. After each
//! action the buffer's tail is compared against every registered
//! [`Sequence`]; the match is exact and contiguous, so `[A, B, D, C]` does
//! not trigger a sequence of `[A, B, C]`. The first registered sequence that
//! matches, and that the user may bend, wins and the buffer is cleared.
//!
//! ```
//! use bending_core::ability::{AbilityKey, Activation};
//! use bending_core::sequence::SequenceStep;
//!
//! let step = SequenceStep::new(AbilityKey::bending("firewall"), Activation::Sneak);
//! assert_eq!(step.to_string(), "bending:firewall (Hold Sneak)");
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ability::{AbilityDescription, AbilityKey, AbilityRegistry, Activation};
use crate::config::SequenceConfig;
use crate::error::{BendingError, Result};
use crate::user::{User, UserId};

/// Longest sequence that can be registered.
pub const MAX_STEPS: usize = 16;

/// One input action: an ability used with an activation method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceStep {
    ability: AbilityKey,
    activation: Activation,
}

impl SequenceStep {
    /// Create a step.
    #[must_use]
    pub fn new(ability: AbilityKey, activation: Activation) -> Self {
        Self { ability, activation }
    }

    /// Ability used.
    #[must_use]
    pub fn ability(&self) -> &AbilityKey {
        &self.ability
    }

    /// How it was used.
    #[must_use]
    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ability, self.activation.label())
    }
}

/// An ordered list of steps that activates an ability.
#[derive(Debug, Clone)]
pub struct Sequence {
    description: Arc<AbilityDescription>,
    steps: Vec<SequenceStep>,
}

impl Sequence {
    /// Create a sequence for `description`.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::InvalidSequence`] if there are no steps, more
    /// than [`MAX_STEPS`] steps, or the ability is not activated by sequence.
    pub fn new(description: Arc<AbilityDescription>, steps: Vec<SequenceStep>) -> Result<Self> {
        let invalid = |reason: &str| BendingError::InvalidSequence {
            key: description.key().clone(),
            reason: reason.to_owned(),
        };
        if steps.is_empty() {
            return Err(invalid("no steps"));
        }
        if steps.len() > MAX_STEPS {
            return Err(invalid("too many steps"));
        }
        if !description.is_activated_by(Activation::Sequence) {
            return Err(invalid("ability is not activated by sequence"));
        }
        Ok(Self { description, steps })
    }

    /// Ability the sequence activates.
    #[must_use]
    pub fn description(&self) -> &Arc<AbilityDescription> {
        &self.description
    }

    /// Required steps, oldest first.
    #[must_use]
    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    /// Whether the last steps of `buffer` are exactly this sequence.
    #[must_use]
    pub fn matches(&self, buffer: &[SequenceStep]) -> bool {
        buffer.ends_with(&self.steps)
    }

    /// Human-readable steps, e.g. `bending:a (Hold Sneak) > bending:b (Left Click)`.
    #[must_use]
    pub fn instructions(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

/// Registered sequences, in registration order.
#[derive(Debug, Default)]
pub struct SequenceRegistry {
    sequences: Vec<Sequence>,
}

impl SequenceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sequence.
    ///
    /// # Errors
    ///
    /// The sequence ability and every step ability must be registered and
    /// enabled in `abilities`; otherwise [`BendingError::UnknownAbility`] or
    /// [`BendingError::DisabledAbility`] is returned and nothing changes. A
    /// second sequence for the same ability is
    /// [`BendingError::DuplicateAbility`].
    pub fn register(&mut self, sequence: Sequence, abilities: &AbilityRegistry) -> Result<()> {
        let key = sequence.description.key();
        let checked = std::iter::once(key)
            .chain(sequence.steps.iter().map(SequenceStep::ability))
            .try_for_each(|step| abilities.enabled(step).map(|_| ()));
        if let Err(err) = checked {
            warn!(sequence = %key, %err, "rejected sequence");
            return Err(err);
        }
        if self.get(key).is_some() {
            warn!(sequence = %key, "sequence already registered");
            return Err(BendingError::DuplicateAbility(key.clone()));
        }
        self.sequences.push(sequence);
        Ok(())
    }

    /// Sequence that activates `key`.
    #[must_use]
    pub fn get(&self, key: &AbilityKey) -> Option<&Sequence> {
        self.sequences
            .iter()
            .find(|sequence| sequence.description.key() == key)
    }

    /// Unregister the sequence for `key`.
    pub fn remove(&mut self, key: &AbilityKey) -> Option<Sequence> {
        let index = self
            .sequences
            .iter()
            .position(|sequence| sequence.description.key() == key)?;
        Some(self.sequences.remove(index))
    }

    /// Sequences in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Sequence> + '_ {
        self.sequences.iter()
    }

    /// Remove every sequence.
    pub fn clear(&mut self) {
        self.sequences.clear();
    }

    /// Number of sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

#[derive(Debug, Default)]
struct Buffer {
    steps: VecDeque<SequenceStep>,
    last_input: u64,
}

/// Per-user input buffers.
#[derive(Debug)]
pub struct SequenceManager {
    capacity: usize,
    expiry_millis: u64,
    buffers: BTreeMap<UserId, Buffer>,
}

impl SequenceManager {
    /// Create a manager from configuration.
    #[must_use]
    pub fn new(config: &SequenceConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            expiry_millis: config.expiry_millis,
            buffers: BTreeMap::new(),
        }
    }

    /// Record `user` using their selected ability with `activation`.
    ///
    /// Does nothing if the selected slot is empty. See
    /// [`register_step`](Self::register_step).
    pub fn register_action(
        &mut self,
        user: &User,
        activation: Activation,
        now: u64,
        sequences: &SequenceRegistry,
        abilities: &AbilityRegistry,
    ) -> Option<Arc<AbilityDescription>> {
        let ability = user.selected_ability()?.clone();
        self.register_step(user, SequenceStep::new(ability, activation), now, sequences, abilities)
    }

    /// Append `step` to `user`'s buffer and look for a completed sequence.
    ///
    /// A buffer idle for longer than the expiry is discarded first; a full
    /// buffer drops its oldest step. On a match the buffer is cleared and the
    /// sequence ability is returned for activation.
    pub fn register_step(
        &mut self,
        user: &User,
        step: SequenceStep,
        now: u64,
        sequences: &SequenceRegistry,
        abilities: &AbilityRegistry,
    ) -> Option<Arc<AbilityDescription>> {
        let buffer = self.buffers.entry(user.id()).or_default();
        if now.saturating_sub(buffer.last_input) > self.expiry_millis {
            buffer.steps.clear();
        }
        buffer.last_input = now;
        buffer.steps.push_back(step);
        while buffer.steps.len() > self.capacity {
            buffer.steps.pop_front();
        }

        let window = buffer.steps.make_contiguous();
        let description = sequences
            .iter()
            .find(|sequence| {
                sequence.matches(window)
                    && abilities.is_enabled(sequence.description.key())
                    && user.can_bend(&sequence.description)
            })
            .map(|sequence| Arc::clone(&sequence.description))?;
        buffer.steps.clear();
        debug!(user = %user.id(), sequence = %description.key(), "sequence matched");
        Some(description)
    }

    /// Steps currently buffered for `user`, oldest first.
    #[must_use]
    pub fn buffered(&self, user: UserId) -> Vec<SequenceStep> {
        self.buffers
            .get(&user)
            .map(|buffer| buffer.steps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop buffers idle for longer than the expiry.
    pub fn expire(&mut self, now: u64) {
        let expiry = self.expiry_millis;
        self.buffers
            .retain(|_, buffer| now.saturating_sub(buffer.last_input) <= expiry);
    }

    /// Forget `user`'s buffer.
    pub fn remove_user(&mut self, user: UserId) {
        self.buffers.remove(&user);
    }

    /// Forget every buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Number of users with a buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if no user has a buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{noop_description, test_user, Noop};
    use crate::user::Element;

    struct Setup {
        abilities: AbilityRegistry,
        sequences: SequenceRegistry,
        keys: Vec<AbilityKey>,
        combo: Arc<AbilityDescription>,
    }

    fn combo_description(name: &str) -> AbilityDescription {
        AbilityDescription::builder(name, Noop::factory)
            .element(Element::FIRE)
            .activation(Activation::Sequence)
            .build()
            .unwrap()
    }

    fn setup() -> Setup {
        let mut abilities = AbilityRegistry::new();
        let keys: Vec<AbilityKey> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| {
                abilities
                    .register(noop_description(name, Element::FIRE))
                    .unwrap()
                    .key()
                    .clone()
            })
            .collect();
        let combo = abilities.register(combo_description("combo")).unwrap();
        let mut sequences = SequenceRegistry::new();
        let steps = keys[..3]
            .iter()
            .map(|key| SequenceStep::new(key.clone(), Activation::Attack))
            .collect();
        sequences
            .register(Sequence::new(Arc::clone(&combo), steps).unwrap(), &abilities)
            .unwrap();
        Setup {
            abilities,
            sequences,
            keys,
            combo,
        }
    }

    fn bender() -> User {
        let mut user = test_user(1, "world");
        user.add_elements(Element::FIRE);
        user
    }

    fn feed(manager: &mut SequenceManager, setup: &Setup, user: &User, keys: &[usize]) -> bool {
        let mut matched = false;
        for (i, &key) in keys.iter().enumerate() {
            let step = SequenceStep::new(setup.keys[key].clone(), Activation::Attack);
            matched = manager
                .register_step(user, step, i as u64 * 50, &setup.sequences, &setup.abilities)
                .is_some();
        }
        matched
    }

    #[test]
    fn exact_trailing_window_activates_and_clears() {
        let setup = setup();
        let user = bender();
        let mut manager = SequenceManager::new(&SequenceConfig::default());
        assert!(feed(&mut manager, &setup, &user, &[3, 0, 1, 2]));
        assert!(manager.buffered(user.id()).is_empty());
    }

    #[test]
    fn interrupted_sequence_does_not_activate() {
        let setup = setup();
        let user = bender();
        let mut manager = SequenceManager::new(&SequenceConfig::default());
        assert!(!feed(&mut manager, &setup, &user, &[0, 1, 3, 2]));
        assert_eq!(manager.buffered(user.id()).len(), 4);
    }

    #[test]
    fn wrong_activation_does_not_match() {
        let setup = setup();
        let user = bender();
        let mut manager = SequenceManager::new(&SequenceConfig::default());
        feed(&mut manager, &setup, &user, &[0, 1]);
        let step = SequenceStep::new(setup.keys[2].clone(), Activation::Sneak);
        assert!(manager
            .register_step(&user, step, 150, &setup.sequences, &setup.abilities)
            .is_none());
    }

    #[test]
    fn requires_permission_to_bend_the_sequence() {
        let setup = setup();
        let user = test_user(1, "world");
        let mut manager = SequenceManager::new(&SequenceConfig::default());
        assert!(!feed(&mut manager, &setup, &user, &[0, 1, 2]));
        assert_eq!(manager.buffered(user.id()).len(), 3);
    }

    #[test]
    fn idle_buffers_expire() {
        let setup = setup();
        let user = bender();
        let config = SequenceConfig {
            capacity: 16,
            expiry_millis: 100,
        };
        let mut manager = SequenceManager::new(&config);
        let step = |key: usize| SequenceStep::new(setup.keys[key].clone(), Activation::Attack);
        manager.register_step(&user, step(0), 0, &setup.sequences, &setup.abilities);
        manager.register_step(&user, step(1), 50, &setup.sequences, &setup.abilities);
        let matched = manager.register_step(&user, step(2), 500, &setup.sequences, &setup.abilities);
        assert!(matched.is_none());
        assert_eq!(manager.buffered(user.id()), vec![step(2)]);

        manager.expire(1_000);
        assert!(manager.is_empty());
    }

    #[test]
    fn full_buffer_drops_oldest_step() {
        let setup = setup();
        let user = bender();
        let config = SequenceConfig {
            capacity: 2,
            expiry_millis: 10_000,
        };
        let mut manager = SequenceManager::new(&config);
        // A three-step sequence never fits in two slots
        assert!(!feed(&mut manager, &setup, &user, &[0, 1, 2]));
        let buffered = manager.buffered(user.id());
        assert_eq!(buffered.len(), 2);
        assert_eq!(buffered[0].ability(), &setup.keys[1]);
    }

    #[test]
    fn registration_rejects_disabled_or_unknown_steps() {
        let mut setup = setup();
        let steps = vec![SequenceStep::new(AbilityKey::bending("ghost"), Activation::Attack)];
        let other = setup.abilities.register(combo_description("other")).unwrap();
        let err = setup
            .sequences
            .register(Sequence::new(Arc::clone(&other), steps).unwrap(), &setup.abilities)
            .unwrap_err();
        assert!(matches!(err, BendingError::UnknownAbility(_)));

        setup.abilities.disable(setup.keys[3].clone());
        let steps = vec![SequenceStep::new(setup.keys[3].clone(), Activation::Attack)];
        let err = setup
            .sequences
            .register(Sequence::new(other, steps).unwrap(), &setup.abilities)
            .unwrap_err();
        assert!(matches!(err, BendingError::DisabledAbility(_)));
        assert_eq!(setup.sequences.len(), 1);
    }

    #[test]
    fn sequence_validation() {
        let setup = setup();
        assert!(Sequence::new(Arc::clone(&setup.combo), Vec::new()).is_err());
        let step = SequenceStep::new(setup.keys[0].clone(), Activation::Attack);
        let long = vec![step.clone(); MAX_STEPS + 1];
        assert!(Sequence::new(Arc::clone(&setup.combo), long).is_err());
        let plain = Arc::new(noop_description("plain", Element::FIRE));
        assert!(Sequence::new(plain, vec![step]).is_err());

        let sequence = setup.sequences.get(setup.combo.key()).unwrap();
        assert_eq!(
            sequence.instructions(),
            "bending:a (Left Click) > bending:b (Left Click) > bending:c (Left Click)"
        );
    }
}
