//! Ability metadata and the ability registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Ability;
use crate::error::{BendingError, Result};
use crate::user::Element;

/// Namespace used when a key is given without one.
pub const DEFAULT_NAMESPACE: &str = "bending";

/// Namespaced ability identifier, written `namespace:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbilityKey(Arc<str>);

impl AbilityKey {
    /// Key in the default namespace. `name` is lowercased.
    #[must_use]
    pub fn bending(name: &str) -> Self {
        Self(Arc::from(format!("{DEFAULT_NAMESPACE}:{}", name.to_lowercase())))
    }

    /// Parse `namespace:name` or a bare `name`.
    ///
    /// Both parts must be non-empty and use only `[a-z0-9_.-]` after
    /// lowercasing.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.to_lowercase();
        let (namespace, name) = match raw.split_once(':') {
            Some((namespace, name)) => (namespace, name),
            None => (DEFAULT_NAMESPACE, raw.as_str()),
        };
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.-".contains(c))
        };
        (valid(namespace) && valid(name)).then(|| Self(Arc::from(format!("{namespace}:{name}"))))
    }

    /// Namespace part.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map_or(DEFAULT_NAMESPACE, |(ns, _)| ns)
    }

    /// Name part.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.split_once(':').map_or(self.as_str(), |(_, name)| name)
    }

    /// Full key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AbilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User input that can activate an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// Left click
    Attack,
    /// Right click in the air
    Interact,
    /// Right click on an entity
    InteractEntity,
    /// Right click on a block
    InteractBlock,
    /// Start sneaking
    Sneak,
    /// Stop sneaking
    SneakRelease,
    /// Landing after a fall
    Fall,
    /// Always-on abilities, created on join and world change
    Passive,
    /// A completed combo
    Sequence,
}

impl Activation {
    /// Flag for this activation.
    #[must_use]
    pub const fn flag(self) -> Activations {
        match self {
            Self::Attack => Activations::ATTACK,
            Self::Interact => Activations::INTERACT,
            Self::InteractEntity => Activations::INTERACT_ENTITY,
            Self::InteractBlock => Activations::INTERACT_BLOCK,
            Self::Sneak => Activations::SNEAK,
            Self::SneakRelease => Activations::SNEAK_RELEASE,
            Self::Fall => Activations::FALL,
            Self::Passive => Activations::PASSIVE,
            Self::Sequence => Activations::SEQUENCE,
        }
    }

    /// Short label used in combo instructions.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Attack => "Left Click",
            Self::Interact => "Right Click Air",
            Self::InteractEntity => "Right Click Entity",
            Self::InteractBlock => "Right Click Block",
            Self::Sneak => "Hold Sneak",
            Self::SneakRelease => "Release Sneak",
            Self::Fall => "Fall",
            Self::Passive => "Passive",
            Self::Sequence => "Sequence",
        }
    }
}

bitflags! {
    /// Set of [`Activation`]s.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Activations: u16 {
        /// Left click
        const ATTACK = 1 << 0;
        /// Right click in the air
        const INTERACT = 1 << 1;
        /// Right click on an entity
        const INTERACT_ENTITY = 1 << 2;
        /// Right click on a block
        const INTERACT_BLOCK = 1 << 3;
        /// Start sneaking
        const SNEAK = 1 << 4;
        /// Stop sneaking
        const SNEAK_RELEASE = 1 << 5;
        /// Landing after a fall
        const FALL = 1 << 6;
        /// Passive
        const PASSIVE = 1 << 7;
        /// Combo
        const SEQUENCE = 1 << 8;
    }
}

impl From<Activation> for Activations {
    fn from(activation: Activation) -> Self {
        activation.flag()
    }
}

/// Creates a fresh ability instance for a description.
pub type AbilityFactory = Arc<dyn Fn(&Arc<AbilityDescription>) -> Box<dyn Ability> + Send + Sync>;

/// Immutable metadata of a registered ability.
///
/// Equality and hashing use the key only.
#[derive(Clone)]
pub struct AbilityDescription {
    key: AbilityKey,
    display_name: String,
    elements: Element,
    activations: Activations,
    permissions: Vec<String>,
    can_bind: bool,
    hidden: bool,
    bypass_cooldown: bool,
    factory: AbilityFactory,
}

impl AbilityDescription {
    /// Start describing an ability called `name`.
    ///
    /// The default permission node is `bending.ability.<name>`.
    pub fn builder<F>(name: &str, factory: F) -> AbilityDescriptionBuilder
    where
        F: Fn(&Arc<AbilityDescription>) -> Box<dyn Ability> + Send + Sync + 'static,
    {
        AbilityDescriptionBuilder {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            name: name.to_owned(),
            elements: Element::empty(),
            activations: Activations::empty(),
            permissions: None,
            can_bind: true,
            hidden: false,
            bypass_cooldown: false,
            factory: Arc::new(factory),
        }
    }

    /// Unique key.
    #[must_use]
    pub fn key(&self) -> &AbilityKey {
        &self.key
    }

    /// Name shown to players.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Required elements.
    #[must_use]
    pub fn elements(&self) -> Element {
        self.elements
    }

    /// Inputs that activate the ability.
    #[must_use]
    pub fn activations(&self) -> Activations {
        self.activations
    }

    /// Whether `method` activates the ability.
    #[must_use]
    pub fn is_activated_by(&self, method: Activation) -> bool {
        self.activations.contains(method.flag())
    }

    /// Required permission nodes.
    #[must_use]
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// Whether the ability can be bound to a slot.
    #[must_use]
    pub fn can_bind(&self) -> bool {
        self.can_bind
    }

    /// Whether the ability is hidden from listings.
    #[must_use]
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the ability ignores cooldowns.
    #[must_use]
    pub fn bypass_cooldown(&self) -> bool {
        self.bypass_cooldown
    }

    /// Create a fresh, inactive instance.
    #[must_use]
    pub fn create_ability(self: &Arc<Self>) -> Box<dyn Ability> {
        (self.factory)(self)
    }
}

impl fmt::Debug for AbilityDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityDescription")
            .field("key", &self.key)
            .field("elements", &self.elements)
            .field("activations", &self.activations)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for AbilityDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

impl PartialEq for AbilityDescription {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AbilityDescription {}

impl Hash for AbilityDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Builder for [`AbilityDescription`].
pub struct AbilityDescriptionBuilder {
    namespace: String,
    name: String,
    elements: Element,
    activations: Activations,
    permissions: Option<Vec<String>>,
    can_bind: bool,
    hidden: bool,
    bypass_cooldown: bool,
    factory: AbilityFactory,
}

impl AbilityDescriptionBuilder {
    /// Namespace (defaults to `bending`).
    #[must_use]
    pub fn namespace(mut self, namespace: &str) -> Self {
        namespace.clone_into(&mut self.namespace);
        self
    }

    /// Required elements.
    #[must_use]
    pub fn element(mut self, elements: Element) -> Self {
        self.elements = elements;
        self
    }

    /// Activation inputs.
    #[must_use]
    pub fn activation(mut self, activations: impl Into<Activations>) -> Self {
        self.activations |= activations.into();
        self
    }

    /// Replace the default permission nodes.
    #[must_use]
    pub fn permissions(mut self, nodes: &[&str]) -> Self {
        self.permissions = Some(nodes.iter().map(|&n| n.to_owned()).collect());
        self
    }

    /// Whether the ability can be bound (defaults to true).
    #[must_use]
    pub fn can_bind(mut self, can_bind: bool) -> Self {
        self.can_bind = can_bind;
        self
    }

    /// Hide from listings.
    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Ignore cooldowns.
    #[must_use]
    pub fn bypass_cooldown(mut self, bypass: bool) -> Self {
        self.bypass_cooldown = bypass;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::InvalidDescription`] for an invalid key, no
    /// elements, or no activations. Passive and combo abilities cannot be
    /// bound.
    pub fn build(self) -> Result<AbilityDescription> {
        let raw = format!("{}:{}", self.namespace, self.name);
        let key = AbilityKey::parse(&raw)
            .ok_or_else(|| BendingError::InvalidDescription(format!("invalid key {raw:?}")))?;
        if self.elements.is_empty() {
            return Err(BendingError::InvalidDescription(format!("{key} has no element")));
        }
        if self.activations.is_empty() {
            return Err(BendingError::InvalidDescription(format!(
                "{key} has no activation method"
            )));
        }
        let unbindable = self
            .activations
            .intersects(Activations::PASSIVE | Activations::SEQUENCE);
        let permissions = self
            .permissions
            .unwrap_or_else(|| vec![format!("bending.ability.{}", key.name())]);
        Ok(AbilityDescription {
            display_name: self.name,
            key,
            elements: self.elements,
            activations: self.activations,
            permissions,
            can_bind: self.can_bind && !unbindable,
            hidden: self.hidden,
            bypass_cooldown: self.bypass_cooldown,
            factory: self.factory,
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Every registered ability, plus the set disabled by configuration.
#[derive(Debug, Default)]
pub struct AbilityRegistry {
    abilities: BTreeMap<AbilityKey, Arc<AbilityDescription>>,
    disabled: BTreeSet<AbilityKey>,
}

impl AbilityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a description.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::DuplicateAbility`] if the key is taken.
    pub fn register(&mut self, description: AbilityDescription) -> Result<Arc<AbilityDescription>> {
        let key = description.key().clone();
        if self.abilities.contains_key(&key) {
            return Err(BendingError::DuplicateAbility(key));
        }
        let description = Arc::new(description);
        self.abilities.insert(key.clone(), Arc::clone(&description));
        info!(ability = %key, "registered ability");
        Ok(description)
    }

    /// Description by key, enabled or not.
    #[must_use]
    pub fn get(&self, key: &AbilityKey) -> Option<&Arc<AbilityDescription>> {
        self.abilities.get(key)
    }

    /// Enabled description by key.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::UnknownAbility`] or [`BendingError::DisabledAbility`].
    pub fn enabled(&self, key: &AbilityKey) -> Result<&Arc<AbilityDescription>> {
        let description = self
            .abilities
            .get(key)
            .ok_or_else(|| BendingError::UnknownAbility(key.clone()))?;
        if self.disabled.contains(key) {
            return Err(BendingError::DisabledAbility(key.clone()));
        }
        Ok(description)
    }

    /// Whether `key` is registered and enabled.
    #[must_use]
    pub fn is_enabled(&self, key: &AbilityKey) -> bool {
        self.abilities.contains_key(key) && !self.disabled.contains(key)
    }

    /// Disable `key`. Unknown keys are remembered in case they register later.
    pub fn disable(&mut self, key: AbilityKey) {
        self.disabled.insert(key);
    }

    /// Re-enable `key`.
    pub fn enable(&mut self, key: &AbilityKey) {
        self.disabled.remove(key);
    }

    /// Every registered description, in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<AbilityDescription>> + '_ {
        self.abilities.values()
    }

    /// Enabled passive abilities.
    pub fn passives(&self) -> impl Iterator<Item = &Arc<AbilityDescription>> + '_ {
        self.abilities
            .values()
            .filter(|d| d.is_activated_by(Activation::Passive) && !self.disabled.contains(d.key()))
    }

    /// Number of registered abilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }
}
