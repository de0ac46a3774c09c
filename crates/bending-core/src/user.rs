//! Benders: players and non-player entities that own abilities.
//!
//! A [`User`] holds the engine-side state of a bender (elements, slot
//! bindings, current world). Anything that depends on the host (position,
//! permissions, build protection) is reached through the
//! [`UserCapabilities`] trait object supplied at registration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ability::{AbilityDescription, AbilityKey};
use crate::error::{BendingError, Result};
use crate::world::{BlockPos, EntityId, WorldKey};

/// Number of hotbar slots.
pub const SLOTS: usize = 9;

/// Unique identifier of a bender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// Create a new user ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw ID.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User({})", self.0)
    }
}

bitflags! {
    /// Bending elements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Element: u8 {
        /// Air
        const AIR = 1 << 0;
        /// Water
        const WATER = 1 << 1;
        /// Earth
        const EARTH = 1 << 2;
        /// Fire
        const FIRE = 1 << 3;
    }
}

/// Player game mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    /// Survival
    #[default]
    Survival,
    /// Creative
    Creative,
    /// Adventure
    Adventure,
    /// Spectator
    Spectator,
}

/// What kind of entity a bender is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserKind {
    /// A connected player
    Player {
        /// Current game mode
        game_mode: GameMode,
    },
    /// A mob or other server-controlled bender
    NonPlayer,
}

/// Host-backed queries about a bender.
pub trait UserCapabilities: Send + Sync {
    /// Eye position.
    fn location(&self) -> Vec3;

    /// Look direction (unit vector).
    fn direction(&self) -> Vec3 {
        Vec3::Z
    }

    /// Whether the bender holds a permission node.
    fn has_permission(&self, _node: &str) -> bool {
        true
    }

    /// Whether region protection lets the bender modify `pos`.
    fn can_build(&self, _pos: BlockPos) -> bool {
        true
    }

    /// Whether the bender is sneaking.
    fn is_sneaking(&self) -> bool {
        false
    }
}

/// Capabilities with a fixed location and every permission granted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCapabilities {
    /// Eye position
    pub location: Vec3,
    /// Look direction
    pub direction: Vec3,
}

impl UserCapabilities for FixedCapabilities {
    fn location(&self) -> Vec3 {
        self.location
    }

    fn direction(&self) -> Vec3 {
        self.direction
    }
}

/// A bender.
#[derive(Clone)]
pub struct User {
    id: UserId,
    entity: EntityId,
    name: String,
    world: WorldKey,
    kind: UserKind,
    elements: Element,
    slots: [Option<AbilityKey>; SLOTS],
    selected: usize,
    capabilities: Arc<dyn UserCapabilities>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("world", &self.world)
            .field("kind", &self.kind)
            .field("elements", &self.elements)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl User {
    /// Create a bender with no elements and empty slots.
    #[must_use]
    pub fn new(
        id: UserId,
        entity: EntityId,
        name: impl Into<String>,
        world: WorldKey,
        kind: UserKind,
        capabilities: Arc<dyn UserCapabilities>,
    ) -> Self {
        Self {
            id,
            entity,
            name: name.into(),
            world,
            kind,
            elements: Element::empty(),
            slots: Default::default(),
            selected: 0,
            capabilities,
        }
    }

    /// User ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Host entity backing this bender.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World the bender is in.
    #[must_use]
    pub fn world(&self) -> &WorldKey {
        &self.world
    }

    pub(crate) fn set_world(&mut self, world: WorldKey) {
        self.world = world;
    }

    /// Player or non-player.
    #[must_use]
    pub fn kind(&self) -> UserKind {
        self.kind
    }

    /// Whether the bender is a player.
    #[must_use]
    pub fn is_player(&self) -> bool {
        matches!(self.kind, UserKind::Player { .. })
    }

    /// Whether the bender is a spectating player.
    #[must_use]
    pub fn is_spectator(&self) -> bool {
        matches!(
            self.kind,
            UserKind::Player {
                game_mode: GameMode::Spectator
            }
        )
    }

    /// Elements the bender can use.
    #[must_use]
    pub fn elements(&self) -> Element {
        self.elements
    }

    /// Grant elements.
    pub fn add_elements(&mut self, elements: Element) {
        self.elements |= elements;
    }

    /// Revoke elements.
    pub fn remove_elements(&mut self, elements: Element) {
        self.elements &= !elements;
    }

    /// Bind `ability` to `slot` (0-based). Returns false for invalid slots.
    pub fn bind(&mut self, slot: usize, ability: Option<AbilityKey>) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = ability;
                true
            }
            None => false,
        }
    }

    /// Ability bound to `slot`.
    #[must_use]
    pub fn bound(&self, slot: usize) -> Option<&AbilityKey> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Select a hotbar slot. Returns false for invalid slots.
    pub fn select(&mut self, slot: usize) -> bool {
        if slot < SLOTS {
            self.selected = slot;
            true
        } else {
            false
        }
    }

    /// Selected slot.
    #[must_use]
    pub fn selected_slot(&self) -> usize {
        self.selected
    }

    /// Ability bound to the selected slot.
    #[must_use]
    pub fn selected_ability(&self) -> Option<&AbilityKey> {
        self.bound(self.selected)
    }

    /// Eye position.
    #[must_use]
    pub fn location(&self) -> Vec3 {
        self.capabilities.location()
    }

    /// Look direction.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.capabilities.direction()
    }

    /// Block the bender stands in.
    #[must_use]
    pub fn block(&self) -> BlockPos {
        BlockPos::containing(self.location())
    }

    /// Whether the bender is sneaking.
    #[must_use]
    pub fn is_sneaking(&self) -> bool {
        self.capabilities.is_sneaking()
    }

    /// Whether the bender holds a permission node.
    #[must_use]
    pub fn has_permission(&self, node: &str) -> bool {
        self.capabilities.has_permission(node)
    }

    /// Whether the bender may modify `pos`.
    #[must_use]
    pub fn can_build(&self, pos: BlockPos) -> bool {
        self.capabilities.can_build(pos)
    }

    /// Whether the bender may use `description` right now.
    ///
    /// Spectators cannot bend. Otherwise the bender needs every element of
    /// the ability and every permission it lists.
    #[must_use]
    pub fn can_bend(&self, description: &AbilityDescription) -> bool {
        !self.is_spectator()
            && self.elements.contains(description.elements())
            && description
                .permissions()
                .iter()
                .all(|node| self.has_permission(node))
    }
}

/// Every registered bender.
#[derive(Debug, Default)]
pub struct BenderRegistry {
    users: BTreeMap<UserId, User>,
}

impl BenderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bender.
    ///
    /// # Errors
    ///
    /// Returns [`BendingError::DuplicateUser`] if the ID is taken.
    pub fn register(&mut self, user: User) -> Result<&User> {
        let id = user.id();
        if self.users.contains_key(&id) {
            return Err(BendingError::DuplicateUser(id));
        }
        Ok(self.users.entry(id).or_insert(user))
    }

    /// Unregister a bender.
    pub fn remove(&mut self, id: UserId) -> Option<User> {
        self.users.remove(&id)
    }

    /// Bender by ID.
    #[must_use]
    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Mutable bender by ID.
    pub fn get_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Benders in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &User> + '_ {
        self.users.values()
    }

    /// Number of benders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if nobody is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{noop_description, test_user};

    struct Restricted;

    impl UserCapabilities for Restricted {
        fn location(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn has_permission(&self, node: &str) -> bool {
            node != "bending.ability.firewall"
        }
    }

    #[test]
    fn slots_bind_and_select() {
        let mut user = test_user(1, "world");
        assert!(user.bind(2, Some(AbilityKey::bending("firewall"))));
        assert!(!user.bind(SLOTS, None));
        assert!(user.selected_ability().is_none());
        assert!(user.select(2));
        assert_eq!(user.selected_ability(), Some(&AbilityKey::bending("firewall")));
        assert!(!user.select(12));
        assert_eq!(user.selected_slot(), 2);
    }

    #[test]
    fn can_bend_requires_elements_and_permissions() {
        let description = noop_description("firewall", Element::FIRE);
        let mut user = test_user(1, "world");
        assert!(!user.can_bend(&description));
        user.add_elements(Element::FIRE | Element::AIR);
        assert!(user.can_bend(&description));
        user.remove_elements(Element::FIRE);
        assert!(!user.can_bend(&description));

        let mut restricted = User::new(
            UserId::new(2),
            EntityId::new(2),
            "restricted",
            WorldKey::new("world"),
            UserKind::NonPlayer,
            Arc::new(Restricted),
        );
        restricted.add_elements(Element::FIRE);
        assert!(!restricted.can_bend(&description));
    }

    #[test]
    fn spectators_cannot_bend() {
        let description = noop_description("gust", Element::AIR);
        let mut user = User::new(
            UserId::new(3),
            EntityId::new(3),
            "ghost",
            WorldKey::new("world"),
            UserKind::Player {
                game_mode: GameMode::Spectator,
            },
            Arc::new(Restricted),
        );
        user.add_elements(Element::all());
        assert!(!user.can_bend(&description));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = BenderRegistry::new();
        registry.register(test_user(1, "world")).unwrap();
        let err = registry.register(test_user(1, "world")).unwrap_err();
        assert!(matches!(err, BendingError::DuplicateUser(id) if id == UserId::new(1)));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(UserId::new(1)).is_some());
        assert!(registry.is_empty());
    }
}
