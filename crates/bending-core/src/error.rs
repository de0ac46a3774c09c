//! Error types.

use thiserror::Error;

use crate::ability::AbilityKey;
use crate::user::UserId;
use crate::world::{BlockPos, WorldKey};

/// Errors raised by registration, configuration and game-level operations.
#[derive(Debug, Error)]
pub enum BendingError {
    /// No ability is registered under the key
    #[error("unknown ability {0}")]
    UnknownAbility(AbilityKey),

    /// The ability exists but is disabled by configuration
    #[error("ability {0} is disabled")]
    DisabledAbility(AbilityKey),

    /// An ability with the same key is already registered
    #[error("ability {0} is already registered")]
    DuplicateAbility(AbilityKey),

    /// An ability description failed validation
    #[error("invalid ability description: {0}")]
    InvalidDescription(String),

    /// A sequence definition failed validation
    #[error("invalid sequence {key}: {reason}")]
    InvalidSequence {
        /// Sequence ability key
        key: AbilityKey,
        /// What is wrong with it
        reason: String,
    },

    /// No world is loaded under the key
    #[error("unknown world {0}")]
    UnknownWorld(WorldKey),

    /// A world with the same key is already loaded
    #[error("world {0} is already loaded")]
    DuplicateWorld(WorldKey),

    /// No user is registered under the ID
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// A user with the same ID is already registered
    #[error("user {0} is already registered")]
    DuplicateUser(UserId),

    /// Configuration values out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result alias for [`BendingError`].
pub type Result<T> = std::result::Result<T, BendingError>;

/// Failure reported by an ability update. The ability is removed and destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbilityError {
    /// The block the ability was bending is gone
    #[error("lost source block at {0}")]
    LostSource(BlockPos),

    /// The owning user is no longer valid
    #[error("user {0} is no longer valid")]
    InvalidUser(UserId),

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}
