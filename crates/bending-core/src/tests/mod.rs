//! Crate-level scenario tests.
//!
//! - `integration.rs`: the engine driven through [`Game`](crate::Game), from
//!   input to world state
//! - `determinism.rs`: identical seeds and input replay identically
//! - `properties.rs`: property tests over temporal and sequence invariants
//! - `helpers.rs`: users, abilities and worlds for tests

mod determinism;
pub mod helpers;
mod properties;
