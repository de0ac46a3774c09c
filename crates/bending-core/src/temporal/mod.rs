//! Timed, reversible world mutations.
//!
//! # Architecture
//!
//! A [`TemporalManager`] owns every live temporary of one kind, keyed by
//! whatever identifies the mutated thing (a block position, an entity ID).
//! Each entry carries an expiry tick and a generation stamp; the schedule is a
//! `BTreeMap` from tick to the `(key, generation)` pairs due at that tick.
//! Rescheduling bumps the generation, so stale schedule slots are skipped
//! when they come due instead of being searched for and removed.
//!
//! When an entry comes due the manager calls [`Temporary::revert`] and acts on
//! the returned [`Revert`]:
//!
//! - [`Revert::Complete`]: the entry is gone.
//! - [`Revert::Partial`]: the entry stays and is rescheduled.
//! - [`Revert::Noop`]: the entry was already reverted and is dropped.
//!
//! The services built on top ([`TempBlocks`], [`TempEntities`],
//! [`TempLights`], [`ActionLimiters`]) pass the revert context their
//! temporaries need, typically the host [`World`](crate::world::World).

mod block;
mod entity;
mod light;
mod limiter;

pub use block::{BlockHost, DamageSource, Snapshot, TempBlock, TempBlockBuilder, TempBlocks};
pub use entity::{FallingBlockBuilder, TempEntities, TempEntity};
pub use light::{TempLight, TempLightBuilder, TempLights};
pub use limiter::{ActionLimiter, ActionLimiterBuilder, ActionLimiters, ActionType};

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

// ============================================================================
// Temporary trait
// ============================================================================

/// Time information passed to [`Temporary::revert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    /// Current manager tick
    pub now: u64,
    /// True while the manager is reverting everything (shutdown, world unload)
    pub clearing: bool,
}

/// Outcome of a revert step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revert {
    /// Fully reverted, drop the entry
    Complete,
    /// Partially reverted, run again after this many ticks
    Partial(u32),
    /// Nothing to do (already reverted), drop the entry
    Noop,
}

/// A reversible mutation owned by a [`TemporalManager`].
pub trait Temporary<C: ?Sized> {
    /// Undo (part of) the mutation.
    fn revert(&mut self, ctx: &mut C, clock: Clock) -> Revert;
}

// ============================================================================
// Manager
// ============================================================================

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: u64,
    generation: u64,
}

/// Registry and scheduler for temporaries of one kind.
#[derive(Debug)]
pub struct TemporalManager<K, V> {
    label: &'static str,
    entries: HashMap<K, Entry<V>>,
    schedule: BTreeMap<u64, Vec<(K, u64)>>,
    current_tick: u64,
    next_generation: u64,
    tick_millis: u64,
    max_ticks: u32,
    clearing: bool,
}

impl<K, V> TemporalManager<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create a manager.
    ///
    /// # Arguments
    ///
    /// * `label` - Name used in log events
    /// * `max_ticks` - Upper bound on any scheduled duration
    /// * `tick_millis` - Tick length used by [`from_millis`](Self::from_millis)
    #[must_use]
    pub fn new(label: &'static str, max_ticks: u32, tick_millis: u64) -> Self {
        Self {
            label,
            entries: HashMap::new(),
            schedule: BTreeMap::new(),
            current_tick: 0,
            next_generation: 0,
            tick_millis: tick_millis.max(1),
            max_ticks: max_ticks.max(1),
            clearing: false,
        }
    }

    /// Convert a millisecond duration to ticks.
    ///
    /// Rounds up, clamps to `[1, max_ticks]`, and maps zero to `max_ticks`.
    #[must_use]
    pub fn from_millis(&self, millis: u64) -> u32 {
        if millis == 0 {
            return self.max_ticks;
        }
        let ticks = millis.div_ceil(self.tick_millis);
        u32::try_from(ticks).map_or(self.max_ticks, |t| t.clamp(1, self.max_ticks))
    }

    /// Current tick.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Largest schedulable duration.
    #[must_use]
    pub fn max_ticks(&self) -> u32 {
        self.max_ticks
    }

    /// True while [`revert_all`](Self::revert_all) is running.
    #[must_use]
    pub fn is_clearing(&self) -> bool {
        self.clearing
    }

    /// Register `value` under `key`, due after `ticks`.
    ///
    /// Replaces (and returns) any previous value for the key; the previous
    /// schedule is discarded.
    pub fn add_entry(&mut self, key: K, value: V, ticks: u32) -> Option<V> {
        let previous = self.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: 0,
                generation: 0,
            },
        );
        self.reschedule(&key, ticks);
        previous.map(|e| e.value)
    }

    /// Move the expiry of `key` to `ticks` from now. Returns false if absent.
    pub fn reschedule(&mut self, key: &K, ticks: u32) -> bool {
        let ticks = ticks.clamp(1, self.max_ticks);
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        self.next_generation += 1;
        entry.generation = self.next_generation;
        entry.expires_at = self.current_tick + u64::from(ticks);
        self.schedule
            .entry(entry.expires_at)
            .or_default()
            .push((key.clone(), entry.generation));
        true
    }

    /// Remove `key` without reverting it.
    pub fn remove_entry(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Live value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Mutable live value for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|e| &mut e.value)
    }

    /// Whether `key` has a live entry.
    #[must_use]
    pub fn is_temp(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Expiry tick of `key`.
    #[must_use]
    pub fn expiry(&self, key: &K) -> Option<u64> {
        self.entries.get(key).map(|e| e.expires_at)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.keys()
    }

    /// Advance one tick and revert every entry that came due.
    ///
    /// Returns the number of entries that left the manager.
    pub fn tick<C>(&mut self, ctx: &mut C) -> usize
    where
        C: ?Sized,
        V: Temporary<C>,
    {
        self.current_tick += 1;
        let now = self.current_tick;

        let mut due = Vec::new();
        while let Some(slot) = self.schedule.first_entry() {
            if *slot.key() > now {
                break;
            }
            due.extend(slot.remove());
        }

        let mut finished = 0;
        for (key, generation) in due {
            let outcome = match self.entries.get_mut(&key) {
                Some(entry) if entry.generation == generation => entry.value.revert(
                    ctx,
                    Clock {
                        now,
                        clearing: self.clearing,
                    },
                ),
                _ => continue,
            };
            if self.settle(&key, outcome) {
                finished += 1;
            }
        }
        if finished > 0 {
            trace!(manager = self.label, tick = now, finished, "reverted temporaries");
        }
        finished
    }

    /// Revert `key` ahead of schedule. Returns true if the entry is gone.
    pub fn revert<C>(&mut self, key: &K, ctx: &mut C) -> bool
    where
        C: ?Sized,
        V: Temporary<C>,
    {
        let clock = Clock {
            now: self.current_tick,
            clearing: self.clearing,
        };
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let outcome = entry.value.revert(ctx, clock);
        self.settle(key, outcome)
    }

    /// Fully revert every live entry (shutdown or world unload).
    pub fn revert_all<C>(&mut self, ctx: &mut C)
    where
        C: ?Sized,
        V: Temporary<C>,
    {
        self.clearing = true;
        let clock = Clock {
            now: self.current_tick,
            clearing: true,
        };
        let count = self.entries.len();
        for (_, mut entry) in self.entries.drain() {
            entry.value.revert(ctx, clock);
        }
        self.schedule.clear();
        self.clearing = false;
        if count > 0 {
            trace!(manager = self.label, count, "reverted all temporaries");
        }
    }

    /// Apply a revert outcome. Returns true if the entry was removed.
    fn settle(&mut self, key: &K, outcome: Revert) -> bool {
        match outcome {
            Revert::Partial(ticks) => {
                self.reschedule(key, ticks);
                false
            }
            Revert::Complete | Revert::Noop => {
                self.entries.remove(key);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Counts down `steps` partial reverts of `interval` ticks, logging into the context.
    #[derive(Debug)]
    struct Countdown {
        id: u32,
        steps: u32,
        interval: u32,
    }

    impl Temporary<Vec<(u32, u64, bool)>> for Countdown {
        fn revert(&mut self, log: &mut Vec<(u32, u64, bool)>, clock: Clock) -> Revert {
            log.push((self.id, clock.now, clock.clearing));
            if clock.clearing || self.steps == 0 {
                return Revert::Complete;
            }
            self.steps -= 1;
            Revert::Partial(self.interval)
        }
    }

    fn countdown(id: u32, steps: u32) -> Countdown {
        Countdown {
            id,
            steps,
            interval: 2,
        }
    }

    #[test]
    fn from_millis_rounds_up_and_clamps() {
        let manager: TemporalManager<u32, Countdown> = TemporalManager::new("test", 600, 50);
        assert_eq!(manager.from_millis(1), 1);
        assert_eq!(manager.from_millis(50), 1);
        assert_eq!(manager.from_millis(51), 2);
        assert_eq!(manager.from_millis(5000), 100);
        assert_eq!(manager.from_millis(0), 600);
        assert_eq!(manager.from_millis(u64::MAX), 600);
    }

    #[test]
    fn entry_reverts_exactly_at_expiry() {
        let mut manager = TemporalManager::new("test", 600, 50);
        let mut log = Vec::new();
        manager.add_entry(1u32, countdown(1, 0), 3);
        assert_eq!(manager.expiry(&1), Some(3));

        assert_eq!(manager.tick(&mut log), 0);
        assert_eq!(manager.tick(&mut log), 0);
        assert!(manager.is_temp(&1));
        assert_eq!(manager.tick(&mut log), 1);
        assert!(!manager.is_temp(&1));
        assert_eq!(log, vec![(1, 3, false)]);
    }

    #[test]
    fn partial_revert_reschedules() {
        let mut manager = TemporalManager::new("test", 600, 50);
        let mut log = Vec::new();
        manager.add_entry(1u32, countdown(1, 2), 1);
        for _ in 0..10 {
            manager.tick(&mut log);
        }
        let ticks: Vec<u64> = log.iter().map(|e| e.1).collect();
        assert_eq!(ticks, vec![1, 3, 5]);
        assert!(manager.is_empty());
    }

    #[test]
    fn reschedule_supersedes_old_slot() {
        let mut manager = TemporalManager::new("test", 600, 50);
        let mut log = Vec::new();
        manager.add_entry(1u32, countdown(1, 0), 2);
        manager.reschedule(&1, 5);
        for _ in 0..4 {
            manager.tick(&mut log);
        }
        assert!(log.is_empty());
        manager.tick(&mut log);
        assert_eq!(log, vec![(1, 5, false)]);
    }

    #[test]
    fn add_entry_replaces_previous_value() {
        let mut manager = TemporalManager::new("test", 600, 50);
        let mut log = Vec::new();
        assert!(manager.add_entry(1u32, countdown(1, 0), 2).is_none());
        let previous = manager.add_entry(1u32, countdown(2, 0), 4).unwrap();
        assert_eq!(previous.id, 1);
        assert_eq!(manager.len(), 1);
        for _ in 0..4 {
            manager.tick(&mut log);
        }
        assert_eq!(log, vec![(2, 4, false)]);
    }

    #[test]
    fn removed_entries_never_revert() {
        let mut manager = TemporalManager::new("test", 600, 50);
        let mut log = Vec::new();
        manager.add_entry(1u32, countdown(1, 0), 1);
        assert!(manager.remove_entry(&1).is_some());
        manager.tick(&mut log);
        assert!(log.is_empty());
    }

    #[test]
    fn early_revert_follows_outcome() {
        let mut manager = TemporalManager::new("test", 600, 50);
        let mut log = Vec::new();
        manager.add_entry(1u32, countdown(1, 1), 100);
        assert!(!manager.revert(&1, &mut log));
        assert_eq!(manager.expiry(&1), Some(2));
        assert!(manager.revert(&1, &mut log));
        assert!(!manager.revert(&1, &mut log));
    }

    #[test]
    fn revert_all_runs_in_clearing_mode() {
        let mut manager = TemporalManager::new("test", 600, 50);
        let mut log = Vec::new();
        manager.add_entry(1u32, countdown(1, 5), 10);
        manager.add_entry(2u32, countdown(2, 5), 20);
        manager.revert_all(&mut log);
        assert!(manager.is_empty());
        assert!(!manager.is_clearing());
        assert!(log.iter().all(|e| e.2));
        assert_eq!(log.len(), 2);
        manager.tick(&mut log);
        assert_eq!(log.len(), 2);
    }

    proptest! {
        #[test]
        fn every_entry_reverts_once_at_its_expiry(durations in proptest::collection::vec(1u32..50, 1..30)) {
            let mut manager = TemporalManager::new("test", 600, 50);
            let mut log = Vec::new();
            for (id, ticks) in durations.iter().enumerate() {
                let id = u32::try_from(id).unwrap();
                manager.add_entry(id, countdown(id, 0), *ticks);
            }
            for _ in 0..60 {
                manager.tick(&mut log);
            }
            prop_assert!(manager.is_empty());
            prop_assert_eq!(log.len(), durations.len());
            for (id, now, _) in log {
                prop_assert_eq!(now, u64::from(durations[id as usize]));
            }
        }
    }
}
