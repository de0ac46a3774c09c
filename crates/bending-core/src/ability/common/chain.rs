//! Sequential composition of ability phases.

use std::collections::VecDeque;
use std::fmt;

use crate::ability::{AbilityContext, UpdateResult};
use crate::context::WorldContext;
use crate::world::BlockPos;

/// Outcome of one [`State`] update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateStep {
    /// Keep running this state
    Continue,
    /// Hand over to the next state
    Complete,
    /// Abandon the whole chain
    Fail,
}

/// One phase of a [`StateChain`].
///
/// States pass blocks to each other through the chain's store: a state
/// reads what the previous one left there when it starts, and leaves its
/// own result there when it completes.
pub trait State: Send {
    /// Take over from the previous state. Returning false abandons the chain.
    fn start(&mut self, store: &mut Vec<BlockPos>) -> bool;

    /// Advance one tick.
    fn update(&mut self, ctx: &mut AbilityContext<'_>, store: &mut Vec<BlockPos>) -> StateStep;

    /// Release anything the state holds because the chain was abandoned.
    fn abort(&mut self, _world: &mut WorldContext) {}
}

/// Runs states one after another.
///
/// ```
/// use bending_core::ability::common::StateChain;
/// use bending_core::world::BlockPos;
///
/// let chain = StateChain::new(vec![BlockPos::new(0, 64, 0)]).start();
/// assert!(chain.is_finished());
/// assert!(chain.is_completed());
/// assert_eq!(chain.store(), &[BlockPos::new(0, 64, 0)]);
/// ```
pub struct StateChain {
    store: Vec<BlockPos>,
    pending: VecDeque<Box<dyn State>>,
    current: Option<Box<dyn State>>,
    started: bool,
    finished: bool,
    completed: bool,
}

impl fmt::Debug for StateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateChain")
            .field("store", &self.store)
            .field("pending", &self.pending.len())
            .field("started", &self.started)
            .field("finished", &self.finished)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl StateChain {
    /// Create a chain whose first state starts from `store`.
    #[must_use]
    pub fn new(store: Vec<BlockPos>) -> Self {
        Self {
            store,
            pending: VecDeque::new(),
            current: None,
            started: false,
            finished: false,
            completed: false,
        }
    }

    /// Append a state. Ignored once the chain has started.
    #[must_use]
    pub fn add_state(mut self, state: impl State + 'static) -> Self {
        if !self.started {
            self.pending.push_back(Box::new(state));
        }
        self
    }

    /// Start the first state.
    #[must_use]
    pub fn start(mut self) -> Self {
        if !self.started {
            self.started = true;
            self.next_state();
        }
        self
    }

    /// Advance the running state. Returns [`UpdateResult::Remove`] once the
    /// chain has finished, successfully or not.
    pub fn update(&mut self, ctx: &mut AbilityContext<'_>) -> UpdateResult {
        if !self.started || self.finished {
            return UpdateResult::Remove;
        }
        let Some(state) = self.current.as_mut() else {
            return UpdateResult::Remove;
        };
        match state.update(ctx, &mut self.store) {
            StateStep::Continue => UpdateResult::Continue,
            StateStep::Complete if self.next_state() => UpdateResult::Continue,
            StateStep::Complete => UpdateResult::Remove,
            StateStep::Fail => {
                self.abort(ctx.world());
                UpdateResult::Remove
            }
        }
    }

    /// Abandon the chain, letting the running state clean up.
    pub fn abort(&mut self, world: &mut WorldContext) {
        if let Some(mut state) = self.current.take() {
            state.abort(world);
        }
        self.pending.clear();
        self.finished = true;
    }

    /// Blocks handed between states.
    #[must_use]
    pub fn store(&self) -> &[BlockPos] {
        &self.store
    }

    /// Whether the chain has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether every state completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Start the next pending state. Returns false if none is left or it
    /// refused to start.
    fn next_state(&mut self) -> bool {
        self.current = None;
        let Some(mut state) = self.pending.pop_front() else {
            self.finished = true;
            self.completed = true;
            return false;
        };
        if state.start(&mut self.store) {
            self.current = Some(state);
            true
        } else {
            self.pending.clear();
            self.finished = true;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AddQueue;
    use crate::config::BendingConfig;
    use crate::tests::helpers::test_user;
    use crate::world::MemoryWorld;

    /// Moves every stored block up once per update, for `steps` updates.
    struct Lift {
        steps: u32,
        fail: bool,
    }

    impl State for Lift {
        fn start(&mut self, store: &mut Vec<BlockPos>) -> bool {
            !store.is_empty()
        }

        fn update(&mut self, _ctx: &mut AbilityContext<'_>, store: &mut Vec<BlockPos>) -> StateStep {
            if self.fail {
                return StateStep::Fail;
            }
            if self.steps == 0 {
                return StateStep::Complete;
            }
            self.steps -= 1;
            for pos in store.iter_mut() {
                *pos = pos.above();
            }
            StateStep::Continue
        }
    }

    fn lift(steps: u32) -> Lift {
        Lift {
            steps,
            fail: false,
        }
    }

    fn drive(chain: &mut StateChain) -> usize {
        let user = test_user(1, "world");
        let mut world = WorldContext::new(Box::new(MemoryWorld::new("world")), &BendingConfig::default());
        let mut queue = AddQueue::default();
        let mut ctx = AbilityContext::new(&user, &mut world, &mut queue);
        let mut updates = 1;
        while chain.update(&mut ctx) == UpdateResult::Continue {
            updates += 1;
        }
        updates
    }

    #[test]
    fn states_run_in_order_and_share_the_store() {
        let mut chain = StateChain::new(vec![BlockPos::new(0, 0, 0)])
            .add_state(lift(2))
            .add_state(lift(3))
            .start();
        drive(&mut chain);
        assert!(chain.is_completed());
        assert_eq!(chain.store(), &[BlockPos::new(0, 5, 0)]);
    }

    #[test]
    fn failure_abandons_the_chain() {
        let mut chain = StateChain::new(vec![BlockPos::new(0, 0, 0)])
            .add_state(lift(1))
            .add_state(Lift {
                steps: 5,
                fail: true,
            })
            .add_state(lift(1))
            .start();
        drive(&mut chain);
        assert!(chain.is_finished());
        assert!(!chain.is_completed());
        assert_eq!(chain.store(), &[BlockPos::new(0, 1, 0)]);
    }

    #[test]
    fn refusing_to_start_finishes_unsuccessfully() {
        let chain = StateChain::new(Vec::new()).add_state(lift(1)).start();
        assert!(chain.is_finished());
        assert!(!chain.is_completed());
    }

    #[test]
    fn unstarted_chain_does_nothing() {
        let mut chain = StateChain::new(vec![BlockPos::new(0, 0, 0)]).add_state(lift(1));
        assert_eq!(drive(&mut chain), 1);
        assert_eq!(chain.store(), &[BlockPos::new(0, 0, 0)]);
    }
}
