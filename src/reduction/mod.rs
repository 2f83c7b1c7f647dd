//! Partial-order reductions.
//!
//! A reduction decides which flavor of state the explorer builds, what to explore
//! first from a fresh state, and what to add to the states of the current stack
//! once races were found in the execution. Explorers never look at the flavor of
//! a state themselves: they go through the [`Reduction`] in charge.
//!
//! Race handling is split in two steps. [`Reduction::races_computation`] only reads
//! the states and returns a [`RaceUpdate`]; [`Reduction::apply_race_update`] then
//! mutates them. The explorer decides when each step happens.

pub mod bfs_odpor;
pub mod dpor;
pub mod none;
pub mod odpor;
pub mod sdpor;

use crate::config::{ExplorerKind, ReductionMode};
use crate::error::McError;
use crate::odpor::{Execution, PartialExecution};
use crate::remote::RemoteApp;
use crate::state::{StateArena, StateId, StateKind};
use crate::strategy::ExplorationStrategy;
use crate::transition::{Aid, Transition};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::trace;

pub use bfs_odpor::BfsOdpor;
pub use dpor::Dpor;
pub use none::NoReduction;
pub use odpor::Odpor;
pub use sdpor::Sdpor;

/// What to add to one state of the stack after a race.
#[derive(Debug, Clone)]
pub enum RaceAction {
    /// Explore this actor from the state
    ConsiderOne(Aid),
    /// Explore every enabled actor of the state
    ConsiderAll,
    /// Explore this sequence from the state
    InsertSequence(PartialExecution),
}

/// Changes to apply to the states of the stack, in the order they were found.
#[derive(Debug, Clone, Default)]
pub struct RaceUpdate {
    pub actions: Vec<(StateId, RaceAction)>,
}

impl RaceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: StateId, action: RaceAction) {
        self.actions.push((state, action));
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Next step to take from a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextStep {
    pub aid: Aid,
    /// Branch to take; the next unexplored one of the actor when `None`
    pub times: Option<u32>,
}

pub trait Reduction: Send {
    fn mode(&self) -> ReductionMode;

    /// Flavor of the states built under this reduction.
    fn new_state_kind(&self) -> StateKind;

    /// Called once the actors of `state` are known, to seed what gets explored
    /// first from it.
    fn on_state_initialized(
        &self,
        arena: &mut StateArena,
        state: StateId,
        strategy: &dyn ExplorationStrategy,
    );

    /// Called right before a child of `parent` is created through `incoming`.
    fn before_child_created(
        &self,
        _arena: &mut StateArena,
        _parent: StateId,
        _incoming: &Arc<Transition>,
    ) {
    }

    /// Looks for the races of the events of `exec` that were not considered yet,
    /// and marks them considered. `stack[e]` is the state right before event `e`.
    fn races_computation(
        &self,
        arena: &StateArena,
        exec: &Execution,
        stack: &[StateId],
    ) -> RaceUpdate;

    /// Applies `update`. Returns the states created ahead of time that the explorer
    /// has to visit; the caller owns one reference on each of them.
    fn apply_race_update(
        &self,
        arena: &mut StateArena,
        strategy: &dyn ExplorationStrategy,
        update: RaceUpdate,
    ) -> Vec<StateId>;

    /// What to explore next from `state`, if anything.
    fn next_to_explore(
        &self,
        arena: &mut StateArena,
        state: StateId,
        strategy: &dyn ExplorationStrategy,
    ) -> Option<NextStep>;

    /// Called when the exploration comes back to `state` after exploring its
    /// outgoing transition.
    fn on_backtrack(&self, arena: &mut StateArena, state: StateId);

    /// Called when the step from `state` stopped on a finding the search tolerates.
    /// The app is back at `state`, and `failed` must not be proposed again.
    fn on_failed_step(&self, arena: &mut StateArena, state: StateId, failed: Option<Arc<Transition>>) {
        if let Some(t) = failed {
            arena.state_mut(state).add_sleep_set(t);
        }
    }

    /// Whether races must be looked for after every step rather than only at the
    /// end of each execution.
    fn races_on_each_step(&self) -> bool {
        false
    }

    /// Whether every state holds a reference on its children, keeping the whole
    /// explored tree alive.
    fn parent_owns_children(&self) -> bool {
        false
    }

    /// Whether states need the pending transitions of their actors, and not only
    /// whether each actor is enabled.
    fn wants_transitions(&self) -> bool {
        false
    }

    /// Whether no two explored executions may be equivalent.
    fn is_optimal(&self) -> bool {
        false
    }
}

/// Builds the reduction selected by the configuration, for the given explorer.
pub fn build_reduction(mode: ReductionMode, explorer: ExplorerKind) -> Box<dyn Reduction> {
    let best_first = explorer == ExplorerKind::Befs;
    match mode {
        ReductionMode::None => Box::new(NoReduction),
        ReductionMode::Dpor => Box::new(Dpor::new(best_first)),
        ReductionMode::Sdpor => Box::new(Sdpor::new(best_first)),
        ReductionMode::Odpor => Box::new(Odpor),
        ReductionMode::BfsOdpor => Box::new(BfsOdpor::breadth_first()),
        ReductionMode::BefsOdpor => Box::new(BfsOdpor::best_first()),
    }
}

/// Builds the state reached from `parent` through `incoming`, or the root when
/// `parent` is `None`, and initializes it from the current state of the app.
///
/// A child of `parent` already reached through the same branch of the same actor is
/// reused rather than duplicated. Either way the caller gets one reference on the
/// returned state.
///
/// The pending transitions of the actors are only asked for when the reduction or
/// the strategy reads them, or when `debug` is set.
#[allow(clippy::too_many_arguments)]
pub fn state_create(
    reduction: &dyn Reduction,
    arena: &mut StateArena,
    strategy: &dyn ExplorationStrategy,
    remote: &mut dyn RemoteApp,
    parent: Option<StateId>,
    incoming: Option<Arc<Transition>>,
    debug: bool,
) -> Result<StateId, McError> {
    let want_transitions = debug || reduction.wants_transitions() || strategy.wants_transitions();
    if let (Some(parent), Some(t)) = (parent, &incoming) {
        let existing = arena.state(parent).children().iter().copied().find(|&c| {
            let child = arena.state(c);
            child.refcount().load(Ordering::Acquire) > 0
                && child.incoming_transition().is_some_and(|i| {
                    i.aid == t.aid && i.times_considered == t.times_considered
                })
        });
        if let Some(child) = existing {
            trace!(state = arena.state(child).num(), "reusing a child created ahead of time");
            arena.acquire(child);
            let state = arena.state_mut(child);
            state.update_incoming_transition(Arc::clone(t));
            if !state.is_initialized() {
                state.initialize(remote.get_actors_status(want_transitions)?);
                reduction.on_state_initialized(arena, child, strategy);
            }
            return Ok(child);
        }
        reduction.before_child_created(arena, parent, t);
    }

    let id = arena.create(parent, incoming, reduction.new_state_kind(), strategy);
    if parent.is_some() && reduction.parent_owns_children() {
        arena.acquire(id);
    }
    arena
        .state_mut(id)
        .initialize(remote.get_actors_status(want_transitions)?);
    reduction.on_state_initialized(arena, id, strategy);
    Ok(id)
}


#[cfg(test)]
mod tests {
    use super::test_support::{lock, status};
    use super::*;
    use crate::remote::{ActorStatus, CheckpointId, ReplayedStep};
    use crate::strategy::{BasicStrategy, MinWaitStrategy};

    /// App stuck in one state that remembers how its actors were asked for.
    #[derive(Default)]
    struct StatusLog {
        asked: Vec<bool>,
    }

    impl RemoteApp for StatusLog {
        fn get_actors_status(&mut self, want_transitions: bool) -> Result<Vec<ActorStatus>, McError> {
            self.asked.push(want_transitions);
            let mut actor = status(1, true, lock(1, 1));
            if !want_transitions {
                actor.transitions.clear();
            }
            Ok(vec![actor])
        }

        fn handle_simcall(&mut self, _: Aid, _: u32, _: bool) -> Result<Option<Transition>, McError> {
            unreachable!()
        }

        fn wait_for_requests(&mut self) -> Result<(), McError> {
            Ok(())
        }

        fn check_deadlock(&mut self, _: bool) -> Result<bool, McError> {
            Ok(false)
        }

        fn replay_sequence(
            &mut self,
            _: &[(Aid, u32)],
            _: &[(Aid, u32)],
        ) -> Result<Vec<ReplayedStep>, McError> {
            unreachable!()
        }

        fn go_one_way(&mut self, _: Option<u64>, _: bool) -> Result<Vec<ReplayedStep>, McError> {
            unreachable!()
        }

        fn clone_checker_side(&mut self) -> Result<CheckpointId, McError> {
            unreachable!()
        }

        fn restore_checker_side(&mut self, _: Option<CheckpointId>) -> Result<(), McError> {
            Ok(())
        }

        fn release_checkpoint(&mut self, _: CheckpointId) {}

        fn checkpoint_count(&self) -> usize {
            0
        }

        fn finalize_app(&mut self, _: bool) -> Result<(), McError> {
            Ok(())
        }

        fn get_maxpid(&mut self) -> Result<u32, McError> {
            Ok(1)
        }
    }

    fn asked_for(reduction: &dyn Reduction, strategy: &dyn ExplorationStrategy, debug: bool) -> bool {
        let mut app = StatusLog::default();
        let mut arena = StateArena::new();
        let root = state_create(reduction, &mut arena, strategy, &mut app, None, None, debug)
            .expect("root state");
        let pending = arena.state(root).actors()[&Aid(1)].next_transition().is_some();
        assert_eq!(app.asked, vec![pending]);
        pending
    }

    #[test]
    fn test_transitions_are_fetched_only_when_read() {
        assert!(!asked_for(&NoReduction, &BasicStrategy, false));
        assert!(!asked_for(&Dpor::new(false), &BasicStrategy, false));
        assert!(!asked_for(&Sdpor::new(false), &BasicStrategy, false));
        assert!(asked_for(&Odpor, &BasicStrategy, false));
        assert!(asked_for(&BfsOdpor::breadth_first(), &BasicStrategy, false));
        assert!(asked_for(&Dpor::new(false), &MinWaitStrategy, false));
        assert!(asked_for(&NoReduction, &BasicStrategy, true));
    }
}
