use super::{NextStep, RaceAction, RaceUpdate, Reduction};
use crate::config::ReductionMode;
use crate::odpor::Execution;
use crate::state::{StateArena, StateId, StateKind};
use crate::strategy::ExplorationStrategy;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Classic DPOR with sleep sets.
///
/// For every reversible race between `e` and a later `e'`, the actor of `e'` is
/// added to the state before `e`, or all of its enabled actors when that one is not
/// enabled there.
#[derive(Debug, Clone, Copy)]
pub struct Dpor {
    best_first: bool,
}

impl Dpor {
    /// `best_first` builds states that remember which inherited sleepers came from a
    /// parent that was not exhausted yet.
    pub fn new(best_first: bool) -> Self {
        Dpor { best_first }
    }
}

/// State flavor shared by the sleep-set reductions.
pub(crate) fn sleep_set_kind(best_first: bool) -> StateKind {
    if best_first {
        StateKind::SoftLocked {
            soft_sleepers: BTreeSet::new(),
        }
    } else {
        StateKind::SleepSet
    }
}

/// Applies `ConsiderOne` and `ConsiderAll` actions.
pub(crate) fn apply_backtrack_points(arena: &mut StateArena, update: RaceUpdate) {
    for (id, action) in update.actions {
        let Some(state) = arena.get_mut(id) else {
            continue;
        };
        match action {
            RaceAction::ConsiderOne(aid) => {
                if state.consider_one(aid) {
                    trace!(%aid, state = state.num(), "new backtracking point");
                }
            }
            RaceAction::ConsiderAll => {
                let added = state.consider_all();
                trace!(added, state = state.num(), "every enabled actor is a backtracking point");
            }
            RaceAction::InsertSequence(_) => {
                unreachable!("sleep-set reductions never insert sequences")
            }
        }
    }
}

impl Reduction for Dpor {
    fn mode(&self) -> ReductionMode {
        ReductionMode::Dpor
    }

    fn new_state_kind(&self) -> StateKind {
        sleep_set_kind(self.best_first)
    }

    fn on_state_initialized(
        &self,
        arena: &mut StateArena,
        state: StateId,
        strategy: &dyn ExplorationStrategy,
    ) {
        arena.state_mut(state).consider_best(strategy);
    }

    fn races_computation(
        &self,
        arena: &StateArena,
        exec: &Execution,
        stack: &[StateId],
    ) -> RaceUpdate {
        let mut update = RaceUpdate::new();
        for e_prime in 0..exec.size() {
            let event = exec.event(e_prime);
            if event.has_race_been_computed() {
                continue;
            }
            let p = exec.actor_at(e_prime);
            for e in exec.get_reversible_races_of(e_prime) {
                let prev = stack[e];
                debug!(e, e_prime, %p, "reversible race");
                if arena.state(prev).is_actor_enabled(p) {
                    update.push(prev, RaceAction::ConsiderOne(p));
                } else {
                    update.push(prev, RaceAction::ConsiderAll);
                }
            }
            event.consider_races();
        }
        update
    }

    fn apply_race_update(
        &self,
        arena: &mut StateArena,
        _strategy: &dyn ExplorationStrategy,
        update: RaceUpdate,
    ) -> Vec<StateId> {
        apply_backtrack_points(arena, update);
        Vec::new()
    }

    fn next_to_explore(
        &self,
        arena: &mut StateArena,
        state: StateId,
        strategy: &dyn ExplorationStrategy,
    ) -> Option<NextStep> {
        arena
            .state(state)
            .next_transition_guided(strategy)
            .map(|aid| NextStep { aid, times: None })
    }

    fn on_backtrack(&self, arena: &mut StateArena, state: StateId) {
        let state = arena.state_mut(state);
        if let Some(out) = state.outgoing_transition().cloned() {
            state.add_sleep_set(out);
        }
    }

    fn races_on_each_step(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::test_support::{arc, lock, status};
    use crate::strategy::BasicStrategy;
    use crate::transition::Aid;
    use std::sync::Arc;

    /// Root where actors 1 and 2 lock the same mutex, after 1 did.
    fn after_first_lock(arena: &mut StateArena, dpor: &Dpor) -> (Vec<StateId>, Execution) {
        let root = arena.create(None, None, dpor.new_state_kind(), &BasicStrategy);
        arena
            .state_mut(root)
            .initialize(vec![status(1, true, lock(1, 1)), status(2, true, lock(2, 1))]);
        dpor.on_state_initialized(arena, root, &BasicStrategy);
        assert_eq!(arena.state(root).count_todo(), 1);

        let first = arc(lock(1, 1));
        arena.state_mut(root).set_outgoing_transition(Arc::clone(&first));
        let child = arena.create(Some(root), Some(Arc::clone(&first)), dpor.new_state_kind(), &BasicStrategy);
        arena.state_mut(child).initialize(vec![status(2, true, lock(2, 1))]);
        let mut exec = Execution::new();
        exec.push_transition(first).unwrap();
        exec.push_transition(arc(lock(2, 1))).unwrap();
        (vec![root, child], exec)
    }

    #[test]
    fn test_race_adds_backtracking_point() {
        let dpor = Dpor::new(false);
        let mut arena = StateArena::new();
        let (stack, exec) = after_first_lock(&mut arena, &dpor);

        let update = dpor.races_computation(&arena, &exec, &stack);
        assert_eq!(update.len(), 1);
        assert!(matches!(update.actions[0], (id, RaceAction::ConsiderOne(Aid(2))) if id == stack[0]));
        dpor.apply_race_update(&mut arena, &BasicStrategy, update);
        assert_eq!(arena.state(stack[0]).count_todo(), 2);

        // races are only computed once per event
        assert!(dpor.races_computation(&arena, &exec, &stack).is_empty());
    }

    #[test]
    fn test_backtrack_puts_explored_actor_to_sleep() {
        let dpor = Dpor::new(false);
        let mut arena = StateArena::new();
        let (stack, _) = after_first_lock(&mut arena, &dpor);
        dpor.on_backtrack(&mut arena, stack[0]);
        assert!(arena.state(stack[0]).sleep_set().contains(Aid(1)));
    }

    #[test]
    fn test_best_first_states_are_soft_locked() {
        assert!(matches!(
            Dpor::new(true).new_state_kind(),
            StateKind::SoftLocked { .. }
        ));
        assert!(matches!(Dpor::new(false).new_state_kind(), StateKind::SleepSet));
    }
}
