use super::dpor::{apply_backtrack_points, sleep_set_kind};
use super::{NextStep, RaceAction, RaceUpdate, Reduction};
use crate::config::ReductionMode;
use crate::odpor::Execution;
use crate::state::{StateArena, StateId, StateKind};
use crate::strategy::ExplorationStrategy;
use tracing::debug;

/// Source-set DPOR.
///
/// A race only adds a backtracking point when none of the actors that could start
/// the reversed race is already in the backtrack set of the state before it.
#[derive(Debug, Clone, Copy)]
pub struct Sdpor {
    best_first: bool,
}

impl Sdpor {
    pub fn new(best_first: bool) -> Self {
        Sdpor { best_first }
    }
}

impl Reduction for Sdpor {
    fn mode(&self) -> ReductionMode {
        ReductionMode::Sdpor
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
            if exec.event(e_prime).has_race_been_computed() {
                continue;
            }
            let races = exec.get_reversible_races_of(e_prime);
            if !races.is_empty() {
                let prefix = exec.get_prefix_before(e_prime + 1);
                for e in races {
                    let prev = arena.state(stack[e]);
                    let missing =
                        prefix.get_missing_source_set_actors_from(e, &prev.backtrack_set());
                    if missing.is_empty() {
                        continue;
                    }
                    debug!(e, e_prime, ?missing, "source set is missing actors");
                    match missing.iter().find(|&&q| prev.is_actor_enabled(q)) {
                        Some(&q) => update.push(stack[e], RaceAction::ConsiderOne(q)),
                        None => update.push(stack[e], RaceAction::ConsiderAll),
                    }
                }
            }
            exec.event(e_prime).consider_races();
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

    fn two_lockers(arena: &mut StateArena, sdpor: &Sdpor) -> (Vec<StateId>, Execution) {
        let root = arena.create(None, None, sdpor.new_state_kind(), &BasicStrategy);
        arena
            .state_mut(root)
            .initialize(vec![status(1, true, lock(1, 1)), status(2, true, lock(2, 1))]);
        sdpor.on_state_initialized(arena, root, &BasicStrategy);
        let first = arc(lock(1, 1));
        let child = arena.create(Some(root), Some(Arc::clone(&first)), sdpor.new_state_kind(), &BasicStrategy);
        arena.state_mut(child).initialize(vec![status(2, true, lock(2, 1))]);
        let mut exec = Execution::new();
        exec.push_transition(first).unwrap();
        exec.push_transition(arc(lock(2, 1))).unwrap();
        (vec![root, child], exec)
    }

    #[test]
    fn test_missing_initial_is_added() {
        let sdpor = Sdpor::new(false);
        let mut arena = StateArena::new();
        let (stack, exec) = two_lockers(&mut arena, &sdpor);
        let update = sdpor.races_computation(&arena, &exec, &stack);
        assert_eq!(update.len(), 1);
        assert!(matches!(update.actions[0].1, RaceAction::ConsiderOne(Aid(2))));
    }

    #[test]
    fn test_covered_source_set_adds_nothing() {
        let sdpor = Sdpor::new(false);
        let mut arena = StateArena::new();
        let (stack, exec) = two_lockers(&mut arena, &sdpor);
        arena.state_mut(stack[0]).consider_one(Aid(2));
        assert!(sdpor.races_computation(&arena, &exec, &stack).is_empty());
    }
}
