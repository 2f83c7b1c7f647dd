use super::{NextStep, RaceUpdate, Reduction};
use crate::config::ReductionMode;
use crate::odpor::Execution;
use crate::state::{StateArena, StateId, StateKind};
use crate::strategy::ExplorationStrategy;

/// Explores every interleaving of the enabled actors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReduction;

impl Reduction for NoReduction {
    fn mode(&self) -> ReductionMode {
        ReductionMode::None
    }

    fn new_state_kind(&self) -> StateKind {
        StateKind::Plain
    }

    fn on_state_initialized(
        &self,
        arena: &mut StateArena,
        state: StateId,
        _strategy: &dyn ExplorationStrategy,
    ) {
        arena.state_mut(state).consider_all();
    }

    fn races_computation(
        &self,
        _arena: &StateArena,
        exec: &Execution,
        _stack: &[StateId],
    ) -> RaceUpdate {
        for event in exec.events() {
            event.consider_races();
        }
        RaceUpdate::new()
    }

    fn apply_race_update(
        &self,
        _arena: &mut StateArena,
        _strategy: &dyn ExplorationStrategy,
        _update: RaceUpdate,
    ) -> Vec<StateId> {
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

    fn on_backtrack(&self, _arena: &mut StateArena, _state: StateId) {}
}
