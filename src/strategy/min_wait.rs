use super::{ExplorationStrategy, StrategyData};
use crate::state::{ActorState, State};
use crate::transition::{Transition, TransitionType};

/// Delays blocking waits, keeping as few communications in flight as possible.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinWaitStrategy;

fn is_wait(t: &Transition) -> bool {
    matches!(
        t.type_(),
        TransitionType::CommWait
            | TransitionType::WaitAny
            | TransitionType::MutexWait
            | TransitionType::SemWait
            | TransitionType::BarrierWait
            | TransitionType::CondvarWait
            | TransitionType::ActorJoin
    )
}

impl ExplorationStrategy for MinWaitStrategy {
    fn name(&self) -> &'static str {
        "min_wait"
    }

    fn wants_transitions(&self) -> bool {
        true
    }

    fn child_data(&self, parent: &StrategyData, incoming: &Transition) -> StrategyData {
        let mut data = parent.clone();
        if is_wait(incoming) {
            data.taken_waits += 1;
        }
        data
    }

    fn valuation(&self, state: &State, actor: &ActorState) -> i32 {
        let waits = state.strategy_data().taken_waits;
        match actor.next_transition() {
            Some(t) if is_wait(t) => waits + 1,
            _ => waits,
        }
    }
}
