use super::ExplorationStrategy;
use crate::state::{ActorState, State};

/// Explores actors in id order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicStrategy;

impl ExplorationStrategy for BasicStrategy {
    fn name(&self) -> &'static str {
        "none"
    }

    fn valuation(&self, _state: &State, _actor: &ActorState) -> i32 {
        0
    }
}
