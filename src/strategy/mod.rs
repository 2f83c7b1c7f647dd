//! Guiding strategies: which enabled actor to explore first from a state.
//!
//! A strategy gives every candidate actor a valuation, the lowest one wins and ties
//! go to the lowest actor id. Strategies that need history keep it in the
//! [`StrategyData`] carried by each state, derived from the parent's when a child
//! state is created.

pub mod basic;
pub mod match_comm;
pub mod min_wait;
pub mod uniform;

use crate::config::StrategyKind;
use crate::state::{ActorState, State};
use crate::transition::{Aid, Transition};
use std::collections::BTreeMap;

pub use basic::BasicStrategy;
pub use match_comm::MatchCommStrategy;
pub use min_wait::MinWaitStrategy;
pub use uniform::UniformStrategy;

/// Per-state history used by the guiding strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyData {
    /// Posted sends minus posted receives, per mailbox
    pub mailbox_balance: BTreeMap<u32, i32>,
    /// Number of wait-like transitions on the path to the state
    pub taken_waits: i32,
}

impl StrategyData {
    /// Unmatched communications on the path to the state.
    pub fn unmatched_comms(&self) -> i32 {
        self.mailbox_balance.values().map(|b| b.abs()).sum()
    }
}

pub trait ExplorationStrategy: Send {
    fn name(&self) -> &'static str;

    /// Whether valuations look at the pending transitions of the actors.
    fn wants_transitions(&self) -> bool {
        false
    }

    /// History of a child state reached from a state with `parent` through `incoming`.
    fn child_data(&self, parent: &StrategyData, _incoming: &Transition) -> StrategyData {
        parent.clone()
    }

    /// Lower is explored first.
    fn valuation(&self, state: &State, actor: &ActorState) -> i32;

    /// Best enabled actor that is not done, restricted to the todo ones if asked.
    fn best_transition(&self, state: &State, must_be_todo: bool) -> Option<(Aid, i32)> {
        let mut best: Option<(Aid, i32)> = None;
        for actor in state.actors().values() {
            if !actor.is_enabled() || actor.is_done() || (must_be_todo && !actor.is_todo()) {
                continue;
            }
            let value = self.valuation(state, actor);
            if best.map_or(true, |(_, v)| value < v) {
                best = Some((actor.aid(), value));
            }
        }
        best
    }
}

/// Builds the strategy selected by the configuration.
pub fn build_strategy(kind: StrategyKind, seed: u64) -> Box<dyn ExplorationStrategy> {
    match kind {
        StrategyKind::None => Box::new(BasicStrategy),
        StrategyKind::MaxMatchComm => Box::new(MatchCommStrategy::maximizing()),
        StrategyKind::MinMatchComm => Box::new(MatchCommStrategy::minimizing()),
        StrategyKind::MinWait => Box::new(MinWaitStrategy),
        StrategyKind::Uniform => Box::new(UniformStrategy::new(seed)),
    }
}
