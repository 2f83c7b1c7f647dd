//! Helpers for the states carrying a wakeup tree.

use super::State;
use crate::odpor::WakeupTree;
use crate::strategy::ExplorationStrategy;
use crate::transition::Transition;
use std::sync::Arc;
use tracing::debug;

/// Bookkeeping of a state explored breadth-first or best-first by optimal DPOR.
///
/// Children are materialized as states as soon as a sequence is inserted, so the
/// state only remembers what left it so far (`opened`, in creation order) and every
/// sequence ever inserted from it (`final_wakeup_tree`).
#[derive(Debug, Clone, Default)]
pub struct BfsWutData {
    pub final_wakeup_tree: WakeupTree,
    pub opened: Vec<Arc<Transition>>,
}

impl BfsWutData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a first step leaving the state, unless it is already known.
    pub fn record_opened(&mut self, t: &Arc<Transition>) {
        let known = self
            .opened
            .iter()
            .any(|o| o.aid == t.aid && o.times_considered == t.times_considered);
        if !known {
            self.opened.push(Arc::clone(t));
        }
    }
}

/// Fills an empty wakeup tree with every branch of one enabled actor that is not
/// asleep, chosen by the strategy. Returns false when no such actor exists.
pub fn seed_empty_wakeup_tree(state: &mut State, strategy: &dyn ExplorationStrategy) -> bool {
    let Some((aid, _)) = strategy.best_transition(state, false) else {
        debug!(state = state.num(), "no enabled actor is awake");
        return false;
    };
    let Some(actor) = state.actors().get(&aid) else {
        return false;
    };
    let branches: Vec<Arc<Transition>> = (0..actor.max_considered())
        .filter_map(|times| actor.get_transition(times).cloned())
        .collect();
    if branches.is_empty() {
        debug!(%aid, "no pending transition known to seed the wakeup tree");
        return false;
    }
    let Some(tree) = state.wakeup_tree_mut() else {
        return false;
    };
    if !tree.is_empty() {
        return true;
    }
    for t in branches {
        tree.insert_at_root(t);
    }
    true
}
