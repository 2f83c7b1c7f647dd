use super::{NextStep, RaceAction, RaceUpdate, Reduction};
use crate::config::ReductionMode;
use crate::odpor::{Execution, InsertionResult, WakeupTree};
use crate::state::{seed_empty_wakeup_tree, StateArena, StateId, StateKind};
use crate::strategy::ExplorationStrategy;
use crate::transition::Transition;
use std::sync::Arc;
use tracing::{debug, trace};

/// Optimal DPOR, explored depth-first.
///
/// Each state carries a wakeup tree: the sequences still to explore from it. A
/// child inherits the subtree below the step that reached it. Races found at the
/// end of an execution insert the sequence reversing them into the tree of the
/// state before the earlier event, unless an equivalent sequence is already there
/// or starts with a sleeping actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Odpor;

impl Reduction for Odpor {
    fn mode(&self) -> ReductionMode {
        ReductionMode::Odpor
    }

    fn new_state_kind(&self) -> StateKind {
        StateKind::Wut {
            wakeup_tree: WakeupTree::new(),
        }
    }

    fn on_state_initialized(
        &self,
        arena: &mut StateArena,
        state: StateId,
        strategy: &dyn ExplorationStrategy,
    ) {
        let inherited = {
            let s = arena.state(state);
            match (s.parent(), s.incoming_transition()) {
                (Some(parent), Some(t)) => arena.state(parent).wakeup_tree().and_then(|tree| {
                    let node = tree
                        .children(tree.root())
                        .iter()
                        .copied()
                        .find(|&n| {
                            let a = tree.action(n);
                            a.aid == t.aid && a.times_considered == t.times_considered
                        })
                        .or_else(|| tree.root_child_of_actor(t.aid))?;
                    Some(tree.make_subtree_rooted_at(node))
                }),
                _ => None,
            }
        };
        let s = arena.state_mut(state);
        if let (Some(subtree), Some(tree)) = (inherited, s.wakeup_tree_mut()) {
            *tree = subtree;
        }
        let empty = s.wakeup_tree().map_or(true, WakeupTree::is_empty);
        if empty && !seed_empty_wakeup_tree(s, strategy) {
            trace!(state = s.num(), "nothing to explore from this state");
        }
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
            for e in exec.get_reversible_races_of(e_prime) {
                let prev = arena.state(stack[e]);
                let sleeping = prev.get_sleeping_actors(Some(exec.actor_at(e)));
                if let Some(v) = exec.get_odpor_extension_from(e, e_prime, &sleeping) {
                    debug!(e, e_prime, len = v.len(), "race reversed by a new sequence");
                    update.push(stack[e], RaceAction::InsertSequence(v));
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
        for (id, action) in update.actions {
            let RaceAction::InsertSequence(v) = action else {
                unreachable!("optimal DPOR only inserts sequences")
            };
            let Some(tree) = arena.get_mut(id).and_then(|s| s.wakeup_tree_mut()) else {
                continue;
            };
            match tree.insert(&v) {
                InsertionResult::Leaf => trace!("sequence already covered"),
                where_ => trace!(?where_, "sequence inserted in the wakeup tree"),
            }
        }
        Vec::new()
    }

    fn next_to_explore(
        &self,
        arena: &mut StateArena,
        state: StateId,
        _strategy: &dyn ExplorationStrategy,
    ) -> Option<NextStep> {
        let state = arena.state_mut(state);
        loop {
            let (node, aid, times) = {
                let tree = state.wakeup_tree()?;
                let node = tree.min_single_process_node()?;
                let action = tree.action(node);
                (node, action.aid, action.times_considered)
            };
            if state.is_actor_enabled(aid) {
                return Some(NextStep {
                    aid,
                    times: Some(times),
                });
            }
            debug!(%aid, "dropping a wakeup subtree starting with a disabled actor");
            state.wakeup_tree_mut()?.remove_subtree(node);
        }
    }

    fn on_backtrack(&self, arena: &mut StateArena, state: StateId) {
        let state = arena.state_mut(state);
        if let Some(tree) = state.wakeup_tree_mut() {
            tree.remove_min_single_process_subtree();
        }
        if let Some(out) = state.outgoing_transition().cloned() {
            state.add_sleep_set(out);
        }
    }

    fn on_failed_step(&self, arena: &mut StateArena, state: StateId, failed: Option<Arc<Transition>>) {
        let state = arena.state_mut(state);
        if let Some(tree) = state.wakeup_tree_mut() {
            tree.remove_min_single_process_subtree();
        }
        if let Some(t) = failed {
            state.add_sleep_set(t);
        }
    }

    fn wants_transitions(&self) -> bool {
        true
    }

    fn is_optimal(&self) -> bool {
        true
    }
}
