use super::{NextStep, RaceAction, RaceUpdate, Reduction};
use crate::config::ReductionMode;
use crate::odpor::{Execution, InsertionResult, PartialExecution};
use crate::state::{BfsWutData, StateArena, StateId, StateKind};
use crate::strategy::ExplorationStrategy;
use crate::transition::Transition;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, trace};

/// Optimal DPOR for the best-first explorer.
///
/// Instead of a wakeup tree per state, a sequence reversing a race is materialized
/// right away as a chain of uninitialized states below the state where it starts.
/// The last state of the chain is handed to the explorer, which initializes the
/// chain when it first restores the app to it. Parents keep their children alive,
/// so that later insertions can walk the whole explored tree.
#[derive(Debug, Clone, Copy)]
pub struct BfsOdpor {
    mode: ReductionMode,
}

impl BfsOdpor {
    /// Opened states are explored in the order they were created.
    pub fn breadth_first() -> Self {
        BfsOdpor {
            mode: ReductionMode::BfsOdpor,
        }
    }

    /// Opened states are explored by guiding-strategy preference.
    pub fn best_first() -> Self {
        BfsOdpor {
            mode: ReductionMode::BefsOdpor,
        }
    }

    /// Follows `w` down the existing children of `start`, and creates the states of
    /// what is left. Returns the last created state, which keeps its creation
    /// reference, or `None` when `w` was already covered.
    fn insert_into_tree(
        &self,
        arena: &mut StateArena,
        strategy: &dyn ExplorationStrategy,
        start: StateId,
        w: &[Arc<Transition>],
    ) -> Option<StateId> {
        let data = arena.get_mut(start)?.bfs_data_mut()?;
        if data.final_wakeup_tree.insert(w) == InsertionResult::Leaf {
            trace!("sequence already inserted from this state");
            return None;
        }

        let mut cur = start;
        let mut rest: PartialExecution = w.to_vec();
        'descend: loop {
            let children = arena.state(cur).children().to_vec();
            for child in children {
                let state = arena.state(child);
                if state.refcount().load(Ordering::Acquire) == 0 {
                    continue;
                }
                let Some(t) = state.incoming_transition().cloned() else {
                    continue;
                };
                let next_rest = if Execution::is_initial_after_execution_of(&rest, t.aid) {
                    let Some(pos) = rest.iter().position(|u| u.aid == t.aid) else {
                        continue;
                    };
                    if rest[pos].times_considered != t.times_considered {
                        continue;
                    }
                    let mut r = rest.clone();
                    r.remove(pos);
                    r
                } else if Execution::is_independent_with_execution_of(&rest, &t) {
                    rest.clone()
                } else {
                    continue;
                };
                if next_rest.is_empty() || !state.is_initialized() {
                    trace!(state = state.num(), "sequence covered by an existing state");
                    return None;
                }
                rest = next_rest;
                cur = child;
                continue 'descend;
            }
            break;
        }

        debug!(
            from = arena.state(cur).num(),
            len = rest.len(),
            "materializing a new branch"
        );
        let mut last: Option<StateId> = None;
        for (i, t) in rest.iter().enumerate() {
            if let Some(data) = arena.state_mut(cur).bfs_data_mut() {
                data.record_opened(t);
                if i > 0 {
                    data.final_wakeup_tree.insert(&rest[i..]);
                }
            }
            let child = arena.create(Some(cur), Some(Arc::clone(t)), self.new_state_kind(), strategy);
            // the parent's reference
            arena.acquire(child);
            if let Some(prev) = last {
                arena.release(prev);
            }
            last = Some(child);
            cur = child;
        }
        if let Some(id) = last {
            arena.state_mut(id).mark_owned_by_explorers();
        }
        last
    }
}

impl Reduction for BfsOdpor {
    fn mode(&self) -> ReductionMode {
        self.mode
    }

    fn new_state_kind(&self) -> StateKind {
        StateKind::BfsWut(BfsWutData::new())
    }

    fn on_state_initialized(
        &self,
        arena: &mut StateArena,
        state: StateId,
        strategy: &dyn ExplorationStrategy,
    ) {
        arena.state_mut(state).consider_best(strategy);
    }

    fn before_child_created(
        &self,
        arena: &mut StateArena,
        parent: StateId,
        incoming: &Arc<Transition>,
    ) {
        if let Some(data) = arena.state_mut(parent).bfs_data_mut() {
            data.record_opened(incoming);
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
                let sleeping = arena
                    .state(stack[e])
                    .get_sleeping_actors(Some(exec.actor_at(e)));
                if let Some(v) = exec.get_odpor_extension_from(e, e_prime, &sleeping) {
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
        strategy: &dyn ExplorationStrategy,
        update: RaceUpdate,
    ) -> Vec<StateId> {
        let mut opened = Vec::new();
        for (id, action) in update.actions {
            let RaceAction::InsertSequence(v) = action else {
                unreachable!("optimal DPOR only inserts sequences")
            };
            if !arena.contains(id) {
                continue;
            }
            if let Some(state) = self.insert_into_tree(arena, strategy, id, &v) {
                opened.push(state);
            }
        }
        opened
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

    fn parent_owns_children(&self) -> bool {
        true
    }

    fn wants_transitions(&self) -> bool {
        true
    }

    fn is_optimal(&self) -> bool {
        true
    }
}
