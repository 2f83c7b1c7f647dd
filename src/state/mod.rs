//! Exploration states.
//!
//! A state is a node of the exploration tree: what every actor can do at that point
//! and what was, is or will be explored from it. States live in a [`StateArena`]
//! and refer to each other through generational [`StateId`]s. The flavors used by
//! the reductions are the variants of [`StateKind`]; behavior that differs between
//! them dispatches on the tag.

pub mod actor_state;
pub mod arena;
pub mod sleep_set;
pub mod wut;

use crate::error::McError;
use crate::odpor::WakeupTree;
use crate::remote::{ActorStatus, CheckpointId, RemoteApp};
use crate::strategy::{ExplorationStrategy, StrategyData};
use crate::transition::{Aid, Transition};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use tracing::{debug, trace};

pub use actor_state::{ActorState, InterleavingType};
pub use arena::StateArena;
pub use sleep_set::SleepSet;
pub use wut::{seed_empty_wakeup_tree, BfsWutData};

/// Handle on a state of a [`StateArena`]. A handle outliving its state is detected
/// through the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId {
    index: u32,
    generation: u32,
}

/// Flavor of a state, one per reduction family.
#[derive(Debug, Clone)]
pub enum StateKind {
    /// Every enabled actor gets explored
    Plain,
    /// Carries a sleep set
    SleepSet,
    /// Sleep set inherited from a parent that was not exhausted yet
    SoftLocked { soft_sleepers: BTreeSet<Aid> },
    /// Sleep set and wakeup tree, explored depth-first
    Wut { wakeup_tree: WakeupTree },
    /// Sleep set with children materialized ahead of time
    BfsWut(BfsWutData),
}

impl StateKind {
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::Plain => "plain",
            StateKind::SleepSet => "sleep-set",
            StateKind::SoftLocked { .. } => "soft-locked",
            StateKind::Wut { .. } => "wakeup-tree",
            StateKind::BfsWut(_) => "bfs-wakeup-tree",
        }
    }

    fn has_sleep_set(&self) -> bool {
        !matches!(self, StateKind::Plain)
    }
}

#[derive(Debug)]
pub struct State {
    id: StateId,
    num: u64,
    depth: usize,
    parent: Option<StateId>,
    incoming: Option<Arc<Transition>>,
    outgoing: Option<Arc<Transition>>,
    actors: BTreeMap<Aid, ActorState>,
    initialized: bool,
    children: Vec<StateId>,
    state_factory: Option<CheckpointId>,
    refcount: AtomicU32,
    has_correct_descendent: bool,
    owned_by_explorers: bool,
    sleep: SleepSet,
    strategy_data: StrategyData,
    kind: StateKind,
}

impl State {
    /// A state without actors yet, child of `parent` through `incoming` when given.
    pub(crate) fn new(
        id: StateId,
        num: u64,
        parent: Option<&State>,
        incoming: Option<Arc<Transition>>,
        mut kind: StateKind,
        strategy: &dyn ExplorationStrategy,
    ) -> Self {
        let (depth, sleep, strategy_data) = match (parent, &incoming) {
            (Some(parent), Some(t)) => {
                let sleep = if kind.has_sleep_set() {
                    SleepSet::inherit(parent.sleeping_transitions(Some(t.aid)).iter(), t)
                } else {
                    SleepSet::new()
                };
                if let StateKind::SoftLocked { soft_sleepers } = &mut kind {
                    if parent.has_more_to_be_explored() {
                        *soft_sleepers = sleep.actors();
                    }
                }
                (
                    parent.depth + 1,
                    sleep,
                    strategy.child_data(&parent.strategy_data, t),
                )
            }
            _ => (0, SleepSet::new(), StrategyData::default()),
        };
        State {
            id,
            num,
            depth,
            parent: parent.map(|p| p.id),
            incoming,
            outgoing: None,
            actors: BTreeMap::new(),
            initialized: false,
            children: Vec::new(),
            state_factory: None,
            refcount: AtomicU32::new(1),
            has_correct_descendent: false,
            owned_by_explorers: false,
            sleep,
            strategy_data,
            kind,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    /// Creation rank, unique over the whole exploration.
    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut StateKind {
        &mut self.kind
    }

    pub fn strategy_data(&self) -> &StrategyData {
        &self.strategy_data
    }

    pub fn incoming_transition(&self) -> Option<&Arc<Transition>> {
        self.incoming.as_ref()
    }

    pub fn outgoing_transition(&self) -> Option<&Arc<Transition>> {
        self.outgoing.as_ref()
    }

    /// Replaces the incoming transition with what the app reported while replaying it.
    pub fn update_incoming_transition(&mut self, t: Arc<Transition>) {
        self.incoming = Some(t);
    }

    pub fn set_outgoing_transition(&mut self, t: Arc<Transition>) {
        self.outgoing = Some(t);
    }

    pub fn children(&self) -> &[StateId] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<StateId> {
        &mut self.children
    }

    pub fn state_factory(&self) -> Option<CheckpointId> {
        self.state_factory
    }

    pub fn has_state_factory(&self) -> bool {
        self.state_factory.is_some()
    }

    pub fn set_state_factory(&mut self, id: CheckpointId) {
        self.state_factory = Some(id);
    }

    pub(crate) fn refcount(&self) -> &AtomicU32 {
        &self.refcount
    }

    pub fn has_correct_descendent(&self) -> bool {
        self.has_correct_descendent
    }

    pub(crate) fn mark_correct_descendent(&mut self) {
        self.has_correct_descendent = true;
    }

    pub fn is_owned_by_explorers(&self) -> bool {
        self.owned_by_explorers
    }

    pub fn mark_owned_by_explorers(&mut self) {
        self.owned_by_explorers = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Records the actors of the app at this state. Sleeping actors are marked done
    /// right away.
    pub fn initialize(&mut self, statuses: Vec<ActorStatus>) {
        self.actors = statuses
            .into_iter()
            .map(|status| {
                let transitions = status.transitions.into_iter().map(Arc::new).collect();
                let actor = ActorState::new(status.aid, status.enabled, status.max_considered)
                    .with_transitions(transitions);
                (status.aid, actor)
            })
            .collect();
        for aid in self.sleep.actors() {
            if let Some(actor) = self.actors.get_mut(&aid) {
                trace!(%aid, "actor will not be explored, it is in the sleep set");
                actor.mark_done();
            }
        }
        self.initialized = true;
        trace!(
            state = self.num,
            actors = self.actors.len(),
            sleeping = self.sleep.len(),
            "state initialized"
        );
    }

    pub fn actors(&self) -> &BTreeMap<Aid, ActorState> {
        &self.actors
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn enabled_actors(&self) -> Vec<Aid> {
        self.actors
            .values()
            .filter(|a| a.is_enabled())
            .map(ActorState::aid)
            .collect()
    }

    pub fn is_actor_enabled(&self, aid: Aid) -> bool {
        self.actors.get(&aid).is_some_and(ActorState::is_enabled)
    }

    pub fn is_actor_done(&self, aid: Aid) -> bool {
        self.actors.get(&aid).is_some_and(ActorState::is_done)
    }

    pub fn count_todo(&self) -> usize {
        self.actors.values().filter(|a| a.is_todo()).count()
    }

    /// Actors that are or were selected for exploration here.
    pub fn backtrack_set(&self) -> BTreeSet<Aid> {
        self.actors
            .values()
            .filter(|a| a.is_todo() || a.is_done())
            .map(ActorState::aid)
            .collect()
    }

    /// Selects `aid` for exploration. Returns false if it cannot or need not be.
    pub fn consider_one(&mut self, aid: Aid) -> bool {
        match self.actors.get_mut(&aid) {
            Some(actor) if actor.is_enabled() && !actor.is_done() && !actor.is_todo() => {
                actor.mark_todo();
                true
            }
            _ => false,
        }
    }

    /// Selects every enabled actor that is not done, returns how many were added.
    pub fn consider_all(&mut self) -> usize {
        let mut added = 0;
        for actor in self.actors.values_mut() {
            if actor.is_enabled() && !actor.is_done() && !actor.is_todo() {
                actor.mark_todo();
                added += 1;
            }
        }
        added
    }

    /// Makes sure one actor is selected, asking the strategy when none is.
    pub fn consider_best(&mut self, strategy: &dyn ExplorationStrategy) -> Option<Aid> {
        if let Some(todo) = self.actors.values().find(|a| a.is_todo()) {
            return Some(todo.aid());
        }
        let (best, _) = strategy.best_transition(self, false)?;
        self.consider_one(best);
        Some(best)
    }

    /// Best todo actor according to the strategy.
    pub fn next_transition_guided(&self, strategy: &dyn ExplorationStrategy) -> Option<Aid> {
        strategy.best_transition(self, true).map(|(aid, _)| aid)
    }

    pub fn has_more_to_be_explored(&self) -> bool {
        match &self.kind {
            StateKind::Wut { wakeup_tree } => !wakeup_tree.is_empty(),
            _ => self.count_todo() > 0,
        }
    }

    pub fn sleep_set(&self) -> &SleepSet {
        &self.sleep
    }

    pub fn add_sleep_set(&mut self, t: Arc<Transition>) {
        if self.kind.has_sleep_set() {
            self.sleep.insert(t);
        }
    }

    /// What sleeps for a step taken by `after`: the sleep set plus, for the wakeup
    /// tree flavors, every sibling ordered before `after`.
    ///
    /// Best-first states put a step to sleep as soon as it is taken, so the steps
    /// opened from `after` onwards are left out of their sleep set here.
    pub fn sleeping_transitions(&self, after: Option<Aid>) -> Vec<Arc<Transition>> {
        let mut sleeping: Vec<Arc<Transition>> = self.sleep.transitions().cloned().collect();
        let siblings: Vec<Arc<Transition>> = match &self.kind {
            StateKind::Plain => return Vec::new(),
            StateKind::SleepSet | StateKind::SoftLocked { .. } => Vec::new(),
            StateKind::Wut { wakeup_tree } => wakeup_tree
                .children(wakeup_tree.root())
                .iter()
                .map(|&n| Arc::clone(wakeup_tree.action(n)))
                .collect(),
            StateKind::BfsWut(data) => {
                let from = after.and_then(|aid| data.opened.iter().position(|o| o.aid == aid));
                if let Some(from) = from {
                    let later: BTreeSet<Aid> = data.opened[from..].iter().map(|t| t.aid).collect();
                    sleeping.retain(|t| !later.contains(&t.aid));
                }
                data.opened.clone()
            }
        };
        for t in siblings {
            if Some(t.aid) == after {
                break;
            }
            if !sleeping.iter().any(|s| s.aid == t.aid) {
                sleeping.push(t);
            }
        }
        sleeping
    }

    pub fn get_sleeping_actors(&self, after: Option<Aid>) -> BTreeSet<Aid> {
        self.sleeping_transitions(after)
            .iter()
            .map(|t| t.aid)
            .collect()
    }

    pub fn wakeup_tree(&self) -> Option<&WakeupTree> {
        match &self.kind {
            StateKind::Wut { wakeup_tree } => Some(wakeup_tree),
            _ => None,
        }
    }

    pub fn wakeup_tree_mut(&mut self) -> Option<&mut WakeupTree> {
        match &mut self.kind {
            StateKind::Wut { wakeup_tree } => Some(wakeup_tree),
            _ => None,
        }
    }

    pub fn bfs_data(&self) -> Option<&BfsWutData> {
        match &self.kind {
            StateKind::BfsWut(data) => Some(data),
            _ => None,
        }
    }

    pub fn bfs_data_mut(&mut self) -> Option<&mut BfsWutData> {
        match &mut self.kind {
            StateKind::BfsWut(data) => Some(data),
            _ => None,
        }
    }

    /// Actors inherited asleep from a parent that still had work.
    pub fn soft_sleepers(&self) -> Option<&BTreeSet<Aid>> {
        match &self.kind {
            StateKind::SoftLocked { soft_sleepers } => Some(soft_sleepers),
            _ => None,
        }
    }

    /// Runs branch `times` of `aid` (the next unexplored branch when `None`) in the
    /// app and records it as the outgoing transition.
    pub fn execute_next(
        &mut self,
        aid: Aid,
        times: Option<u32>,
        app: &mut dyn RemoteApp,
    ) -> Result<Arc<Transition>, McError> {
        let actor = self.actors.get_mut(&aid).ok_or_else(|| {
            McError::Internal(format!("actor {} does not exist in state {}", aid, self.num))
        })?;
        let times = match times {
            Some(times) => {
                actor.consider_branch(times);
                times
            }
            None => actor.do_consider(),
        };
        let expected = actor.get_transition(times).map(|t| t.type_());
        debug!(%aid, times, state = self.num, "executing the next transition");

        let executed = app
            .handle_simcall(aid, times, true)?
            .ok_or_else(|| McError::Internal(format!("no transition reported for actor {}", aid)))?;
        if let Some(expected) = expected {
            if expected != executed.type_() {
                return Err(McError::NonDeterminism(format!(
                    "the transition that was just executed by actor {}, viz: {} is not what was purportedly scheduled to execute, which was: {}",
                    aid,
                    executed,
                    expected
                )));
            }
        }
        let executed = Arc::new(executed);
        self.outgoing = Some(Arc::clone(&executed));
        if let Some(actor) = self.actors.get_mut(&aid) {
            actor.set_transition(Arc::clone(&executed), times);
        }
        app.wait_for_requests()?;
        Ok(executed)
    }

    /// Records a step that the app took on its own from this state.
    pub fn record_executed(&mut self, t: Arc<Transition>) {
        if let Some(actor) = self.actors.get_mut(&t.aid) {
            actor.consider_branch(t.times_considered);
            actor.set_transition(Arc::clone(&t), t.times_considered);
        }
        self.outgoing = Some(t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::BasicStrategy;
    use crate::transition::{MutexOp, MutexTransition, TransitionKind};

    fn lock(aid: u32, mutex: u32) -> Transition {
        Transition::new(
            Aid(aid),
            0,
            TransitionKind::Mutex(MutexTransition {
                op: MutexOp::AsyncLock,
                mutex,
                owner: None,
            }),
        )
    }

    fn status(aid: u32, enabled: bool, mutex: u32) -> ActorStatus {
        ActorStatus {
            aid: Aid(aid),
            enabled,
            max_considered: 1,
            transitions: vec![lock(aid, mutex)],
        }
    }

    #[test]
    fn test_consider_best_prefers_lowest_enabled_actor() {
        let mut arena = StateArena::new();
        let root = arena.create(None, None, StateKind::SleepSet, &BasicStrategy);
        let state = arena.state_mut(root);
        state.initialize(vec![status(1, false, 1), status(2, true, 2), status(3, true, 3)]);
        assert_eq!(state.consider_best(&BasicStrategy), Some(Aid(2)));
        assert_eq!(state.count_todo(), 1);
        assert_eq!(state.consider_best(&BasicStrategy), Some(Aid(2)));
        assert_eq!(state.consider_all(), 1);
        assert_eq!(state.backtrack_set().len(), 2);
    }

    #[test]
    fn test_independent_sleepers_are_inherited_and_done() {
        let mut arena = StateArena::new();
        let root = arena.create(None, None, StateKind::SleepSet, &BasicStrategy);
        arena
            .state_mut(root)
            .initialize(vec![status(1, true, 1), status(2, true, 2)]);
        arena.state_mut(root).add_sleep_set(Arc::new(lock(1, 1)));

        let child = arena.create(
            Some(root),
            Some(Arc::new(lock(2, 2))),
            StateKind::SleepSet,
            &BasicStrategy,
        );
        let child = arena.state_mut(child);
        assert!(child.sleep_set().contains(Aid(1)));
        child.initialize(vec![status(1, true, 1)]);
        assert!(child.is_actor_done(Aid(1)));
        assert_eq!(child.consider_best(&BasicStrategy), None);
    }

    #[test]
    fn test_best_first_sleepers_only_count_earlier_steps() {
        let mut arena = StateArena::new();
        let root = arena.create(None, None, StateKind::BfsWut(BfsWutData::new()), &BasicStrategy);
        let state = arena.state_mut(root);
        for t in [lock(1, 1), lock(2, 1)] {
            let t = Arc::new(t);
            state.bfs_data_mut().unwrap().record_opened(&t);
            state.add_sleep_set(t);
        }
        // inherited from the parent, never opened here
        state.add_sleep_set(Arc::new(lock(3, 3)));

        assert_eq!(state.get_sleeping_actors(Some(Aid(1))), BTreeSet::from([Aid(3)]));
        assert_eq!(
            state.get_sleeping_actors(Some(Aid(2))),
            BTreeSet::from([Aid(1), Aid(3)])
        );
        assert_eq!(
            state.get_sleeping_actors(None),
            BTreeSet::from([Aid(1), Aid(2), Aid(3)])
        );
    }

    #[test]
    fn test_wakeup_tree_siblings_sleep_for_later_ones() {
        let mut tree = WakeupTree::new();
        tree.insert_at_root(Arc::new(lock(1, 1)));
        tree.insert_at_root(Arc::new(lock(2, 2)));
        let mut arena = StateArena::new();
        let root = arena.create(
            None,
            None,
            StateKind::Wut { wakeup_tree: tree },
            &BasicStrategy,
        );
        let state = arena.state(root);
        assert!(state.get_sleeping_actors(Some(Aid(1))).is_empty());
        assert_eq!(
            state.get_sleeping_actors(Some(Aid(2))),
            BTreeSet::from([Aid(1)])
        );
        assert!(state.has_more_to_be_explored());
    }
}
