use crate::transition::{Aid, Transition};
use std::sync::Arc;

/// Exploration status of one actor in one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterleavingType {
    /// Not (yet) selected for exploration from this state
    Disabled,
    /// Selected, some branches remain to be explored
    Todo,
    /// Every branch was explored, or the actor sleeps here
    Done,
}

/// What the checker knows about one actor at one state of the exploration.
///
/// An actor may have several pending transitions when its simcall is
/// nondeterministic (e.g. a `WaitAny` or a `Random`): `max_consider` of them, of
/// which `times_considered` were handed out so far.
#[derive(Debug, Clone)]
pub struct ActorState {
    aid: Aid,
    enabled: bool,
    state: InterleavingType,
    times_considered: u32,
    max_consider: u32,
    pending_transitions: Vec<Option<Arc<Transition>>>,
}

impl ActorState {
    pub fn new(aid: Aid, enabled: bool, max_consider: u32) -> Self {
        ActorState {
            aid,
            enabled,
            state: InterleavingType::Disabled,
            times_considered: 0,
            max_consider,
            pending_transitions: Vec::new(),
        }
    }

    pub fn with_transitions(mut self, transitions: Vec<Arc<Transition>>) -> Self {
        self.pending_transitions = transitions.into_iter().map(Some).collect();
        self
    }

    pub fn aid(&self) -> Aid {
        self.aid
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_todo(&self) -> bool {
        self.state == InterleavingType::Todo
    }

    pub fn is_done(&self) -> bool {
        self.state == InterleavingType::Done
    }

    pub fn interleaving(&self) -> InterleavingType {
        self.state
    }

    pub fn times_considered(&self) -> u32 {
        self.times_considered
    }

    pub fn max_considered(&self) -> u32 {
        self.max_consider
    }

    pub fn mark_todo(&mut self) {
        self.state = InterleavingType::Todo;
        self.times_considered = 0;
    }

    pub fn mark_done(&mut self) {
        self.state = InterleavingType::Done;
    }

    /// Hands out the next branch of the pending simcall, and marks the actor done
    /// once they are all gone.
    pub fn do_consider(&mut self) -> u32 {
        if self.max_consider <= self.times_considered + 1 {
            self.mark_done();
        }
        let times = self.times_considered;
        self.times_considered += 1;
        times
    }

    /// Consumes the branch `times` chosen by someone else (a wakeup tree).
    pub fn consider_branch(&mut self, times: u32) {
        self.times_considered = self.times_considered.max(times + 1);
        if self.max_consider <= self.times_considered {
            self.mark_done();
        }
    }

    pub fn get_transition(&self, times: u32) -> Option<&Arc<Transition>> {
        self.pending_transitions
            .get(times as usize)
            .and_then(Option::as_ref)
    }

    /// The pending transition the next `do_consider` would hand out.
    pub fn next_transition(&self) -> Option<&Arc<Transition>> {
        self.get_transition(self.times_considered)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Arc<Transition>> + '_ {
        self.pending_transitions.iter().flatten()
    }

    /// Records what the actor actually did for branch `times`; more is known about a
    /// transition once it executed.
    pub fn set_transition(&mut self, transition: Arc<Transition>, times: u32) {
        let slot = times as usize;
        if self.pending_transitions.len() <= slot {
            self.pending_transitions.resize(slot + 1, None);
        }
        self.pending_transitions[slot] = Some(transition);
    }
}
