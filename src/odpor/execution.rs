//! One explored branch: the sequence of executed transitions with their clock vectors.
//!
//! Besides the happens-before relation, the execution tracks the last write to
//! every memory location so that data races between actors are flagged while the
//! branch is being extended.

use super::clock_vector::ClockVector;
use crate::transition::{Aid, MemOpKind, Transition};
use ahash::AHashMap;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, enabled, trace, Level};

pub type EventHandle = usize;

/// A sequence of transitions that is not attached to any execution yet.
pub type PartialExecution = Vec<Arc<Transition>>;

/// `Actor <aid>: <transition>` for each step of `w`.
pub fn textual_trace(w: &[Arc<Transition>]) -> Vec<String> {
    w.iter()
        .map(|t| format!("Actor {}: {}", t.aid, t.to_string_verbose(true)))
        .collect()
}

pub fn one_string_textual_trace(w: &[Arc<Transition>]) -> String {
    let mut res = String::new();
    for line in textual_trace(w) {
        res.push_str(&line);
        res.push('\n');
    }
    res
}

/// The write that was performed last on a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WriteEpoch {
    aid: Aid,
    /// Event the write was attached to; the write happened right before it
    event: EventHandle,
}

/// Two unsynchronized accesses to the same location, at least one being a write.
///
/// Each side is located by `(actor, n)`: the access happened right before the
/// `n`-th transition (counting from 0) of that actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRace {
    pub location: u64,
    pub first: (Aid, usize),
    pub second: (Aid, usize),
    pub first_kind: MemOpKind,
    pub second_kind: MemOpKind,
}

impl fmt::Display for DataRace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data race on {:#x}: {} before op #{} of actor {} and {} before op #{} of actor {}",
            self.location,
            self.first_kind,
            self.first.1,
            self.first.0,
            self.second_kind,
            self.second.1,
            self.second.0
        )
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    transition: Arc<Transition>,
    clock: ClockVector,
    /// Previous values of the last-write table entries this event overwrote
    overwritten_writes: Vec<(u64, Option<WriteEpoch>)>,
    race_considered: Cell<bool>,
}

impl Event {
    pub fn transition(&self) -> &Arc<Transition> {
        &self.transition
    }

    pub fn clock_vector(&self) -> &ClockVector {
        &self.clock
    }

    pub fn has_race_been_computed(&self) -> bool {
        self.race_considered.get()
    }

    pub fn consider_races(&self) {
        self.race_considered.set(true);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Execution {
    events: Vec<Event>,
    /// Handles of the events of each actor, in execution order
    per_actor: Vec<Vec<EventHandle>>,
    last_write: AHashMap<u64, WriteEpoch>,
}

impl Execution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_partial(w: &[Arc<Transition>]) -> Self {
        let mut exec = Execution::new();
        exec.push_partial_execution(w);
        exec
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    pub fn latest_event_handle(&self) -> Option<EventHandle> {
        self.events.len().checked_sub(1)
    }

    pub fn event(&self, handle: EventHandle) -> &Event {
        &self.events[handle]
    }

    pub fn transition_at(&self, handle: EventHandle) -> &Transition {
        &self.events[handle].transition
    }

    pub fn transition_arc_at(&self, handle: EventHandle) -> &Arc<Transition> {
        &self.events[handle].transition
    }

    pub fn actor_at(&self, handle: EventHandle) -> Aid {
        self.events[handle].transition.aid
    }

    /// Appends `t`, computing its clock vector from the latest dependent event of
    /// every actor. The event is recorded even when a data race is reported.
    pub fn push_transition(&mut self, t: Arc<Transition>) -> Result<(), DataRace> {
        self.push(t, false)
    }

    /// Same as [`Execution::push_transition`] for a transition whose races were
    /// already computed in an earlier pass over the same branch.
    pub fn push_transition_restoring(&mut self, t: Arc<Transition>) -> Result<(), DataRace> {
        self.push(t, true)
    }

    fn push(&mut self, t: Arc<Transition>, restoring: bool) -> Result<(), DataRace> {
        let mut clock = ClockVector::new();
        for handles in &self.per_actor {
            // the most recent dependent event of each actor is enough
            if let Some(&h) = handles
                .iter()
                .rev()
                .find(|&&h| self.events[h].transition.depends(&t))
            {
                clock.max_emplace_left(&self.events[h].clock);
            }
        }
        let handle = self.events.len();
        let aid = t.aid;
        clock.set(aid, handle);

        if self.per_actor.len() <= aid.index() {
            self.per_actor.resize(aid.index() + 1, Vec::new());
        }
        let prev_of_actor = self.per_actor[aid.index()].last().copied();
        self.per_actor[aid.index()].push(handle);

        self.events.push(Event {
            transition: t,
            clock,
            overwritten_writes: Vec::new(),
            race_considered: Cell::new(restoring),
        });

        self.update_last_writes(handle, prev_of_actor)
    }

    /// Runs the memory accesses of the event at `handle` against the last-write
    /// table. A write of another actor races with the access unless it happens
    /// before the previous event of the accessing actor.
    fn update_last_writes(
        &mut self,
        handle: EventHandle,
        prev_of_actor: Option<EventHandle>,
    ) -> Result<(), DataRace> {
        let transition = Arc::clone(&self.events[handle].transition);
        if transition.mem_ops.is_empty() {
            return Ok(());
        }
        trace!(
            accesses = transition.mem_ops.len(),
            "updating last writes"
        );
        let aid = transition.aid;
        let mut overwritten = Vec::new();
        let mut race = None;

        for op in &transition.mem_ops {
            if let Some(prev) = self.last_write.get(&op.location).copied() {
                let ordered = prev.aid == aid
                    || prev_of_actor
                        .and_then(|p| self.events[p].clock.get(prev.aid))
                        .map_or(false, |c| c >= prev.event);
                if !ordered {
                    race = Some(DataRace {
                        location: op.location,
                        first: (prev.aid, self.rank_of(prev.event)),
                        second: (aid, self.rank_of(handle)),
                        first_kind: MemOpKind::Write,
                        second_kind: op.kind,
                    });
                    break;
                }
            }
            if op.kind == MemOpKind::Write {
                let previous = self
                    .last_write
                    .insert(op.location, WriteEpoch { aid, event: handle });
                overwritten.push((op.location, previous));
            }
        }

        self.events[handle].overwritten_writes = overwritten;
        match race {
            Some(race) => {
                debug!(%race, "data race detected");
                Err(race)
            }
            None => Ok(()),
        }
    }

    /// How many transitions the actor of `handle` executed before it.
    fn rank_of(&self, handle: EventHandle) -> usize {
        let aid = self.actor_at(handle);
        self.per_actor[aid.index()]
            .binary_search(&handle)
            .unwrap_or_else(|pos| pos)
    }

    pub fn remove_last_event(&mut self) {
        let event = self
            .events
            .pop()
            .expect("tried to remove an event from an empty execution");
        for (location, previous) in event.overwritten_writes.into_iter().rev() {
            match previous {
                Some(w) => {
                    self.last_write.insert(location, w);
                }
                None => {
                    self.last_write.remove(&location);
                }
            }
        }
        self.per_actor[event.transition.aid.index()].pop();
    }

    /// Pushes every transition of `w`, ignoring data races.
    pub fn push_partial_execution(&mut self, w: &[Arc<Transition>]) {
        for t in w {
            let _ = self.push_transition(Arc::clone(t));
        }
    }

    pub fn get_textual_trace(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| {
                format!(
                    "Actor {}: {}",
                    e.transition.aid,
                    e.transition.to_string_verbose(true)
                )
            })
            .collect()
    }

    /// `;1;2;1` for an execution where actor 1, then 2, then 1 ran.
    pub fn get_one_string_textual_trace(&self) -> String {
        self.events
            .iter()
            .map(|e| format!(";{}", e.transition.aid))
            .collect()
    }

    pub fn happens_before(&self, e1: EventHandle, e2: EventHandle) -> bool {
        // happens-before is a subset of occurs-before, and irreflexive
        if e1 >= e2 {
            return false;
        }
        self.events[e2]
            .clock
            .get(self.actor_at(e1))
            .map_or(false, |c| e1 <= c)
    }

    /// Whether `e` happens before some event of actor `p` (or is itself by `p`).
    pub fn happens_before_process(&self, e: EventHandle, p: Aid) -> bool {
        if self.actor_at(e) == p {
            return true;
        }
        (e + 1..self.events.len()).any(|k| self.actor_at(k) == p && self.happens_before(e, k))
    }

    /// Events racing with `target`: latest events of the other actors that happen
    /// before `target` with no event in between.
    pub fn get_racing_events_of(&self, target: EventHandle) -> Vec<EventHandle> {
        let target_aid = self.actor_at(target);
        let mut candidates: Vec<EventHandle> = self.events[target]
            .clock
            .iter()
            .filter(|(aid, _)| *aid != target_aid)
            .map(|(_, e)| e)
            .collect();
        candidates.sort_unstable_by(|a, b| b.cmp(a));
        candidates.dedup();

        let handles = &self.per_actor[target_aid.index()];
        let prev_on_actor = match handles.binary_search(&target) {
            Ok(pos) | Err(pos) => pos.checked_sub(1).map(|p| handles[p]),
        };

        let mut racing: Vec<EventHandle> = Vec::new();
        for e_i in candidates {
            // already ordered before target by the program order of its actor
            if prev_on_actor.map_or(false, |p| self.happens_before(e_i, p)) {
                continue;
            }
            // some e_j with e_i --> e_j --> target mediates the two
            if racing.iter().any(|&e_j| self.happens_before(e_i, e_j)) {
                continue;
            }
            trace!(
                event = target,
                racing = e_i,
                "{} races with {}",
                self.transition_at(target),
                self.transition_at(e_i)
            );
            racing.push(e_i);
        }
        racing
    }

    pub fn get_reversible_races_of(&self, handle: EventHandle) -> Vec<EventHandle> {
        let this_transition = self.transition_at(handle);
        self.get_racing_events_of(handle)
            .into_iter()
            .filter(|&race| {
                debug_assert!(race < handle);
                self.transition_at(race)
                    .reversible_race(this_transition, self, race, handle)
            })
            .collect()
    }

    /// The execution made of the events strictly before `handle`.
    pub fn get_prefix_before(&self, handle: EventHandle) -> Execution {
        let mut prefix = self.clone();
        while prefix.size() > handle {
            prefix.remove_last_event();
        }
        prefix
    }

    /// Source-set DPOR: the initials of `notdep(e).next_E(p)` after `pre(e)`, or the
    /// empty set when one of them already is in `backtrack_set`.
    pub fn get_missing_source_set_actors_from(
        &self,
        e: EventHandle,
        backtrack_set: &BTreeSet<Aid>,
    ) -> BTreeSet<Aid> {
        let Some(next_e_p) = self.latest_event_handle() else {
            return BTreeSet::new();
        };
        assert_ne!(
            e, next_e_p,
            "event {} cannot be in a reversible race with itself",
            e
        );

        // Simulate E'.v, where v holds the events occurring after e without happening after it
        let mut e_prime_v = self.get_prefix_before(e);
        let mut v: Vec<EventHandle> = Vec::new();
        let mut initials = BTreeSet::new();
        let mut disqualified = BTreeSet::new();

        for e_prime in e + 1..=next_e_p {
            if self.happens_before(e, e_prime) && e_prime != next_e_p {
                continue;
            }
            let _ = e_prime_v.push_transition(Arc::clone(self.transition_arc_at(e_prime)));
            let in_e_prime_v = e_prime_v.size() - 1;
            v.push(in_e_prime_v);

            let q = e_prime_v.actor_at(in_e_prime_v);
            if disqualified.contains(&q) {
                continue;
            }
            let is_initial = !v
                .iter()
                .any(|&e_star| e_prime_v.happens_before(e_star, in_e_prime_v));
            if is_initial {
                if backtrack_set.contains(&q) {
                    return BTreeSet::new();
                }
                initials.insert(q);
            } else {
                // every later event of q happens after this one
                disqualified.insert(q);
            }
        }
        assert!(
            !initials.is_empty(),
            "no initial found after event {}: some actor can always run",
            e
        );
        initials
    }

    /// The sequence `v` that reverses the race between `e` and `e_prime`, unless an
    /// initial or weak initial of `v` is already asleep at `e` (`sleeping_at_e`).
    pub fn get_odpor_extension_from(
        &self,
        e: EventHandle,
        e_prime: EventHandle,
        sleeping_at_e: &BTreeSet<Aid>,
    ) -> Option<PartialExecution> {
        assert!(
            e < e_prime,
            "ODPOR extensions are computed for events in a reversible race, yet {} occurs after {}",
            e,
            e_prime
        );
        if self.is_empty() {
            return None;
        }
        debug!(
            e,
            e_prime,
            sequence = %self.get_one_string_textual_trace(),
            "computing an ODPOR extension"
        );
        if enabled!(Level::TRACE) {
            for line in self.get_textual_trace() {
                trace!("... {}", line);
            }
        }

        let mut v: PartialExecution = Vec::new();
        let mut disqualified: BTreeSet<Aid> = BTreeSet::new();
        disqualified.insert(self.actor_at(e));

        // notdep(e, E): once an actor has an event happening after e, all of its
        // later events do too
        for e_star in e + 1..self.size() {
            let aid = self.actor_at(e_star);
            if disqualified.contains(&aid) {
                continue;
            }
            if self.happens_before(e, e_star) {
                disqualified.insert(aid);
                continue;
            }
            assert_ne!(
                e_star, e_prime,
                "events {} and {} are claimed to race, yet they are not ordered",
                e, e_prime
            );
            v.push(Arc::clone(self.transition_arc_at(e_star)));
        }
        v.push(Arc::clone(self.transition_arc_at(e_prime)));

        trace!("potential v :=\n{}", one_string_textual_trace(&v));

        for (i, t) in v.iter().enumerate() {
            let is_initial = !v[..i].iter().any(|u| t.depends(u));
            if is_initial && sleeping_at_e.contains(&t.aid) {
                debug!("discarding the extension: an initial actor is already asleep");
                return None;
            }
        }

        for &aid in sleeping_at_e {
            let Some(next) = (e + 1..self.size()).find(|&h| self.actor_at(h) == aid) else {
                trace!(%aid, "sleeping actor does not run after the race");
                continue;
            };
            if Self::is_in_weak_initial_of(self.transition_at(next), &v) {
                debug!("discarding the extension: a weak initial actor is already asleep");
                return None;
            }
        }

        Some(v)
    }

    /// Whether `t` is a weak initial of `w`: its actor runs in `w` before anything
    /// dependent with it, or nothing in `w` depends on it.
    pub fn is_in_weak_initial_of(t: &Transition, w: &[Arc<Transition>]) -> bool {
        for w_i in w {
            if t.aid == w_i.aid {
                return true;
            }
            if w_i.depends(t) {
                return false;
            }
        }
        true
    }

    /// Whether the first step of actor `p` in `w` could be moved to the front of `w`.
    pub fn is_initial_after_execution_of(w: &[Arc<Transition>], p: Aid) -> bool {
        match w.iter().position(|t| t.aid == p) {
            Some(i) => !w[..i].iter().any(|w_j| w_j.depends(&w[i])),
            None => false,
        }
    }

    pub fn is_independent_with_execution_of(w: &[Arc<Transition>], next_e_p: &Transition) -> bool {
        w.iter().all(|t| !t.depends(next_e_p))
    }

    /// Computes `v ~_[E] w`: the rest of `w` once every step of `v` has been
    /// matched, or `None` when `v` is not a prefix of `w` up to equivalence.
    pub fn get_shortest_odpor_sq_subset_insertion(
        v: &[Arc<Transition>],
        w: &[Arc<Transition>],
    ) -> Option<PartialExecution> {
        let mut rest: PartialExecution = w.to_vec();
        for next_e_p in v {
            let p = next_e_p.aid;
            if Self::is_initial_after_execution_of(&rest, p) {
                let pos = rest
                    .iter()
                    .position(|t| t.aid == p)
                    .expect("an initial actor occurs in the sequence");
                assert_eq!(
                    rest[pos].type_(),
                    next_e_p.type_(),
                    "actor {} executes {} in one sequence and {} in the other",
                    p,
                    next_e_p,
                    rest[pos]
                );
                rest.remove(pos);
            } else if Self::is_independent_with_execution_of(&rest, next_e_p) {
                debug_assert!(
                    !rest.iter().any(|t| t.aid == p),
                    "actor {} is independent with the sequence but occurs in it",
                    p
                );
            } else {
                return None;
            }
        }
        Some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{
        ActorTransition, MemOp, ObjectAccessKind, ObjectAccessTransition, TransitionKind,
    };

    /// Dependent with every other `dep` transition.
    fn dep(aid: u32) -> Arc<Transition> {
        Arc::new(Transition::new(
            Aid(aid),
            0,
            TransitionKind::ObjectAccess(ObjectAccessTransition {
                object: 1,
                access: ObjectAccessKind::Both,
                name: "shared".to_string(),
            }),
        ))
    }

    /// Independent with everything of other actors.
    fn indep(aid: u32) -> Arc<Transition> {
        Arc::new(Transition::new(
            Aid(aid),
            0,
            TransitionKind::Actor(ActorTransition::Sleep),
        ))
    }

    fn writing(aid: u32, location: u64) -> Arc<Transition> {
        Arc::new(
            Transition::new(Aid(aid), 0, TransitionKind::Actor(ActorTransition::Sleep))
                .with_mem_ops(vec![MemOp::write(location)]),
        )
    }

    #[test]
    fn test_clock_vectors_follow_dependencies() {
        let exec = Execution::from_partial(&[dep(1), indep(2), dep(3), indep(3)]);
        assert_eq!(exec.event(0).clock_vector().get(Aid(1)), Some(0));
        assert_eq!(exec.event(1).clock_vector().get(Aid(1)), None);
        assert_eq!(exec.event(2).clock_vector().get(Aid(1)), Some(0));
        assert_eq!(exec.event(3).clock_vector().get(Aid(3)), Some(3));

        assert!(exec.happens_before(0, 2));
        assert!(exec.happens_before(0, 3));
        assert!(!exec.happens_before(1, 3));
        assert!(!exec.happens_before(2, 2));
        assert!(!exec.happens_before(2, 0));
    }

    #[test]
    fn test_happens_before_is_acyclic() {
        let exec =
            Execution::from_partial(&[dep(1), indep(2), dep(3), dep(2), indep(1), dep(1)]);
        for e1 in 0..exec.size() {
            assert!(!exec.happens_before(e1, e1));
            for e2 in 0..exec.size() {
                if exec.happens_before(e1, e2) {
                    assert!(!exec.happens_before(e2, e1));
                    let c = exec.event(e2).clock_vector().get(exec.actor_at(e1));
                    assert!(c.map_or(false, |c| c >= e1));
                }
            }
        }
    }

    #[test]
    fn test_racing_events() {
        // 0:dep(1) 1:dep(2) 2:dep(3): only the immediate predecessor races
        let exec = Execution::from_partial(&[dep(1), dep(2), dep(3)]);
        assert_eq!(exec.get_racing_events_of(1), vec![0]);
        assert_eq!(exec.get_racing_events_of(2), vec![1]);
        assert_eq!(exec.get_reversible_races_of(2), vec![1]);
    }

    #[test]
    fn test_independent_events_do_not_race() {
        let exec = Execution::from_partial(&[indep(1), indep(2), dep(3)]);
        assert!(exec.get_racing_events_of(1).is_empty());
        assert!(exec.get_racing_events_of(2).is_empty());
    }

    #[test]
    fn test_program_order_is_not_a_race() {
        // 0:dep(1) 1:dep(2) 2:dep(2): event 0 is ordered before 2 through event 1
        let exec = Execution::from_partial(&[dep(1), dep(2), dep(2)]);
        assert!(exec.get_racing_events_of(2).is_empty());
    }

    #[test]
    fn test_remove_last_event_restores() {
        let mut exec = Execution::from_partial(&[dep(1), dep(2)]);
        exec.remove_last_event();
        assert_eq!(exec.size(), 1);
        exec.push_transition(dep(3)).unwrap();
        assert_eq!(exec.get_racing_events_of(1), vec![0]);
        assert_eq!(exec.get_one_string_textual_trace(), ";1;3");
    }

    #[test]
    fn test_write_write_race() {
        let mut exec = Execution::new();
        exec.push_transition(writing(1, 0x10)).unwrap();
        let race = exec.push_transition(writing(2, 0x10)).unwrap_err();
        assert_eq!(race.first, (Aid(1), 0));
        assert_eq!(race.second, (Aid(2), 0));
        assert_eq!(race.location, 0x10);
        assert_eq!(race.second_kind, MemOpKind::Write);
        // the event is kept
        assert_eq!(exec.size(), 2);
    }

    #[test]
    fn test_synchronized_writes_do_not_race() {
        let mut exec = Execution::new();
        exec.push_transition(writing(1, 0x10)).unwrap();
        exec.push_transition(dep(1)).unwrap();
        exec.push_transition(dep(2)).unwrap();
        // actor 2 saw dep(1) before writing
        exec.push_transition(writing(2, 0x10)).unwrap();
        assert_eq!(exec.size(), 4);
    }

    #[test]
    fn test_race_detection_undone_by_removal() {
        let mut exec = Execution::new();
        exec.push_transition(writing(1, 0x10)).unwrap();
        exec.remove_last_event();
        exec.push_transition(writing(2, 0x10)).unwrap();
    }

    #[test]
    fn test_odpor_extension() {
        // 0:dep(1) 1:indep(3) 2:dep(2) ; the race 0 -> 2 is reversed by v = indep(3).dep(2)
        let exec = Execution::from_partial(&[dep(1), indep(3), dep(2)]);
        let v = exec
            .get_odpor_extension_from(0, 2, &BTreeSet::new())
            .expect("the race is not covered");
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].aid, Aid(3));
        assert_eq!(v[1].aid, Aid(2));

        // actor 3 is an initial of v and sleeps already
        let sleeping = BTreeSet::from([Aid(3)]);
        assert!(exec.get_odpor_extension_from(0, 2, &sleeping).is_none());
    }

    #[test]
    fn test_initials_and_weak_initials() {
        let w = vec![dep(1), indep(2), dep(3)];
        assert!(Execution::is_initial_after_execution_of(&w, Aid(1)));
        assert!(Execution::is_initial_after_execution_of(&w, Aid(2)));
        assert!(!Execution::is_initial_after_execution_of(&w, Aid(3)));
        assert!(!Execution::is_initial_after_execution_of(&w, Aid(4)));

        assert!(Execution::is_in_weak_initial_of(&indep(4), &w));
        assert!(!Execution::is_in_weak_initial_of(&dep(4), &w));
        assert!(Execution::is_independent_with_execution_of(&w, &indep(4)));
    }

    #[test]
    fn test_sq_subset_insertion() {
        let w = vec![dep(1), indep(2), dep(3)];
        let rest = Execution::get_shortest_odpor_sq_subset_insertion(&[indep(2)], &w)
            .expect("actor 2 is an initial of w");
        assert_eq!(rest.len(), 2);

        // independent with all of w: w is untouched
        let rest = Execution::get_shortest_odpor_sq_subset_insertion(&[indep(4)], &w).unwrap();
        assert_eq!(rest.len(), 3);

        assert!(Execution::get_shortest_odpor_sq_subset_insertion(&[dep(3)], &w).is_none());
    }

    #[test]
    fn test_missing_source_set() {
        // 0:dep(1) 1:indep(2) 2:dep(3): reversing 0/2 needs actor 2 or 3 first
        let exec = Execution::from_partial(&[dep(1), indep(2), dep(3)]);
        let initials = exec.get_missing_source_set_actors_from(0, &BTreeSet::new());
        assert_eq!(initials, BTreeSet::from([Aid(2), Aid(3)]));
        let covered = exec.get_missing_source_set_actors_from(0, &BTreeSet::from([Aid(3)]));
        assert!(covered.is_empty());
    }

    #[test]
    fn test_happens_before_process() {
        let exec = Execution::from_partial(&[dep(1), indep(2), dep(3)]);
        assert!(exec.happens_before_process(0, Aid(3)));
        assert!(exec.happens_before_process(0, Aid(1)));
        assert!(!exec.happens_before_process(0, Aid(2)));
    }
}
