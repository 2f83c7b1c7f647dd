use super::{State, StateId, StateKind};
use crate::remote::CheckpointId;
use crate::strategy::ExplorationStrategy;
use crate::transition::Transition;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    state: Option<State>,
}

/// Owner of every live state.
///
/// States are reference counted: the creator gets one reference, and every child
/// holds one on its parent. Dropping the last reference queues the state for
/// collection; [`collect_garbage`](StateArena::collect_garbage) frees it, releases
/// its parent and hands back its checkpoint.
#[derive(Debug, Default)]
pub struct StateArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    garbage: Mutex<Vec<StateId>>,
    next_num: u64,
    live: usize,
}

impl StateArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state, child of `parent` through `incoming` when given. The caller
    /// owns the returned reference.
    pub fn create(
        &mut self,
        parent: Option<StateId>,
        incoming: Option<Arc<Transition>>,
        kind: StateKind,
        strategy: &dyn ExplorationStrategy,
    ) -> StateId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let id = StateId {
            index,
            generation: self.slots[index as usize].generation,
        };
        let num = self.next_num;
        self.next_num += 1;

        let state = State::new(
            id,
            num,
            parent.and_then(|p| self.get(p)),
            incoming,
            kind,
            strategy,
        );
        self.slots[index as usize].state = Some(state);
        self.live += 1;

        if let Some(parent) = parent {
            self.acquire(parent);
            self.state_mut(parent).children_mut().push(id);
        }
        trace!(state = num, "created state");
        id
    }

    pub fn get(&self, id: StateId) -> Option<&State> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_ref())
    }

    pub fn get_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_mut())
    }

    pub fn state(&self, id: StateId) -> &State {
        self.get(id).expect("state used after it was collected")
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        self.get_mut(id).expect("state used after it was collected")
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.get(id).is_some()
    }

    /// Number of states created so far.
    pub fn expanded_states(&self) -> u64 {
        self.next_num
    }

    /// Number of states currently alive.
    pub fn live_states(&self) -> usize {
        self.live
    }

    pub fn acquire(&self, id: StateId) {
        let prev = self.state(id).refcount().fetch_add(1, Ordering::AcqRel);
        assert!(prev > 0, "state resurrected after its last reference was dropped");
    }

    /// Drops one reference. The state is queued for collection exactly once, when
    /// the last reference goes.
    pub fn release(&self, id: StateId) {
        let Some(state) = self.get(id) else {
            return;
        };
        let prev = state.refcount().fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "state released more often than acquired");
        if prev == 1 {
            self.garbage.lock().push(id);
        }
    }

    /// Frees the queued states and, transitively, the ancestors they kept alive.
    /// Returns the checkpoints that belonged to them.
    pub fn collect_garbage(&mut self) -> Vec<CheckpointId> {
        let mut checkpoints = Vec::new();
        loop {
            let batch = std::mem::take(&mut *self.garbage.lock());
            if batch.is_empty() {
                break;
            }
            for id in batch {
                let Some(slot) = self
                    .slots
                    .get_mut(id.index as usize)
                    .filter(|slot| slot.generation == id.generation)
                else {
                    continue;
                };
                let Some(state) = slot.state.take() else {
                    continue;
                };
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
                trace!(state = state.num(), "collected state");

                if let Some(factory) = state.state_factory() {
                    checkpoints.push(factory);
                }
                if let Some(parent) = state.parent() {
                    if let Some(p) = self.get_mut(parent) {
                        p.children_mut().retain(|&c| c != id);
                    }
                    self.release(parent);
                }
            }
        }
        checkpoints
    }

    /// Ids from the root down to `id`.
    pub fn path_to(&self, id: StateId) -> Vec<StateId> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(s) = cur {
            path.push(s);
            cur = self.state(s).parent();
        }
        path.reverse();
        path
    }

    /// Marks `id` and its ancestors as leading to a correct execution.
    pub fn register_as_correct(&mut self, id: StateId) {
        let mut cur = Some(id);
        while let Some(s) = cur {
            let state = self.state_mut(s);
            if state.has_correct_descendent() {
                break;
            }
            state.mark_correct_descendent();
            cur = state.parent();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::BasicStrategy;
    use crate::transition::{Aid, TransitionKind};

    fn step(aid: u32) -> Option<Arc<Transition>> {
        Some(Arc::new(Transition::new(Aid(aid), 0, TransitionKind::Unknown)))
    }

    #[test]
    fn test_child_keeps_parent_alive() {
        let mut arena = StateArena::new();
        let root = arena.create(None, None, StateKind::Plain, &BasicStrategy);
        let child = arena.create(Some(root), step(1), StateKind::Plain, &BasicStrategy);
        assert_eq!(arena.state(child).depth(), 1);
        assert_eq!(arena.state(root).children(), &[child]);

        arena.release(root);
        assert!(arena.collect_garbage().is_empty());
        assert!(arena.contains(root));

        arena.release(child);
        arena.collect_garbage();
        assert!(!arena.contains(child));
        assert!(!arena.contains(root));
        assert_eq!(arena.live_states(), 0);
    }

    #[test]
    fn test_stale_ids_are_detected() {
        let mut arena = StateArena::new();
        let first = arena.create(None, None, StateKind::Plain, &BasicStrategy);
        arena.release(first);
        arena.collect_garbage();
        let second = arena.create(None, None, StateKind::Plain, &BasicStrategy);
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.state(second).num(), 1);
        assert_eq!(arena.expanded_states(), 2);
    }

    #[test]
    fn test_checkpoints_are_handed_back() {
        let mut arena = StateArena::new();
        let root = arena.create(None, None, StateKind::Plain, &BasicStrategy);
        arena.state_mut(root).set_state_factory(7);
        arena.release(root);
        assert_eq!(arena.collect_garbage(), vec![7]);
    }

    #[test]
    fn test_correctness_propagates_upwards() {
        let mut arena = StateArena::new();
        let root = arena.create(None, None, StateKind::Plain, &BasicStrategy);
        let child = arena.create(Some(root), step(1), StateKind::Plain, &BasicStrategy);
        let sibling = arena.create(Some(root), step(2), StateKind::Plain, &BasicStrategy);
        arena.register_as_correct(child);
        assert!(arena.state(root).has_correct_descendent());
        assert!(!arena.state(sibling).has_correct_descendent());
    }
}
